//! Basic-block & control-flow-graph construction, plus the dominance
//! and dominance-frontier computations the SSA builder is layered on
//! top of.
//!
//! Blocks are owned by the `Cfg` via stable `usize` ids into a flat arena
//! rather than linked by reference: SSA construction and DCE mutate
//! block instruction lists in place, and an id-based graph sidesteps the
//! aliasing a tree of `Rc<RefCell<_>>` blocks would need for back-edges.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::ir::{Instruction, TACMethod};

pub type BlockId = usize;

#[derive(Clone, Debug)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Every block carries a label, even if the source TAC had none at
    /// its leader (a synthetic `bb<id>` is assigned) — SSA's flattened
    /// output and φ-sources need a stable name for every block.
    pub label: String,
    pub instructions: Vec<Instruction>,
    pub preds: Vec<BlockId>,
    pub succs: Vec<BlockId>,
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (preds={:?}, succs={:?})", self.label, self.preds, self.succs)?;
        for instr in &self.instructions {
            writeln!(f, "    {}", instr)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct Cfg {
    pub blocks: Vec<BasicBlock>,
    pub entry: BlockId,
    pub exits: Vec<BlockId>,
}

impl fmt::Display for Cfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "entry = {}, exits = {:?}", self.entry, self.exits)?;
        for block in &self.blocks {
            write!(f, "{}", block)?;
        }
        Ok(())
    }
}

/// Dominance information for a `Cfg`: dominator sets, the immediate
/// dominator of every block, the dominator tree's children lists, and
/// the dominance frontier of every block.
pub struct Dominance {
    pub dom: Vec<HashSet<BlockId>>,
    pub idom: Vec<Option<BlockId>>,
    pub children: Vec<Vec<BlockId>>,
    pub frontier: Vec<HashSet<BlockId>>,
}

impl Cfg {
    /// Mark leaders (first instruction, any label, anything following a
    /// jump), cut the instruction list there, and wire up edges from
    /// each block's final instruction.
    pub fn build(method: &TACMethod) -> Cfg {
        let instrs = &method.instructions;
        if instrs.is_empty() {
            return Cfg::default();
        }

        let mut is_leader = vec![false; instrs.len()];
        is_leader[0] = true;
        for (i, instr) in instrs.iter().enumerate() {
            if matches!(instr, Instruction::Label(_)) {
                is_leader[i] = true;
            }
            if instr.is_jump() && i + 1 < instrs.len() {
                is_leader[i + 1] = true;
            }
        }
        let leader_positions: Vec<usize> =
            (0..instrs.len()).filter(|&i| is_leader[i]).collect();

        let mut blocks = Vec::with_capacity(leader_positions.len());
        for (id, &start) in leader_positions.iter().enumerate() {
            let end = leader_positions.get(id + 1).copied().unwrap_or(instrs.len());
            let mut slice: Vec<Instruction> = instrs[start..end].to_vec();
            let label = match slice.first() {
                Some(Instruction::Label(name)) => {
                    let name = name.clone();
                    slice.remove(0);
                    name
                }
                _ => format!("bb{}", id),
            };
            blocks.push(BasicBlock { id, label, instructions: slice, preds: Vec::new(), succs: Vec::new() });
        }

        let label_map: HashMap<String, BlockId> =
            blocks.iter().map(|b| (b.label.clone(), b.id)).collect();
        let n = blocks.len();

        let mut exits = Vec::new();
        let mut edges: Vec<(BlockId, BlockId)> = Vec::new();
        for block in &blocks {
            match block.instructions.last() {
                Some(Instruction::Jump(target)) => {
                    if let Some(&to) = label_map.get(target) {
                        edges.push((block.id, to));
                    }
                }
                Some(Instruction::CondJump { target, .. }) => {
                    // Target first, fall-through second.
                    if let Some(&to) = label_map.get(target) {
                        edges.push((block.id, to));
                    }
                    if block.id + 1 < n {
                        edges.push((block.id, block.id + 1));
                    }
                }
                Some(Instruction::Return(_)) => {
                    exits.push(block.id);
                }
                _ => {
                    if block.id + 1 < n {
                        edges.push((block.id, block.id + 1));
                    }
                }
            }
        }

        let mut seen = HashSet::new();
        edges.retain(|e| seen.insert(*e));
        for (from, to) in edges {
            blocks[from].succs.push(to);
            blocks[to].preds.push(from);
        }

        Cfg { blocks, entry: 0, exits }
    }

    /// Depth-first postorder over the successor relation, starting at
    /// entry. Blocks unreachable from entry never appear.
    pub fn postorder(&self) -> Vec<BlockId> {
        if self.blocks.is_empty() {
            return Vec::new();
        }
        let mut visited = vec![false; self.blocks.len()];
        let mut order = Vec::new();
        self.dfs_postorder(self.entry, &mut visited, &mut order);
        order
    }

    fn dfs_postorder(&self, b: BlockId, visited: &mut [bool], order: &mut Vec<BlockId>) {
        if visited[b] {
            return;
        }
        visited[b] = true;
        for &s in &self.blocks[b].succs {
            self.dfs_postorder(s, visited, order);
        }
        order.push(b);
    }

    pub fn reverse_postorder(&self) -> Vec<BlockId> {
        let mut order = self.postorder();
        order.reverse();
        order
    }

    /// `dom(B) = {B} ∪ ⋂ dom(P)` over predecessors, iterated over RPO
    /// until a full pass makes no change.
    pub fn dominators(&self) -> Vec<HashSet<BlockId>> {
        let n = self.blocks.len();
        if n == 0 {
            return Vec::new();
        }
        let rpo = self.reverse_postorder();
        let reachable: HashSet<BlockId> = rpo.iter().copied().collect();
        let all: HashSet<BlockId> = (0..n).collect();

        let mut dom = vec![all; n];
        dom[self.entry] = [self.entry].into_iter().collect();

        let mut changed = true;
        while changed {
            changed = false;
            for &b in &rpo {
                if b == self.entry {
                    continue;
                }
                let mut new_dom: Option<HashSet<BlockId>> = None;
                for &p in &self.blocks[b].preds {
                    if !reachable.contains(&p) {
                        continue;
                    }
                    new_dom = Some(match new_dom {
                        None => dom[p].clone(),
                        Some(acc) => acc.intersection(&dom[p]).copied().collect(),
                    });
                }
                let mut new_dom = new_dom.unwrap_or_default();
                new_dom.insert(b);
                if new_dom != dom[b] {
                    dom[b] = new_dom;
                    changed = true;
                }
            }
        }
        dom
    }

    /// The nearest strict dominator of each block: the element of
    /// `dom(B) \ {B}` that every other element of that set also
    /// dominates. Entry's immediate dominator is `None`, as are
    /// unreachable blocks'.
    pub fn immediate_dominators(&self, dom: &[HashSet<BlockId>]) -> Vec<Option<BlockId>> {
        let n = self.blocks.len();
        let mut idom = vec![None; n];
        let rpo = self.reverse_postorder();
        for &b in &rpo {
            if b == self.entry {
                continue;
            }
            let candidates: Vec<BlockId> = dom[b].iter().copied().filter(|&d| d != b).collect();
            idom[b] = candidates.iter().copied().find(|&d| {
                candidates.iter().all(|&other| other == d || dom[d].contains(&other))
            });
        }
        idom
    }

    pub fn dominator_tree_children(&self, idom: &[Option<BlockId>]) -> Vec<Vec<BlockId>> {
        let mut children = vec![Vec::new(); idom.len()];
        for (b, parent) in idom.iter().enumerate() {
            if let Some(p) = parent {
                children[*p].push(b);
            }
        }
        children
    }

    /// For each block `X` with ≥2 predecessors, walk each predecessor
    /// upward via `idom` until reaching `idom(X)`, adding `X` to the
    /// dominance frontier of every block visited along the way.
    pub fn dominance_frontier(&self, idom: &[Option<BlockId>]) -> Vec<HashSet<BlockId>> {
        let n = self.blocks.len();
        let mut df = vec![HashSet::new(); n];
        for x in 0..n {
            if self.blocks[x].preds.len() < 2 {
                continue;
            }
            for &p in &self.blocks[x].preds {
                let mut runner = p;
                while Some(runner) != idom[x] {
                    df[runner].insert(x);
                    match idom[runner] {
                        Some(next) => runner = next,
                        None => break,
                    }
                }
            }
        }
        df
    }

    pub fn compute_dominance(&self) -> Dominance {
        let dom = self.dominators();
        let idom = self.immediate_dominators(&dom);
        let children = self.dominator_tree_children(&idom);
        let frontier = self.dominance_frontier(&idom);
        Dominance { dom, idom, children, frontier }
    }

    /// Flatten back to a single instruction list, blocks in RPO, each
    /// preceded by its (possibly synthetic) label. Used by SSA's output
    /// step and by the CFG→RPO→CFG round-trip property.
    pub fn linearize(&self) -> Vec<Instruction> {
        let mut out = Vec::new();
        for id in self.reverse_postorder() {
            let block = &self.blocks[id];
            out.push(Instruction::Label(block.label.clone()));
            out.extend(block.instructions.iter().cloned());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, CondKind, ConstValue, Operand};

    fn diamond_method() -> TACMethod {
        // entry: t0 = 1 < 2; if !t0 goto L1; then: t1 = 1; goto L2; L1: t1 = 2; L2: return t1
        TACMethod {
            class_name: "Main".into(),
            method_name: "m".into(),
            params: vec![],
            instructions: vec![
                Instruction::BinOp {
                    dest: Operand::Temp(0),
                    op: BinOp::Lt,
                    lhs: Operand::Const(ConstValue::Int(1)),
                    rhs: Operand::Const(ConstValue::Int(2)),
                },
                Instruction::CondJump {
                    cond: Operand::Temp(0),
                    target: "L1".into(),
                    kind: CondKind::Falsy,
                },
                Instruction::Copy { dest: Operand::Temp(1), src: Operand::Const(ConstValue::Int(1)) },
                Instruction::Jump("L2".into()),
                Instruction::Label("L1".into()),
                Instruction::Copy { dest: Operand::Temp(1), src: Operand::Const(ConstValue::Int(2)) },
                Instruction::Label("L2".into()),
                Instruction::Return(Operand::Temp(1)),
            ],
        }
    }

    #[test]
    fn test_build_produces_four_blocks() {
        let cfg = Cfg::build(&diamond_method());
        assert_eq!(cfg.blocks.len(), 4);
        assert_eq!(cfg.exits, vec![3]);
    }

    #[test]
    fn test_conditional_edges_target_first_fallthrough_second() {
        let cfg = Cfg::build(&diamond_method());
        assert_eq!(cfg.blocks[0].succs, vec![2, 1]);
    }

    #[test]
    fn test_join_block_has_two_preds() {
        let cfg = Cfg::build(&diamond_method());
        assert_eq!(cfg.blocks[3].preds.len(), 2);
    }

    #[test]
    fn test_dominance_every_block_dominates_itself() {
        let cfg = Cfg::build(&diamond_method());
        let dom = cfg.dominators();
        for (id, set) in dom.iter().enumerate() {
            assert!(set.contains(&id));
        }
    }

    #[test]
    fn test_entry_dominates_everything() {
        let cfg = Cfg::build(&diamond_method());
        let dom = cfg.dominators();
        for set in &dom {
            assert!(set.contains(&cfg.entry));
        }
    }

    #[test]
    fn test_join_block_dominance_frontier_is_each_branch() {
        let cfg = Cfg::build(&diamond_method());
        let d = cfg.compute_dominance();
        // Both branch blocks (1 and 2) dominate only themselves among the
        // diamond's interior, so their frontier is the join block (3).
        assert!(d.frontier[1].contains(&3));
        assert!(d.frontier[2].contains(&3));
        assert!(d.frontier[3].is_empty());
    }

    #[test]
    fn test_idom_of_join_is_entry() {
        let cfg = Cfg::build(&diamond_method());
        let dom = cfg.dominators();
        let idom = cfg.immediate_dominators(&dom);
        assert_eq!(idom[3], Some(0));
        assert_eq!(idom[0], None);
    }

    #[test]
    fn test_linearize_round_trip_preserves_block_count() {
        let cfg = Cfg::build(&diamond_method());
        let flat = cfg.linearize();
        let method2 = TACMethod { instructions: flat, ..diamond_method() };
        let cfg2 = Cfg::build(&method2);
        assert_eq!(cfg.blocks.len(), cfg2.blocks.len());
        for (b1, b2) in cfg.blocks.iter().zip(cfg2.blocks.iter()) {
            assert_eq!(b1.succs.len(), b2.succs.len());
            assert_eq!(b1.preds.len(), b2.preds.len());
        }
    }

    #[test]
    fn test_empty_method_yields_empty_cfg() {
        let method = TACMethod {
            class_name: "Main".into(),
            method_name: "m".into(),
            params: vec![],
            instructions: vec![],
        };
        let cfg = Cfg::build(&method);
        assert!(cfg.blocks.is_empty());
    }
}
