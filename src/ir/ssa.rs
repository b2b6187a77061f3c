//! SSA construction: the standard Cytron et al. algorithm — φ placement
//! at iterated dominance frontiers, then a dominator-tree walk that
//! renames every definition to a fresh version and every *use* to the
//! version current at that point. Every operand a non-φ instruction
//! reads is rewritten to the stack-top version of its base name before
//! that instruction's own definition is renamed.

use std::collections::{HashMap, HashSet};

use crate::ir::cfg::{BlockId, Cfg, Dominance};
use crate::ir::{Instruction, Operand, TACMethod};

pub fn convert_to_ssa(method: &TACMethod, cfg: &Cfg) -> TACMethod {
    if cfg.blocks.is_empty() {
        return method.clone();
    }

    let mut work = cfg.clone();
    let dominance = work.compute_dominance();

    insert_phis(&mut work, &dominance);

    let mut counters: HashMap<String, u32> = HashMap::new();
    let mut stacks: HashMap<String, Vec<String>> = HashMap::new();

    // `self` and the formals are live at entry with no defining
    // instruction of their own; seed them with an initial version so
    // their first use inside the body renames correctly.
    let mut seeded = vec!["self".to_string()];
    seeded.extend(method.params.iter().cloned());
    for base in &seeded {
        new_version(&mut counters, &mut stacks, base);
    }

    rename_block(&mut work, work.entry, &dominance, &mut counters, &mut stacks);

    TACMethod {
        class_name: method.class_name.clone(),
        method_name: method.method_name.clone(),
        params: method.params.clone(),
        instructions: work.linearize(),
    }
}

/// Collect, for each assigned variable name, the iterated dominance
/// frontier of its definition blocks, and prepend a φ at every block in
/// that set.
fn insert_phis(cfg: &mut Cfg, dominance: &Dominance) {
    let mut def_blocks: HashMap<String, HashSet<BlockId>> = HashMap::new();
    for block in &cfg.blocks {
        for instr in &block.instructions {
            for name in instr.defs() {
                def_blocks.entry(name).or_default().insert(block.id);
            }
        }
    }

    for (var, defs) in &def_blocks {
        let mut phi_blocks: HashSet<BlockId> = HashSet::new();
        let mut worklist: Vec<BlockId> = defs.iter().copied().collect();
        while let Some(b) = worklist.pop() {
            for &d in &dominance.frontier[b] {
                // The φ itself counts as a new definition, so a block
                // that just received one may seed further frontiers.
                if phi_blocks.insert(d) {
                    worklist.push(d);
                }
            }
        }

        for block_id in phi_blocks {
            let preds = cfg.blocks[block_id].preds.clone();
            let sources: Vec<(Operand, String)> = preds
                .iter()
                .map(|&p| (Operand::Var(var.clone()), cfg.blocks[p].label.clone()))
                .collect();
            cfg.blocks[block_id]
                .instructions
                .insert(0, Instruction::Phi { dest: Operand::Var(var.clone()), sources });
        }
    }
}

fn new_version(
    counters: &mut HashMap<String, u32>,
    stacks: &mut HashMap<String, Vec<String>>,
    base: &str,
) -> String {
    let counter = counters.entry(base.to_string()).or_insert(0);
    *counter += 1;
    let versioned = format!("{}{}", base, counter);
    stacks.entry(base.to_string()).or_default().push(versioned.clone());
    versioned
}

fn rewrite_use(op: &mut Operand, stacks: &HashMap<String, Vec<String>>) {
    if let Operand::Var(name) = op {
        if let Some(top) = stacks.get(name).and_then(|s| s.last()) {
            *name = top.clone();
        }
    }
}

/// Apply `rewrite_use` to every operand a (non-φ) instruction reads.
fn rename_uses(instr: &mut Instruction, stacks: &HashMap<String, Vec<String>>) {
    match instr {
        Instruction::BinOp { lhs, rhs, .. } => {
            rewrite_use(lhs, stacks);
            rewrite_use(rhs, stacks);
        }
        Instruction::UnOp { src, .. } | Instruction::Copy { src, .. } => rewrite_use(src, stacks),
        Instruction::CondJump { cond, .. } => rewrite_use(cond, stacks),
        Instruction::Return(v) | Instruction::Param(v) => rewrite_use(v, stacks),
        Instruction::Dispatch { receiver, .. } | Instruction::StaticDispatch { receiver, .. } => {
            rewrite_use(receiver, stacks)
        }
        Instruction::IsVoid { src, .. } => rewrite_use(src, stacks),
        Instruction::GetAttr { object, .. } => rewrite_use(object, stacks),
        Instruction::SetAttr { object, value, .. } => {
            rewrite_use(object, stacks);
            rewrite_use(value, stacks);
        }
        Instruction::Phi { .. }
        | Instruction::Label(_)
        | Instruction::Jump(_)
        | Instruction::Call { .. }
        | Instruction::New { .. }
        | Instruction::Comment(_) => {}
    }
}

fn dest_mut(instr: &mut Instruction) -> Option<&mut Operand> {
    match instr {
        Instruction::BinOp { dest, .. }
        | Instruction::UnOp { dest, .. }
        | Instruction::Copy { dest, .. }
        | Instruction::Phi { dest, .. }
        | Instruction::Call { dest, .. }
        | Instruction::New { dest, .. }
        | Instruction::Dispatch { dest, .. }
        | Instruction::StaticDispatch { dest, .. }
        | Instruction::IsVoid { dest, .. }
        | Instruction::GetAttr { dest, .. } => Some(dest),
        _ => None,
    }
}

/// Rename block `b`, recurse into its dominator-tree children, then pop
/// every version this block pushed.
fn rename_block(
    cfg: &mut Cfg,
    b: BlockId,
    dominance: &Dominance,
    counters: &mut HashMap<String, u32>,
    stacks: &mut HashMap<String, Vec<String>>,
) {
    let mut pushed: Vec<String> = Vec::new();

    // φ definitions rename first; their sources are filled in by the
    // predecessor blocks, not here.
    for instr in &mut cfg.blocks[b].instructions {
        if let Instruction::Phi { dest, .. } = instr {
            if let Operand::Var(base) = dest.clone() {
                let versioned = new_version(counters, stacks, &base);
                pushed.push(base);
                *dest = Operand::Var(versioned);
            }
        }
    }

    for instr in &mut cfg.blocks[b].instructions {
        if matches!(instr, Instruction::Phi { .. }) {
            continue;
        }
        rename_uses(instr, stacks);
        if let Some(dest) = dest_mut(instr) {
            if let Operand::Var(base) = dest.clone() {
                let versioned = new_version(counters, stacks, &base);
                pushed.push(base);
                *dest = Operand::Var(versioned);
            }
        }
    }

    for succ in cfg.blocks[b].succs.clone() {
        let Some(pred_index) = cfg.blocks[succ].preds.iter().position(|&p| p == b) else {
            continue;
        };
        for instr in &mut cfg.blocks[succ].instructions {
            if let Instruction::Phi { sources, .. } = instr {
                if let Some((value, _)) = sources.get_mut(pred_index) {
                    rewrite_use(value, stacks);
                }
            }
        }
    }

    for child in dominance.children[b].clone() {
        rename_block(cfg, child, dominance, counters, stacks);
    }

    for base in pushed {
        if let Some(stack) = stacks.get_mut(&base) {
            stack.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinOp, CondKind, ConstValue};

    /// entry: if cond goto then/else; then: x = 1; else: x = 2; join: ret x
    fn diamond_method() -> TACMethod {
        TACMethod {
            class_name: "Main".into(),
            method_name: "m".into(),
            params: vec![],
            instructions: vec![
                Instruction::CondJump {
                    cond: Operand::Const(ConstValue::Bool(true)),
                    target: "else_b".into(),
                    kind: CondKind::Falsy,
                },
                Instruction::Copy { dest: Operand::Var("x".into()), src: Operand::Const(ConstValue::Int(1)) },
                Instruction::Jump("join".into()),
                Instruction::Label("else_b".into()),
                Instruction::Copy { dest: Operand::Var("x".into()), src: Operand::Const(ConstValue::Int(2)) },
                Instruction::Label("join".into()),
                Instruction::Return(Operand::Var("x".into())),
            ],
        }
    }

    #[test]
    fn test_join_block_gets_a_phi() {
        let method = diamond_method();
        let cfg = Cfg::build(&method);
        let ssa = convert_to_ssa(&method, &cfg);
        assert!(ssa.instructions.iter().any(|i| matches!(i, Instruction::Phi { .. })));
    }

    #[test]
    fn test_phi_arity_matches_predecessor_count() {
        let method = diamond_method();
        let cfg = Cfg::build(&method);
        let ssa = convert_to_ssa(&method, &cfg);
        let phi = ssa
            .instructions
            .iter()
            .find_map(|i| match i {
                Instruction::Phi { sources, .. } => Some(sources),
                _ => None,
            })
            .unwrap();
        assert_eq!(phi.len(), 2);
    }

    #[test]
    fn test_return_uses_phi_result() {
        let method = diamond_method();
        let cfg = Cfg::build(&method);
        let ssa = convert_to_ssa(&method, &cfg);
        let phi_dest = ssa
            .instructions
            .iter()
            .find_map(|i| match i {
                Instruction::Phi { dest, .. } => Some(dest.clone()),
                _ => None,
            })
            .unwrap();
        let ret = ssa.instructions.iter().find_map(|i| match i {
            Instruction::Return(v) => Some(v.clone()),
            _ => None,
        });
        assert_eq!(ret, Some(phi_dest));
    }

    #[test]
    fn test_each_version_assigned_exactly_once() {
        let method = diamond_method();
        let cfg = Cfg::build(&method);
        let ssa = convert_to_ssa(&method, &cfg);
        let mut defs: Vec<String> = Vec::new();
        for instr in &ssa.instructions {
            defs.extend(instr.defs());
        }
        let mut seen = HashSet::new();
        for d in &defs {
            assert!(seen.insert(d.clone()), "name {} defined more than once", d);
        }
    }

    #[test]
    fn test_no_branches_no_phi_needed() {
        let method = TACMethod {
            class_name: "Main".into(),
            method_name: "m".into(),
            params: vec![],
            instructions: vec![
                Instruction::Copy { dest: Operand::Var("x".into()), src: Operand::Const(ConstValue::Int(1)) },
                Instruction::BinOp {
                    dest: Operand::Var("y".into()),
                    op: BinOp::Add,
                    lhs: Operand::Var("x".into()),
                    rhs: Operand::Const(ConstValue::Int(1)),
                },
                Instruction::Return(Operand::Var("y".into())),
            ],
        };
        let cfg = Cfg::build(&method);
        let ssa = convert_to_ssa(&method, &cfg);
        assert!(!ssa.instructions.iter().any(|i| matches!(i, Instruction::Phi { .. })));
        // x's single use should have been renamed to its sole version.
        assert!(ssa.instructions.iter().any(|i| matches!(
            i,
            Instruction::BinOp { lhs: Operand::Var(name), .. } if name == "x1"
        )));
    }
}
