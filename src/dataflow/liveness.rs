//! Backward liveness: which variables a program point's value
//! might still be read by before the method returns. Built on top of
//! liveness: dead-code elimination, per-variable live ranges, and the
//! interference graph a downstream register allocator would consume.

use std::collections::{HashMap, HashSet};

use crate::dataflow::{solve, Direction, Lattice, Problem};
use crate::ir::cfg::{BlockId, Cfg};
use crate::ir::{Instruction, TACMethod};

#[derive(Clone, Debug, PartialEq, Default)]
pub struct LiveSet(pub HashSet<String>);

impl Lattice for LiveSet {
    fn bottom() -> Self {
        LiveSet(HashSet::new())
    }

    fn meet(&self, other: &Self) -> Self {
        LiveSet(self.0.union(&other.0).cloned().collect())
    }
}

struct LivenessProblem;

impl Problem for LivenessProblem {
    type Fact = LiveSet;

    fn direction(&self) -> Direction {
        Direction::Backward
    }

    /// `in[s] = uses(s) ∪ (out[s] \ defs(s))`, computed here in reverse:
    /// `transfer` walks instructions back to front, so `fact` arrives as
    /// `out[s]` and the result is `in[s]`.
    fn transfer(&self, instr: &Instruction, fact: &LiveSet) -> LiveSet {
        let mut live = fact.0.clone();
        for d in instr.defs() {
            live.remove(&d);
        }
        for u in instr.uses() {
            live.insert(u);
        }
        LiveSet(live)
    }
}

/// Live-in/live-out sets for every block, plus the per-instruction
/// live-out trace DCE and live-range computation both walk.
#[derive(Clone, Debug, Default)]
pub struct LivenessResult {
    pub live_in: Vec<HashSet<String>>,
    pub live_out: Vec<HashSet<String>>,
    /// `instr_live_out[b][i]` is the set of names live immediately after
    /// `cfg.blocks[b].instructions[i]` executes.
    pub instr_live_out: Vec<Vec<HashSet<String>>>,
}

pub fn analyze(method: &TACMethod, cfg: &Cfg) -> LivenessResult {
    let solution = solve(&LivenessProblem, method, cfg);
    let instr_live_out =
        solution.traces.iter().map(|t| t.outs.iter().map(|f| f.0.clone()).collect()).collect();
    LivenessResult {
        live_in: solution.block_in.into_iter().map(|f| f.0).collect(),
        live_out: solution.block_out.into_iter().map(|f| f.0).collect(),
        instr_live_out,
    }
}

/// Delete instructions whose single definition is never live and which
/// carry no side effect, iterating to a fixed point (removing one dead
/// definition can make another instruction's def dead in turn). Returns
/// the number of instructions removed.
pub fn eliminate_dead_code(method: &mut TACMethod, cfg: &Cfg) -> usize {
    let mut working = cfg.clone();
    let mut total_removed = 0usize;

    loop {
        let liveness = analyze(method, &working);
        let mut removed_this_pass = 0usize;

        for (b, block) in working.blocks.iter_mut().enumerate() {
            let live_out = &liveness.instr_live_out[b];
            let mut keep = Vec::with_capacity(block.instructions.len());
            for (i, instr) in block.instructions.drain(..).enumerate() {
                let dead = !instr.has_side_effects()
                    && instr
                        .defs()
                        .iter()
                        .all(|d| !live_out.get(i).map(|s| s.contains(d)).unwrap_or(true));
                if dead && !instr.defs().is_empty() {
                    removed_this_pass += 1;
                } else {
                    keep.push(instr);
                }
            }
            block.instructions = keep;
        }

        total_removed += removed_this_pass;
        if removed_this_pass == 0 {
            break;
        }
    }

    method.instructions = working.linearize();
    total_removed
}

/// For every variable, the set of `(block, instruction-index)` program
/// points across which it is live — the union of every block's
/// live-in/out window the variable actually touches.
#[derive(Clone, Debug, Default)]
pub struct LiveRanges {
    pub ranges: HashMap<String, HashSet<(BlockId, usize)>>,
}

pub fn compute_live_ranges(method: &TACMethod, cfg: &Cfg, liveness: &LivenessResult) -> LiveRanges {
    let _ = method;
    let mut ranges: HashMap<String, HashSet<(BlockId, usize)>> = HashMap::new();
    for (b, block) in cfg.blocks.iter().enumerate() {
        for (i, _) in block.instructions.iter().enumerate() {
            if let Some(live_out) = liveness.instr_live_out[b].get(i) {
                for name in live_out {
                    ranges.entry(name.clone()).or_default().insert((b, i));
                }
            }
        }
    }
    LiveRanges { ranges }
}

/// Two variables interfere if some program point lies in both of their
/// live ranges — the classic definition an allocator's graph-coloring
/// pass expects.
#[derive(Clone, Debug, Default)]
pub struct InterferenceGraph {
    pub edges: HashMap<String, HashSet<String>>,
}

impl InterferenceGraph {
    pub fn add_edge(&mut self, a: &str, b: &str) {
        if a == b {
            return;
        }
        self.edges.entry(a.to_string()).or_default().insert(b.to_string());
        self.edges.entry(b.to_string()).or_default().insert(a.to_string());
    }

    pub fn interferes(&self, a: &str, b: &str) -> bool {
        self.edges.get(a).map(|s| s.contains(b)).unwrap_or(false)
    }
}

pub fn build_interference_graph(
    method: &TACMethod,
    cfg: &Cfg,
    liveness: &LivenessResult,
) -> InterferenceGraph {
    let _ = method;
    let mut graph = InterferenceGraph::default();
    for (b, block) in cfg.blocks.iter().enumerate() {
        for i in 0..block.instructions.len() {
            let Some(live_out) = liveness.instr_live_out[b].get(i) else { continue };
            let names: Vec<&String> = live_out.iter().collect();
            for (idx, a) in names.iter().enumerate() {
                for bname in &names[idx + 1..] {
                    graph.add_edge(a, bname);
                }
            }
        }
    }
    graph
}
