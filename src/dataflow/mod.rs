//! A generic fixed-point data-flow framework, instantiated below
//! by constant propagation (`constant_prop`) and liveness (`liveness`).
//!
//! Every concrete analysis supplies a `Lattice` (bottom, top, meet) and a
//! `Transfer` function from an instruction and an incoming fact to an
//! outgoing one; `Driver::run` iterates blocks in the direction-correct
//! order until no fact changes, exposing both per-block and
//! per-instruction in/out values so callers can fold or eliminate code
//! afterward without recomputing anything.

pub mod constant_prop;
pub mod liveness;

use std::collections::HashMap;

use crate::ir::cfg::{BlockId, Cfg};
use crate::ir::{Instruction, TACMethod};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// A join-semilattice of data-flow facts. `meet` must be commutative,
/// associative, and idempotent; `bottom` is `meet`'s identity.
pub trait Lattice: Clone + PartialEq {
    fn bottom() -> Self;
    fn meet(&self, other: &Self) -> Self;
}

/// A concrete data-flow problem: its lattice, its direction, and its
/// instruction transfer function.
pub trait Problem {
    type Fact: Lattice;

    fn direction(&self) -> Direction;

    /// The fact to seed the entry block's `in` (forward) or every exit
    /// block's `out` (backward) with, before any transfer runs.
    fn boundary(&self) -> Self::Fact {
        Self::Fact::bottom()
    }

    fn transfer(&self, instr: &Instruction, fact: &Self::Fact) -> Self::Fact;
}

/// Per-instruction facts within one block, indexed by position. `ins[i]`
/// is the fact flowing into `instructions[i]`; `outs[i]` the fact
/// flowing out.
#[derive(Clone, Debug, Default)]
pub struct BlockTrace<F> {
    pub ins: Vec<F>,
    pub outs: Vec<F>,
}

/// The result of running a data-flow problem to a fixed point: the
/// block-boundary facts plus, for every block, the instruction-level
/// trace a fold or DCE pass walks over.
#[derive(Clone, Debug, Default)]
pub struct Solution<F> {
    pub block_in: Vec<F>,
    pub block_out: Vec<F>,
    pub traces: Vec<BlockTrace<F>>,
}

/// Iterate `block_in`/`block_out` to a fixed point over `cfg` under
/// `problem`, then re-walk every block once more to record the
/// instruction-level trace each concrete analysis exposes.
pub fn solve<P: Problem>(problem: &P, method: &TACMethod, cfg: &Cfg) -> Solution<P::Fact> {
    let n = cfg.blocks.len();
    if n == 0 {
        return Solution { block_in: Vec::new(), block_out: Vec::new(), traces: Vec::new() };
    }

    let mut block_in = vec![P::Fact::bottom(); n];
    let mut block_out = vec![P::Fact::bottom(); n];

    let order = match problem.direction() {
        Direction::Forward => cfg.reverse_postorder(),
        Direction::Backward => cfg.postorder(),
    };

    let boundary_blocks: Vec<BlockId> = match problem.direction() {
        Direction::Forward => vec![cfg.entry],
        Direction::Backward => cfg.exits.clone(),
    };
    for &b in &boundary_blocks {
        match problem.direction() {
            Direction::Forward => block_in[b] = problem.boundary(),
            Direction::Backward => block_out[b] = problem.boundary(),
        }
    }

    let mut changed = true;
    while changed {
        changed = false;
        for &b in &order {
            match problem.direction() {
                Direction::Forward => {
                    let mut incoming = if boundary_blocks.contains(&b) {
                        problem.boundary()
                    } else {
                        P::Fact::bottom()
                    };
                    for &p in &cfg.blocks[b].preds {
                        incoming = incoming.meet(&block_out[p]);
                    }
                    if incoming != block_in[b] {
                        block_in[b] = incoming.clone();
                        changed = true;
                    }
                    let out = run_block_forward(problem, &cfg.blocks[b].instructions, &block_in[b]);
                    if out != block_out[b] {
                        block_out[b] = out;
                        changed = true;
                    }
                }
                Direction::Backward => {
                    let mut outgoing = if boundary_blocks.contains(&b) {
                        problem.boundary()
                    } else {
                        P::Fact::bottom()
                    };
                    for &s in &cfg.blocks[b].succs {
                        outgoing = outgoing.meet(&block_in[s]);
                    }
                    if outgoing != block_out[b] {
                        block_out[b] = outgoing.clone();
                        changed = true;
                    }
                    let in_fact =
                        run_block_backward(problem, &cfg.blocks[b].instructions, &block_out[b]);
                    if in_fact != block_in[b] {
                        block_in[b] = in_fact;
                        changed = true;
                    }
                }
            }
        }
    }

    let mut traces = Vec::with_capacity(n);
    for b in 0..n {
        let boundary = match problem.direction() {
            Direction::Forward => &block_in[b],
            Direction::Backward => &block_out[b],
        };
        traces.push(trace_block(problem, &cfg.blocks[b].instructions, boundary, problem.direction()));
    }

    let _ = method;
    Solution { block_in, block_out, traces }
}

fn run_block_forward<P: Problem>(problem: &P, instrs: &[Instruction], entry: &P::Fact) -> P::Fact {
    let mut fact = entry.clone();
    for instr in instrs {
        fact = problem.transfer(instr, &fact);
    }
    fact
}

fn run_block_backward<P: Problem>(problem: &P, instrs: &[Instruction], exit: &P::Fact) -> P::Fact {
    let mut fact = exit.clone();
    for instr in instrs.iter().rev() {
        fact = problem.transfer(instr, &fact);
    }
    fact
}

fn trace_block<P: Problem>(
    problem: &P,
    instrs: &[Instruction],
    boundary: &P::Fact,
    direction: Direction,
) -> BlockTrace<P::Fact> {
    let mut ins = Vec::with_capacity(instrs.len());
    let mut outs = Vec::with_capacity(instrs.len());
    match direction {
        Direction::Forward => {
            let mut fact = boundary.clone();
            for instr in instrs {
                ins.push(fact.clone());
                fact = problem.transfer(instr, &fact);
                outs.push(fact.clone());
            }
        }
        Direction::Backward => {
            let mut fact = boundary.clone();
            let mut rev_ins = Vec::with_capacity(instrs.len());
            let mut rev_outs = Vec::with_capacity(instrs.len());
            for instr in instrs.iter().rev() {
                rev_outs.push(fact.clone());
                fact = problem.transfer(instr, &fact);
                rev_ins.push(fact.clone());
            }
            rev_ins.reverse();
            rev_outs.reverse();
            ins = rev_ins;
            outs = rev_outs;
        }
    }
    BlockTrace { ins, outs }
}
