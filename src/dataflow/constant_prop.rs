//! Sparse constant propagation: a flat three-value lattice per
//! variable (undefined / known constant / not-a-constant), propagated
//! forward over the CFG, followed by a separate fold pass that rewrites
//! operands the analysis proved constant and counts how many it
//! touched.
//!
//! Kept as two passes rather than one, mirroring how `ir::ssa` separates
//! placement from renaming: the analysis alone answers "what does this
//! variable hold here", and folding is just one consumer of that answer
//! (a CLI inspection subcommand is another).

use std::collections::HashMap;

use crate::dataflow::{solve, Direction, Lattice, Problem};
use crate::ir::cfg::Cfg;
use crate::ir::{BinOp, ConstValue, Instruction, Operand, TACMethod, UnOp};

/// The value a single variable is known to hold at a program point.
#[derive(Clone, Debug, PartialEq)]
pub enum ConstLattice {
    /// Not yet constrained by any reaching definition.
    Undefined,
    Const(ConstValue),
    /// Proven to take more than one value, or to come from a
    /// non-constant source (a dispatch result, an attribute read, ...).
    NotConst,
}

pub type Env = HashMap<String, ConstLattice>;

impl Lattice for ConstLattice {
    fn bottom() -> Self {
        ConstLattice::Undefined
    }

    fn meet(&self, other: &Self) -> Self {
        use ConstLattice::*;
        match (self, other) {
            (Undefined, x) | (x, Undefined) => x.clone(),
            (NotConst, _) | (_, NotConst) => NotConst,
            (Const(a), Const(b)) => {
                if a == b {
                    Const(a.clone())
                } else {
                    NotConst
                }
            }
        }
    }
}

/// Lifts `ConstLattice`'s meet pointwise over every variable name, with
/// a name absent from the map treated as `Undefined`.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvFact(pub Env);

impl Lattice for EnvFact {
    fn bottom() -> Self {
        EnvFact(HashMap::new())
    }

    fn meet(&self, other: &Self) -> Self {
        let mut merged = self.0.clone();
        for (name, value) in &other.0 {
            let combined = match merged.get(name) {
                Some(existing) => existing.meet(value),
                None => value.clone(),
            };
            merged.insert(name.clone(), combined);
        }
        EnvFact(merged)
    }
}

impl EnvFact {
    fn lookup(&self, op: &Operand) -> ConstLattice {
        match op {
            Operand::Const(c) => ConstLattice::Const(c.clone()),
            Operand::Temp(_) | Operand::Var(_) => op
                .name()
                .and_then(|n| self.0.get(&n).cloned())
                .unwrap_or(ConstLattice::Undefined),
            Operand::Label(_) => ConstLattice::NotConst,
        }
    }

    fn define(&mut self, name: String, value: ConstLattice) {
        self.0.insert(name, value);
    }
}

struct ConstantPropProblem;

impl Problem for ConstantPropProblem {
    type Fact = EnvFact;

    fn direction(&self) -> Direction {
        Direction::Forward
    }

    fn transfer(&self, instr: &Instruction, fact: &EnvFact) -> EnvFact {
        let mut env = fact.clone();
        match instr {
            Instruction::Copy { dest, src } => {
                if let Some(name) = dest.name() {
                    env.define(name, env.lookup(src));
                }
            }
            Instruction::BinOp { dest, op, lhs, rhs } => {
                if let Some(name) = dest.name() {
                    let value = eval_binop(*op, &env.lookup(lhs), &env.lookup(rhs));
                    env.define(name, value);
                }
            }
            Instruction::UnOp { dest, op, src } => {
                if let Some(name) = dest.name() {
                    let value = eval_unop(*op, &env.lookup(src));
                    env.define(name, value);
                }
            }
            Instruction::Phi { dest, sources } => {
                if let Some(name) = dest.name() {
                    let mut value = ConstLattice::Undefined;
                    for (src, _) in sources {
                        value = value.meet(&env.lookup(src));
                    }
                    env.define(name, value);
                }
            }
            other => {
                for name in other.defs() {
                    env.define(name, ConstLattice::NotConst);
                }
            }
        }
        env
    }
}

fn eval_binop(op: BinOp, lhs: &ConstLattice, rhs: &ConstLattice) -> ConstLattice {
    match (lhs, rhs) {
        (ConstLattice::NotConst, _) | (_, ConstLattice::NotConst) => ConstLattice::NotConst,
        (ConstLattice::Const(a), ConstLattice::Const(b)) => match fold_binop(op, a, b) {
            Some(v) => ConstLattice::Const(v),
            None => ConstLattice::NotConst,
        },
        _ => ConstLattice::Undefined,
    }
}

fn eval_unop(op: UnOp, src: &ConstLattice) -> ConstLattice {
    match src {
        ConstLattice::NotConst => ConstLattice::NotConst,
        ConstLattice::Const(v) => match fold_unop(op, v) {
            Some(v) => ConstLattice::Const(v),
            None => ConstLattice::NotConst,
        },
        ConstLattice::Undefined => ConstLattice::Undefined,
    }
}

fn fold_binop(op: BinOp, a: &ConstValue, b: &ConstValue) -> Option<ConstValue> {
    use ConstValue::*;
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
            let (Int(x), Int(y)) = (a, b) else { return None };
            match op {
                BinOp::Add => Some(Int(x.wrapping_add(*y))),
                BinOp::Sub => Some(Int(x.wrapping_sub(*y))),
                BinOp::Mul => Some(Int(x.wrapping_mul(*y))),
                // Division by a statically known zero is a runtime
                // error, not a fact this analysis should fold through.
                BinOp::Div => {
                    if *y == 0 {
                        None
                    } else {
                        Some(Int(x.wrapping_div(*y)))
                    }
                }
                _ => unreachable!(),
            }
        }
        BinOp::Lt | BinOp::Le => {
            let (Int(x), Int(y)) = (a, b) else { return None };
            Some(Bool(if op == BinOp::Lt { x < y } else { x <= y }))
        }
        BinOp::Eq => Some(Bool(a == b)),
    }
}

fn fold_unop(op: UnOp, v: &ConstValue) -> Option<ConstValue> {
    match (op, v) {
        (UnOp::Neg, ConstValue::Int(n)) => Some(ConstValue::Int(n.wrapping_neg())),
        (UnOp::Not, ConstValue::Bool(b)) => Some(ConstValue::Bool(!b)),
        _ => None,
    }
}

/// The analysis's result: the merged environment flowing into and out
/// of every block, keyed by `BlockId`.
#[derive(Clone, Debug, Default)]
pub struct ConstantPropResult {
    pub block_in: Vec<Env>,
    pub block_out: Vec<Env>,
}

/// Run constant propagation, then fold every use the analysis proved
/// constant back into `method.instructions`. Returns the analysis
/// result and the number of operands folded.
pub fn run(method: &mut TACMethod, cfg: &Cfg) -> (ConstantPropResult, usize) {
    let solution = solve(&ConstantPropProblem, method, cfg);
    let mut changes = 0usize;

    let mut folded_cfg = cfg.clone();
    for (b, block) in folded_cfg.blocks.iter_mut().enumerate() {
        let trace = &solution.traces[b];
        for (i, instr) in block.instructions.iter_mut().enumerate() {
            let env = &trace.ins[i];
            changes += fold_uses(instr, env);
        }
    }

    method.instructions = folded_cfg.linearize();

    let result = ConstantPropResult {
        block_in: solution.block_in.into_iter().map(|f| f.0).collect(),
        block_out: solution.block_out.into_iter().map(|f| f.0).collect(),
    };
    (result, changes)
}

/// Rewrites every foldable use in `instr` and reports whether the
/// instruction was touched at all (one change per instruction folded,
/// not one per operand — an `a + b` with both operands constant counts
/// once). A `BinOp`/`UnOp` whose operands are all constant after
/// rewriting is replaced outright with a `Copy` of the folded value, per
/// §4.8's fold pass.
fn fold_uses(instr: &mut Instruction, env: &EnvFact) -> usize {
    let mut any = false;
    let mut try_fold = |op: &mut Operand| {
        if matches!(op, Operand::Const(_) | Operand::Label(_)) {
            return;
        }
        if let ConstLattice::Const(c) = env.lookup(op) {
            *op = Operand::Const(c);
            any = true;
        }
    };

    let replacement = match instr {
        Instruction::BinOp { dest, op, lhs, rhs } => {
            try_fold(lhs);
            try_fold(rhs);
            match (&*lhs, &*rhs) {
                (Operand::Const(a), Operand::Const(b)) => fold_binop(*op, a, b)
                    .map(|v| Instruction::Copy { dest: dest.clone(), src: Operand::Const(v) }),
                _ => None,
            }
        }
        Instruction::UnOp { dest, op, src } => {
            try_fold(src);
            match &*src {
                Operand::Const(c) => fold_unop(*op, c)
                    .map(|v| Instruction::Copy { dest: dest.clone(), src: Operand::Const(v) }),
                _ => None,
            }
        }
        Instruction::Copy { src, .. } => {
            try_fold(src);
            None
        }
        Instruction::CondJump { cond, .. } => {
            try_fold(cond);
            None
        }
        Instruction::Return(v) | Instruction::Param(v) => {
            try_fold(v);
            None
        }
        Instruction::Dispatch { receiver, .. } | Instruction::StaticDispatch { receiver, .. } => {
            try_fold(receiver);
            None
        }
        Instruction::IsVoid { src, .. } => {
            try_fold(src);
            None
        }
        Instruction::GetAttr { object, .. } => {
            try_fold(object);
            None
        }
        Instruction::SetAttr { object, value, .. } => {
            try_fold(object);
            try_fold(value);
            None
        }
        Instruction::Phi { .. }
        | Instruction::Label(_)
        | Instruction::Jump(_)
        | Instruction::Call { .. }
        | Instruction::New { .. }
        | Instruction::Comment(_) => None,
    };

    if let Some(new_instr) = replacement {
        *instr = new_instr;
        return 1;
    }
    if any {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::cfg::Cfg;
    use crate::ir::{BinOp, CondKind};

    /// a = 2; b = 3; if cond goto L1 else fall through; then: c = a + b;
    /// goto L2; L1: c = a + b; L2: return c
    ///
    /// Both branches compute the same constant sum, so `c` is Const(5)
    /// at the join and both additions fold.
    fn diamond_fold_method() -> TACMethod {
        TACMethod {
            class_name: "Main".into(),
            method_name: "m".into(),
            params: vec![],
            instructions: vec![
                Instruction::Copy { dest: Operand::var("a"), src: Operand::Const(ConstValue::Int(2)) },
                Instruction::Copy { dest: Operand::var("b"), src: Operand::Const(ConstValue::Int(3)) },
                Instruction::CondJump {
                    cond: Operand::Const(ConstValue::Bool(true)),
                    target: "L1".into(),
                    kind: CondKind::Falsy,
                },
                Instruction::BinOp {
                    dest: Operand::var("c"),
                    op: BinOp::Add,
                    lhs: Operand::var("a"),
                    rhs: Operand::var("b"),
                },
                Instruction::Jump("L2".into()),
                Instruction::Label("L1".into()),
                Instruction::BinOp {
                    dest: Operand::var("c"),
                    op: BinOp::Add,
                    lhs: Operand::var("a"),
                    rhs: Operand::var("b"),
                },
                Instruction::Label("L2".into()),
                Instruction::Return(Operand::var("c")),
            ],
        }
    }

    #[test]
    fn test_constant_folds_through_diamond() {
        let mut method = diamond_fold_method();
        let cfg = Cfg::build(&method);
        let (result, changes) = run(&mut method, &cfg);

        assert_eq!(changes, 2);
        let join_id = Cfg::build(&method).blocks.iter().position(|b| b.label == "L2").unwrap();
        assert_eq!(
            result.block_in[join_id].get("c"),
            Some(&ConstLattice::Const(ConstValue::Int(5)))
        );

        let folds = method
            .instructions
            .iter()
            .filter(
                |i| matches!(i, Instruction::Copy { dest, src: Operand::Const(ConstValue::Int(5)) } if dest.name().as_deref() == Some("c")),
            )
            .count();
        assert_eq!(folds, 2, "each a+b should become a copy of the constant 5, not a runtime binop");
        assert!(!method.instructions.iter().any(|i| matches!(i, Instruction::BinOp { .. })));
    }

    #[test]
    fn test_division_by_zero_becomes_not_const() {
        let mut method = TACMethod {
            class_name: "Main".into(),
            method_name: "m".into(),
            params: vec![],
            instructions: vec![
                Instruction::BinOp {
                    dest: Operand::var("x"),
                    op: BinOp::Div,
                    lhs: Operand::Const(ConstValue::Int(1)),
                    rhs: Operand::Const(ConstValue::Int(0)),
                },
                Instruction::Return(Operand::var("x")),
            ],
        };
        let cfg = Cfg::build(&method);
        let (_, changes) = run(&mut method, &cfg);
        assert_eq!(changes, 0);
    }

    #[test]
    fn test_dispatch_result_is_not_constant() {
        let env = EnvFact(HashMap::new());
        let mut fact = env;
        fact.define("r".into(), ConstLattice::Undefined);
        let instr = Instruction::Dispatch {
            dest: Operand::var("r"),
            receiver: Operand::var("self"),
            method: "foo".into(),
            num_args: 0,
        };
        let out = ConstantPropProblem.transfer(&instr, &fact);
        assert_eq!(out.0.get("r"), Some(&ConstLattice::NotConst));
    }
}
