//! Three-address code (TAC): the linear IR produced by lowering a
//! type-checked AST (`ir::builder`), consumed by CFG construction
//! (`ir::cfg`), SSA conversion (`ir::ssa`), and the data-flow analyses in
//! `crate::dataflow`.
//!
//! Every instruction exposes `defs()`/`uses()` over *names* (`t<index>` for
//! temporaries, the bare identifier for named variables) rather than
//! operands, because data-flow problems are stated over variable names:
//! constants never participate, and an SSA-renamed operand is still just a
//! name with a version suffix.

pub mod builder;
pub mod cfg;
pub mod ssa;

use std::fmt;

// ─── Operands ──────────────────────────────────────────────────────

/// A compile-time constant, tagged with the primitive type it was folded
/// from (needed so `binop`'s transfer function in constant propagation
/// knows which arithmetic to perform).
#[derive(Clone, Debug, PartialEq)]
pub enum ConstValue {
    Int(i32),
    Bool(bool),
    Str(String),
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Int(n) => write!(f, "{}", n),
            ConstValue::Bool(b) => write!(f, "{}", b),
            ConstValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// An operand referenced by a TAC instruction: a fresh temporary, a named
/// variable (locals, formals, `self`, and post-SSA versioned names alike),
/// a constant, or a jump-target label.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Temp(u32),
    Var(String),
    Const(ConstValue),
    Label(String),
}

impl Operand {
    pub fn var(name: impl Into<String>) -> Self {
        Operand::Var(name.into())
    }

    /// The data-flow name this operand reads/writes under, or `None` for
    /// operands with no storage (constants, labels used as jump targets).
    pub fn name(&self) -> Option<String> {
        match self {
            Operand::Temp(idx) => Some(format!("t{}", idx)),
            Operand::Var(name) => Some(name.clone()),
            Operand::Const(_) | Operand::Label(_) => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Temp(idx) => write!(f, "t{}", idx),
            Operand::Var(name) => write!(f, "{}", name),
            Operand::Const(c) => write!(f, "{}", c),
            Operand::Label(name) => write!(f, "{}", name),
        }
    }
}

// ─── Operators ─────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Eq,
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Eq => "=",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

impl fmt::Display for UnOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnOp::Neg => "~",
            UnOp::Not => "not",
        };
        write!(f, "{}", s)
    }
}

/// Whether a conditional jump fires on a truthy or a falsy predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CondKind {
    Truthy,
    Falsy,
}

// ─── Instructions ──────────────────────────────────────────────────

/// One three-address instruction. Families of the data model:
/// pure (`BinOp`/`UnOp`/`Copy`/`Phi`), control (`Label`/`Jump`/`CondJump`/
/// `Return`), procedural (`Param`/`Call`), OO (`New`/`Dispatch`/
/// `StaticDispatch`/`IsVoid`/`GetAttr`/`SetAttr`), and inert (`Comment`).
///
/// COOL method bodies are a single expression, so there is exactly one
/// return form (unlike a statement language's bare vs. value-carrying
/// return): `Return` always carries the method's result operand.
#[derive(Clone, Debug)]
pub enum Instruction {
    BinOp {
        dest: Operand,
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
    },
    UnOp {
        dest: Operand,
        op: UnOp,
        src: Operand,
    },
    Copy {
        dest: Operand,
        src: Operand,
    },
    /// `dest = phi(sources)`, one `(value, predecessor_label)` pair per
    /// predecessor of the owning block, in predecessor order.
    Phi {
        dest: Operand,
        sources: Vec<(Operand, String)>,
    },
    Label(String),
    Jump(String),
    CondJump {
        cond: Operand,
        target: String,
        kind: CondKind,
    },
    Return(Operand),
    Param(Operand),
    Call {
        dest: Operand,
        name: String,
        num_args: usize,
    },
    New {
        dest: Operand,
        class_name: String,
    },
    Dispatch {
        dest: Operand,
        receiver: Operand,
        method: String,
        num_args: usize,
    },
    StaticDispatch {
        dest: Operand,
        receiver: Operand,
        static_type: String,
        method: String,
        num_args: usize,
    },
    IsVoid {
        dest: Operand,
        src: Operand,
    },
    GetAttr {
        dest: Operand,
        object: Operand,
        attr: String,
    },
    SetAttr {
        object: Operand,
        attr: String,
        value: Operand,
    },
    Comment(String),
}

impl Instruction {
    /// Names this instruction writes.
    pub fn defs(&self) -> Vec<String> {
        match self {
            Instruction::BinOp { dest, .. }
            | Instruction::UnOp { dest, .. }
            | Instruction::Copy { dest, .. }
            | Instruction::Phi { dest, .. }
            | Instruction::Call { dest, .. }
            | Instruction::New { dest, .. }
            | Instruction::Dispatch { dest, .. }
            | Instruction::StaticDispatch { dest, .. }
            | Instruction::IsVoid { dest, .. }
            | Instruction::GetAttr { dest, .. } => dest.name().into_iter().collect(),
            Instruction::Label(_)
            | Instruction::Jump(_)
            | Instruction::CondJump { .. }
            | Instruction::Return(_)
            | Instruction::Param(_)
            | Instruction::SetAttr { .. }
            | Instruction::Comment(_) => Vec::new(),
        }
    }

    /// Names this instruction reads. Constants never appear.
    pub fn uses(&self) -> Vec<String> {
        match self {
            Instruction::BinOp { lhs, rhs, .. } => {
                lhs.name().into_iter().chain(rhs.name()).collect()
            }
            Instruction::UnOp { src, .. } => src.name().into_iter().collect(),
            Instruction::Copy { src, .. } => src.name().into_iter().collect(),
            Instruction::Phi { sources, .. } => {
                sources.iter().filter_map(|(v, _)| v.name()).collect()
            }
            Instruction::Label(_) => Vec::new(),
            Instruction::Jump(_) => Vec::new(),
            Instruction::CondJump { cond, .. } => cond.name().into_iter().collect(),
            Instruction::Return(v) => v.name().into_iter().collect(),
            Instruction::Param(v) => v.name().into_iter().collect(),
            Instruction::Call { .. } => Vec::new(),
            Instruction::New { .. } => Vec::new(),
            Instruction::Dispatch { receiver, .. } => receiver.name().into_iter().collect(),
            Instruction::StaticDispatch { receiver, .. } => receiver.name().into_iter().collect(),
            Instruction::IsVoid { src, .. } => src.name().into_iter().collect(),
            Instruction::GetAttr { object, .. } => object.name().into_iter().collect(),
            Instruction::SetAttr { object, value, .. } => {
                object.name().into_iter().chain(value.name()).collect()
            }
            Instruction::Comment(_) => Vec::new(),
        }
    }

    pub fn is_jump(&self) -> bool {
        matches!(
            self,
            Instruction::Jump(_) | Instruction::CondJump { .. } | Instruction::Return(_)
        )
    }

    /// Label targets this instruction can transfer control to (excludes
    /// the implicit fall-through successor of a conditional jump).
    pub fn jump_targets(&self) -> Vec<&str> {
        match self {
            Instruction::Jump(target) => vec![target.as_str()],
            Instruction::CondJump { target, .. } => vec![target.as_str()],
            _ => Vec::new(),
        }
    }

    /// Whether this instruction can have observable effects beyond
    /// defining its destination, and so must never be deleted by DCE.
    pub fn has_side_effects(&self) -> bool {
        matches!(
            self,
            Instruction::Call { .. }
                | Instruction::Dispatch { .. }
                | Instruction::StaticDispatch { .. }
                | Instruction::New { .. }
                | Instruction::SetAttr { .. }
                | Instruction::Return(_)
                | Instruction::Jump(_)
                | Instruction::CondJump { .. }
                | Instruction::Label(_)
                | Instruction::Param(_)
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::BinOp { dest, op, lhs, rhs } => {
                write!(f, "{} = {} {} {}", dest, lhs, op, rhs)
            }
            Instruction::UnOp { dest, op, src } => write!(f, "{} = {} {}", dest, op, src),
            Instruction::Copy { dest, src } => write!(f, "{} = {}", dest, src),
            Instruction::Phi { dest, sources } => {
                let parts: Vec<String> = sources
                    .iter()
                    .map(|(v, label)| format!("{}@{}", v, label))
                    .collect();
                write!(f, "{} = phi({})", dest, parts.join(", "))
            }
            Instruction::Label(name) => write!(f, "{}:", name),
            Instruction::Jump(target) => write!(f, "goto {}", target),
            Instruction::CondJump { cond, target, kind } => match kind {
                CondKind::Truthy => write!(f, "if {} goto {}", cond, target),
                CondKind::Falsy => write!(f, "ifnot {} goto {}", cond, target),
            },
            Instruction::Return(v) => write!(f, "return {}", v),
            Instruction::Param(v) => write!(f, "param {}", v),
            Instruction::Call { dest, name, num_args } => {
                write!(f, "{} = call {}, {}", dest, name, num_args)
            }
            Instruction::New { dest, class_name } => write!(f, "{} = new {}", dest, class_name),
            Instruction::Dispatch { dest, receiver, method, num_args } => {
                write!(f, "{} = dispatch {}.{}, {}", dest, receiver, method, num_args)
            }
            Instruction::StaticDispatch { dest, receiver, static_type, method, num_args } => {
                write!(
                    f,
                    "{} = static_dispatch {}@{}.{}, {}",
                    dest, receiver, static_type, method, num_args
                )
            }
            Instruction::IsVoid { dest, src } => write!(f, "{} = isvoid {}", dest, src),
            Instruction::GetAttr { dest, object, attr } => {
                write!(f, "{} = get_attr {}, {}", dest, object, attr)
            }
            Instruction::SetAttr { object, attr, value } => {
                write!(f, "set_attr {}, {}, {}", object, attr, value)
            }
            Instruction::Comment(text) => write!(f, "// {}", text),
        }
    }
}

// ─── Methods & programs ────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct TACMethod {
    pub class_name: String,
    pub method_name: String,
    pub params: Vec<String>,
    pub instructions: Vec<Instruction>,
}

impl fmt::Display for TACMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}.{}({}):", self.class_name, self.method_name, self.params.join(", "))?;
        for instr in &self.instructions {
            writeln!(f, "    {}", instr)?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct TACProgram {
    pub methods: Vec<TACMethod>,
}

impl fmt::Display for TACProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for method in &self.methods {
            writeln!(f, "{}", method)?;
        }
        Ok(())
    }
}

// ─── Fresh-name generators ─────────────────────────────────────────

/// Monotonically increasing temp counter, reset per method.
#[derive(Default)]
pub struct TempGenerator {
    next: u32,
}

impl TempGenerator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }

    pub fn next(&mut self) -> Operand {
        let id = self.next;
        self.next += 1;
        Operand::Temp(id)
    }
}

/// Shared per-translator label counter. Accepts a naming hint so TAC/CFG/
/// SSA dumps stay readable (`else0`, `endif0`, `while1`, ...).
#[derive(Default)]
pub struct LabelGenerator {
    next: u32,
}

impl LabelGenerator {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    pub fn next(&mut self, hint: &str) -> String {
        let id = self.next;
        self.next += 1;
        if hint.is_empty() {
            format!("L{}", id)
        } else {
            format!("{}{}", hint, id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operand_name() {
        assert_eq!(Operand::Temp(3).name(), Some("t3".to_string()));
        assert_eq!(Operand::Var("x".to_string()).name(), Some("x".to_string()));
        assert_eq!(Operand::Const(ConstValue::Int(1)).name(), None);
        assert_eq!(Operand::Label("L0".to_string()).name(), None);
    }

    #[test]
    fn test_defs_uses_binop() {
        let instr = Instruction::BinOp {
            dest: Operand::Temp(2),
            op: BinOp::Add,
            lhs: Operand::Temp(0),
            rhs: Operand::Temp(1),
        };
        assert_eq!(instr.defs(), vec!["t2".to_string()]);
        assert_eq!(instr.uses(), vec!["t0".to_string(), "t1".to_string()]);
    }

    #[test]
    fn test_defs_uses_const_excluded() {
        let instr = Instruction::Copy {
            dest: Operand::Temp(0),
            src: Operand::Const(ConstValue::Int(42)),
        };
        assert_eq!(instr.defs(), vec!["t0".to_string()]);
        assert!(instr.uses().is_empty());
    }

    #[test]
    fn test_side_effects_and_jump_targets() {
        let call = Instruction::Dispatch {
            dest: Operand::Temp(0),
            receiver: Operand::Var("self".to_string()),
            method: "foo".to_string(),
            num_args: 0,
        };
        assert!(call.has_side_effects());
        assert!(!call.is_jump());

        let jump = Instruction::CondJump {
            cond: Operand::Temp(0),
            target: "L1".to_string(),
            kind: CondKind::Falsy,
        };
        assert!(jump.is_jump());
        assert_eq!(jump.jump_targets(), vec!["L1"]);
    }

    #[test]
    fn test_temp_generator_resets() {
        let mut gen = TempGenerator::new();
        assert_eq!(gen.next(), Operand::Temp(0));
        assert_eq!(gen.next(), Operand::Temp(1));
        gen.reset();
        assert_eq!(gen.next(), Operand::Temp(0));
    }

    #[test]
    fn test_label_generator_hints() {
        let mut gen = LabelGenerator::new();
        assert_eq!(gen.next("else"), "else0");
        assert_eq!(gen.next("else"), "else1");
        assert_eq!(gen.next(""), "L2");
    }

    #[test]
    fn test_instruction_display() {
        let instr = Instruction::BinOp {
            dest: Operand::Temp(2),
            op: BinOp::Lt,
            lhs: Operand::Temp(0),
            rhs: Operand::Temp(1),
        };
        assert_eq!(format!("{}", instr), "t2 = t0 < t1");
    }
}
