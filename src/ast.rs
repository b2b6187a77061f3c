//! Abstract syntax tree produced by the parser.

pub mod navigate;

use std::cell::RefCell;

use crate::span::{Span, Spanned};
use crate::types::Ty;

#[derive(Clone, Debug)]
pub struct Program {
    pub classes: Vec<Class>,
}

#[derive(Clone, Debug)]
pub struct Class {
    pub name: Spanned<String>,
    pub parent: Option<Spanned<String>>,
    pub features: Vec<Feature>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum Feature {
    Method(Method),
    Attribute(Attribute),
}

#[derive(Clone, Debug)]
pub struct Method {
    pub name: Spanned<String>,
    pub formals: Vec<Formal>,
    pub return_type: Spanned<String>,
    pub body: Expr,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: Spanned<String>,
    pub declared_type: Spanned<String>,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct Formal {
    pub name: Spanned<String>,
    pub declared_type: Spanned<String>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct LetBinding {
    pub name: Spanned<String>,
    pub declared_type: Spanned<String>,
    pub init: Option<Expr>,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub struct CaseArm {
    pub name: Spanned<String>,
    pub declared_type: Spanned<String>,
    pub body: Expr,
    pub span: Span,
}

/// An expression node. The type checker fills in `ty` during semantic
/// analysis; it stays `None` for any expression not visited (e.g. inside
/// a class the analyzer rejected before reaching bodies).
#[derive(Clone, Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub ty: RefCell<Option<Ty>>,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span, ty: RefCell::new(None) }
    }

    pub fn set_type(&self, ty: Ty) {
        *self.ty.borrow_mut() = Some(ty);
    }

    pub fn get_type(&self) -> Option<Ty> {
        self.ty.borrow().clone()
    }
}

#[derive(Clone, Debug)]
pub enum ExprKind {
    Assign(Spanned<String>, Box<Expr>),
    StaticDispatch {
        receiver: Box<Expr>,
        dispatch_type: Spanned<String>,
        method: Spanned<String>,
        args: Vec<Expr>,
    },
    Dispatch {
        receiver: Box<Expr>,
        method: Spanned<String>,
        args: Vec<Expr>,
    },
    /// A dispatch with no explicit receiver; sugar for `self.method(args)`.
    SelfDispatch {
        method: Spanned<String>,
        args: Vec<Expr>,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    While {
        cond: Box<Expr>,
        body: Box<Expr>,
    },
    Block(Vec<Expr>),
    Let {
        bindings: Vec<LetBinding>,
        body: Box<Expr>,
    },
    Case {
        scrutinee: Box<Expr>,
        arms: Vec<CaseArm>,
    },
    New(Spanned<String>),
    Isvoid(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    IntConst(i32),
    StringConst(String),
    BoolConst(bool),
    Object(String),
    NoExpr,
}

impl Class {
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.features.iter().filter_map(|f| match f {
            Feature::Method(m) => Some(m),
            Feature::Attribute(_) => None,
        })
    }

    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.features.iter().filter_map(|f| match f {
            Feature::Attribute(a) => Some(a),
            Feature::Method(_) => None,
        })
    }
}
