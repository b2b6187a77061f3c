//! Phased semantic analyzer. Builds the class graph (see `classgraph.rs`)
//! and then type-checks every method body and attribute initializer.

pub mod expr;

use std::collections::HashMap;

use crate::ast::Program;
use crate::classgraph::ClassGraph;
use crate::diagnostic::{has_fatal, Diagnostic, ErrorKind};
use crate::types::{is_subtype, Ty};

/// The `O` environment: a stack of lexical scopes, each binding an
/// identifier to its static type. `let` and `case` push a scope; method
/// bodies start from one scope seeded with `self` and the class's full
/// (inherited + own) attribute set.
pub struct Env<'a> {
    pub graph: &'a ClassGraph,
    pub current_class: String,
    scopes: Vec<HashMap<String, Ty>>,
}

impl<'a> Env<'a> {
    fn new(graph: &'a ClassGraph, current_class: String) -> Self {
        Self { graph, current_class, scopes: Vec::new() }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn bind(&mut self, name: String, ty: Ty) {
        self.scopes.last_mut().expect("bind called with no active scope").insert(name, ty);
    }

    pub fn lookup(&self, name: &str) -> Option<Ty> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).cloned())
    }

    pub fn is_subtype(&self, sub: &Ty, sup: &Ty) -> bool {
        is_subtype(sub, sup, self.graph, &self.current_class)
    }

    pub fn lub(&self, a: &Ty, b: &Ty) -> Ty {
        crate::types::lub(a, b, self.graph, &self.current_class)
    }
}

pub fn analyze(program: &Program) -> Result<ClassGraph, Vec<Diagnostic>> {
    let graph = ClassGraph::build(program)?;

    let mut diagnostics = Vec::new();
    for class in &program.classes {
        check_class(class, &graph, &mut diagnostics);
    }

    if has_fatal(&diagnostics) {
        Err(diagnostics)
    } else {
        Ok(graph)
    }
}

fn check_class(class: &crate::ast::Class, graph: &ClassGraph, diagnostics: &mut Vec<Diagnostic>) {
    let mut env = Env::new(graph, class.name.node.clone());
    env.push_scope();
    env.bind("self".to_string(), Ty::SelfType(class.name.node.clone()));
    if let Some(attrs) = graph.attributes(&class.name.node) {
        for (name, ty) in attrs {
            env.bind(name.clone(), ty.clone());
        }
    }

    for attribute in class.attributes() {
        if let Some(init) = &attribute.init {
            let declared = Ty::from_name(&attribute.declared_type.node, &class.name.node);
            let actual = expr::check_expr(init, &mut env, diagnostics);
            if !env.is_subtype(&actual, &declared) {
                diagnostics.push(
                    Diagnostic::error(
                        ErrorKind::TypeMismatch,
                        format!(
                            "initializer for attribute '{}' has type {} which is not a subtype of declared type {}",
                            attribute.name.node,
                            actual.display(),
                            declared.display()
                        ),
                        init.span,
                    ),
                );
            }
        }
    }

    for method in class.methods() {
        env.push_scope();
        for formal in &method.formals {
            env.bind(formal.name.node.clone(), Ty::from_name(&formal.declared_type.node, &class.name.node));
        }
        let actual = expr::check_expr(&method.body, &mut env, diagnostics);
        let declared = Ty::from_name(&method.return_type.node, &class.name.node);
        if !env.is_subtype(&actual, &declared) {
            diagnostics.push(Diagnostic::error(
                ErrorKind::TypeMismatch,
                format!(
                    "method '{}' declares return type {} but its body has type {}",
                    method.name.node,
                    declared.display(),
                    actual.display()
                ),
                method.body.span,
            ));
        }
        env.pop_scope();
    }

    env.pop_scope();
}
