//! Class hierarchy: builtins, inheritance validation, and the linearized
//! method/attribute tables every later phase (type checker, IR builder)
//! looks up through.

use std::collections::{HashMap, HashSet};

use crate::ast::Program;
use crate::diagnostic::{Diagnostic, ErrorKind, Severity};
use crate::span::Span;
use crate::types::Ty;

fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.severity == Severity::Error)
}

#[derive(Clone, Debug)]
pub struct MethodSig {
    pub params: Vec<Ty>,
    pub return_ty: Ty,
    pub defined_in: String,
}

#[derive(Clone, Debug)]
struct ClassInfo {
    parent: Option<String>,
    span: Span,
    own_attributes: HashMap<String, (Ty, Span)>,
    own_methods: HashMap<String, (MethodSig, Span)>,
}

pub struct ClassGraph {
    classes: HashMap<String, ClassInfo>,
    attributes: HashMap<String, HashMap<String, Ty>>,
    methods: HashMap<String, HashMap<String, MethodSig>>,
}

const BASIC_CLASSES: &[&str] = &["Object", "IO", "Int", "Bool", "String"];
const UNINHERITABLE: &[&str] = &["Int", "Bool", "String"];

impl ClassGraph {
    /// Only the builtin hierarchy, with no user classes linearized. Used by
    /// unit tests that only need `Int`/`Bool`/`String`/`Object`/`IO`.
    pub fn with_builtins() -> Self {
        let mut classes = HashMap::new();
        install_builtins(&mut classes);
        let mut graph = ClassGraph { classes, attributes: HashMap::new(), methods: HashMap::new() };
        graph.linearize_all();
        graph
    }

    pub fn build(program: &Program) -> Result<ClassGraph, Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();
        let mut classes: HashMap<String, ClassInfo> = HashMap::new();
        install_builtins(&mut classes);

        for class in &program.classes {
            let name = &class.name.node;
            if BASIC_CLASSES.contains(&name.as_str()) {
                diagnostics.push(Diagnostic::error(
                    ErrorKind::DuplicateClass,
                    format!("class '{}' redefines a basic class", name),
                    class.span,
                ));
                continue;
            }
            if name == "SELF_TYPE" {
                diagnostics.push(Diagnostic::error(
                    ErrorKind::DuplicateClass,
                    "class cannot be named SELF_TYPE".to_string(),
                    class.span,
                ));
                continue;
            }
            if classes.contains_key(name) {
                diagnostics.push(Diagnostic::error(
                    ErrorKind::DuplicateClass,
                    format!("class '{}' is defined more than once", name),
                    class.span,
                ));
                continue;
            }

            let parent = class.parent.as_ref().map(|p| p.node.clone()).unwrap_or_else(|| "Object".to_string());
            let mut own_attributes = HashMap::new();
            let mut own_methods = HashMap::new();
            for feature in &class.features {
                match feature {
                    crate::ast::Feature::Attribute(attr) => {
                        if attr.name.node == "self" {
                            diagnostics.push(Diagnostic::error(
                                ErrorKind::BadRedeclaration,
                                "attribute cannot be named 'self'".to_string(),
                                attr.span,
                            ));
                            continue;
                        }
                        if own_attributes.contains_key(&attr.name.node) {
                            diagnostics.push(Diagnostic::error(
                                ErrorKind::BadRedeclaration,
                                format!("attribute '{}' redefined in class '{}'", attr.name.node, name),
                                attr.span,
                            ));
                            continue;
                        }
                        let ty = Ty::from_name(&attr.declared_type.node, name);
                        own_attributes.insert(attr.name.node.clone(), (ty, attr.span));
                    }
                    crate::ast::Feature::Method(method) => {
                        if own_methods.contains_key(&method.name.node) {
                            diagnostics.push(Diagnostic::error(
                                ErrorKind::BadRedeclaration,
                                format!("method '{}' redefined in class '{}'", method.name.node, name),
                                method.span,
                            ));
                            continue;
                        }
                        let mut seen_formals = HashSet::new();
                        let mut params = Vec::new();
                        for formal in &method.formals {
                            if formal.name.node == "self" {
                                diagnostics.push(Diagnostic::error(
                                    ErrorKind::BadRedeclaration,
                                    "formal parameter cannot be named 'self'".to_string(),
                                    formal.span,
                                ));
                            }
                            if !seen_formals.insert(formal.name.node.clone()) {
                                diagnostics.push(Diagnostic::error(
                                    ErrorKind::BadRedeclaration,
                                    format!("duplicate formal parameter '{}'", formal.name.node),
                                    formal.span,
                                ));
                            }
                            params.push(Ty::from_name(&formal.declared_type.node, name));
                        }
                        let return_ty = Ty::from_name(&method.return_type.node, name);
                        own_methods.insert(
                            method.name.node.clone(),
                            (MethodSig { params, return_ty, defined_in: name.clone() }, method.span),
                        );
                    }
                }
            }

            classes.insert(name.clone(), ClassInfo { parent: Some(parent), span: class.span, own_attributes, own_methods });
        }

        // Validate parents named in source. An unknown parent defaults to
        // Object and only warns, so the rest of the hierarchy can still be
        // linearized; inheriting from a basic class or SELF_TYPE is a hard
        // error but still falls back to Object to avoid cascading failures.
        for class in &program.classes {
            let Some(parent_name) = &class.parent else { continue };
            if UNINHERITABLE.contains(&parent_name.node.as_str()) || parent_name.node == "SELF_TYPE" {
                diagnostics.push(Diagnostic::error(
                    ErrorKind::BadParent,
                    format!("class '{}' cannot inherit from {}", class.name.node, parent_name.node),
                    parent_name.span,
                ));
                if let Some(info) = classes.get_mut(&class.name.node) {
                    info.parent = Some("Object".to_string());
                }
            } else if !classes.contains_key(&parent_name.node) {
                diagnostics.push(Diagnostic::warning(
                    ErrorKind::UndefinedClass,
                    format!("class '{}' inherits from undefined class '{}'; defaulting to Object", class.name.node, parent_name.node),
                    parent_name.span,
                ));
                if let Some(info) = classes.get_mut(&class.name.node) {
                    info.parent = Some("Object".to_string());
                }
            }
        }

        if let Some(cycle_class) = find_cycle(&classes) {
            // A cycle makes ancestor-chain walks non-terminating; bail out
            // before linearization rather than risk looping forever.
            diagnostics.push(Diagnostic::error(
                ErrorKind::Cycle,
                format!("inheritance cycle detected involving class '{}'", cycle_class),
                classes[&cycle_class].span,
            ));
            return Err(diagnostics);
        }

        let mut graph = ClassGraph { classes, attributes: HashMap::new(), methods: HashMap::new() };
        graph.linearize_all();

        if let Err(mut errs) = graph.check_overrides() {
            diagnostics.append(&mut errs);
        }
        if let Err(mut errs) = graph.check_main() {
            diagnostics.append(&mut errs);
        }

        if has_errors(&diagnostics) {
            Err(diagnostics)
        } else {
            Ok(graph)
        }
    }

    fn linearize_all(&mut self) {
        let names: Vec<String> = self.classes.keys().cloned().collect();
        for name in names {
            let chain = self.ancestor_chain(&name);
            let mut attrs = HashMap::new();
            let mut methods = HashMap::new();
            // Root-first so a subclass's own declarations shadow its ancestors'.
            for ancestor in chain.iter().rev() {
                let info = &self.classes[ancestor];
                for (attr_name, (ty, _)) in &info.own_attributes {
                    attrs.insert(attr_name.clone(), ty.clone());
                }
                for (method_name, (sig, _)) in &info.own_methods {
                    methods.insert(method_name.clone(), sig.clone());
                }
            }
            self.attributes.insert(name.clone(), attrs);
            self.methods.insert(name, methods);
        }
    }

    /// Self first, then parent, up to (and including) `Object`.
    fn ancestor_chain(&self, class: &str) -> Vec<String> {
        let mut chain = vec![class.to_string()];
        let mut current = class.to_string();
        while let Some(Some(parent)) = self.classes.get(&current).map(|c| c.parent.clone()) {
            if !self.classes.contains_key(&parent) {
                break;
            }
            chain.push(parent.clone());
            current = parent;
        }
        chain
    }

    fn check_overrides(&self) -> Result<(), Vec<Diagnostic>> {
        let mut diagnostics = Vec::new();
        for (name, info) in &self.classes {
            let Some(parent) = &info.parent else { continue };
            if !self.classes.contains_key(parent) {
                continue;
            }
            let inherited = &self.methods[parent];
            for (method_name, (sig, span)) in &info.own_methods {
                if let Some(parent_sig) = inherited.get(method_name) {
                    if parent_sig.params.len() != sig.params.len()
                        || parent_sig.params != sig.params
                        || parent_sig.return_ty != sig.return_ty
                    {
                        diagnostics.push(Diagnostic::error(
                            ErrorKind::BadOverride,
                            format!(
                                "method '{}' in class '{}' overrides an inherited method with a different signature",
                                method_name, name
                            ),
                            *span,
                        ).with_note(format!(
                            "inherited from '{}' with {} parameter(s) returning {}",
                            parent_sig.defined_in, parent_sig.params.len(), parent_sig.return_ty.display()
                        )));
                    }
                }
            }
        }
        if diagnostics.is_empty() { Ok(()) } else { Err(diagnostics) }
    }

    fn check_main(&self) -> Result<(), Vec<Diagnostic>> {
        let Some(main_class) = self.classes.get("Main") else {
            return Err(vec![Diagnostic::error(
                ErrorKind::MissingMain,
                "no 'Main' class defined".to_string(),
                Span::dummy(),
            )]);
        };
        // Linearization has already run, so this sees both an own and an
        // inherited `main`.
        match self.methods.get("Main").and_then(|m| m.get("main")) {
            Some(sig) => {
                if sig.params.is_empty() {
                    Ok(())
                } else {
                    let span = main_class
                        .own_methods
                        .get("main")
                        .map(|(_, span)| *span)
                        .unwrap_or(main_class.span);
                    Err(vec![Diagnostic::error(
                        ErrorKind::WrongMainArity,
                        format!("'main' method of 'Main' takes {} argument(s); it must take none", sig.params.len()),
                        span,
                    )])
                }
            }
            None => Err(vec![Diagnostic::error(
                ErrorKind::MissingMainMethod,
                "class 'Main' has no 'main' method".to_string(),
                main_class.span,
            )]),
        }
    }

    pub fn class_exists(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn parent_of(&self, class: &str) -> Option<&str> {
        self.classes.get(class).and_then(|c| c.parent.as_deref())
    }

    pub fn attributes(&self, class: &str) -> Option<&HashMap<String, Ty>> {
        self.attributes.get(class)
    }

    pub fn methods(&self, class: &str) -> Option<&HashMap<String, MethodSig>> {
        self.methods.get(class)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(|s| s.as_str())
    }

    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        if ancestor == descendant {
            return true;
        }
        let mut current = descendant.to_string();
        while let Some(parent) = self.classes.get(&current).and_then(|c| c.parent.clone()) {
            if parent == ancestor {
                return true;
            }
            if !self.classes.contains_key(&parent) {
                break;
            }
            current = parent;
        }
        false
    }

    pub fn least_common_ancestor(&self, a: &str, b: &str) -> String {
        let chain_a: HashSet<String> = self.ancestor_chain(a).into_iter().collect();
        let mut current = b.to_string();
        loop {
            if chain_a.contains(&current) {
                return current;
            }
            match self.classes.get(&current).and_then(|c| c.parent.clone()) {
                Some(parent) if self.classes.contains_key(&parent) => current = parent,
                _ => return "Object".to_string(),
            }
        }
    }
}

fn install_builtins(classes: &mut HashMap<String, ClassInfo>) {
    classes.insert(
        "Object".to_string(),
        ClassInfo {
            parent: None,
            span: Span::dummy(),
            own_attributes: HashMap::new(),
            own_methods: HashMap::from([
                ("abort".to_string(), (MethodSig { params: vec![], return_ty: Ty::Named("Object".to_string()), defined_in: "Object".to_string() }, Span::dummy())),
                ("type_name".to_string(), (MethodSig { params: vec![], return_ty: Ty::Str, defined_in: "Object".to_string() }, Span::dummy())),
                ("copy".to_string(), (MethodSig { params: vec![], return_ty: Ty::SelfType("Object".to_string()), defined_in: "Object".to_string() }, Span::dummy())),
            ]),
        },
    );
    classes.insert(
        "IO".to_string(),
        ClassInfo {
            parent: Some("Object".to_string()),
            span: Span::dummy(),
            own_attributes: HashMap::new(),
            own_methods: HashMap::from([
                ("out_string".to_string(), (MethodSig { params: vec![Ty::Str], return_ty: Ty::SelfType("IO".to_string()), defined_in: "IO".to_string() }, Span::dummy())),
                ("out_int".to_string(), (MethodSig { params: vec![Ty::Int], return_ty: Ty::SelfType("IO".to_string()), defined_in: "IO".to_string() }, Span::dummy())),
                ("in_string".to_string(), (MethodSig { params: vec![], return_ty: Ty::Str, defined_in: "IO".to_string() }, Span::dummy())),
                ("in_int".to_string(), (MethodSig { params: vec![], return_ty: Ty::Int, defined_in: "IO".to_string() }, Span::dummy())),
            ]),
        },
    );
    classes.insert("Int".to_string(), ClassInfo { parent: Some("Object".to_string()), span: Span::dummy(), own_attributes: HashMap::new(), own_methods: HashMap::new() });
    classes.insert("Bool".to_string(), ClassInfo { parent: Some("Object".to_string()), span: Span::dummy(), own_attributes: HashMap::new(), own_methods: HashMap::new() });
    classes.insert(
        "String".to_string(),
        ClassInfo {
            parent: Some("Object".to_string()),
            span: Span::dummy(),
            own_attributes: HashMap::new(),
            own_methods: HashMap::from([
                ("length".to_string(), (MethodSig { params: vec![], return_ty: Ty::Int, defined_in: "String".to_string() }, Span::dummy())),
                ("concat".to_string(), (MethodSig { params: vec![Ty::Str], return_ty: Ty::Str, defined_in: "String".to_string() }, Span::dummy())),
                ("substr".to_string(), (MethodSig { params: vec![Ty::Int, Ty::Int], return_ty: Ty::Str, defined_in: "String".to_string() }, Span::dummy())),
            ]),
        },
    );
}

/// DFS-coloring cycle detection over the user-defined parent edges.
/// Returns the name of a class participating in a cycle, if any.
fn find_cycle(classes: &HashMap<String, ClassInfo>) -> Option<String> {
    #[derive(PartialEq, Clone, Copy)]
    enum Color { White, Gray, Black }

    let mut color: HashMap<String, Color> = classes.keys().map(|k| (k.clone(), Color::White)).collect();

    fn visit(name: &str, classes: &HashMap<String, ClassInfo>, color: &mut HashMap<String, Color>) -> Option<String> {
        match color.get(name) {
            Some(Color::Black) | None => return None,
            Some(Color::Gray) => return Some(name.to_string()),
            Some(Color::White) => {}
        }
        color.insert(name.to_string(), Color::Gray);
        if let Some(Some(parent)) = classes.get(name).map(|c| c.parent.clone()) {
            if classes.contains_key(&parent) {
                if let Some(cycle) = visit(&parent, classes, color) {
                    color.insert(name.to_string(), Color::Black);
                    return Some(cycle);
                }
            }
        }
        color.insert(name.to_string(), Color::Black);
        None
    }

    let names: Vec<String> = classes.keys().cloned().collect();
    for name in names {
        if color.get(&name) == Some(&Color::White) {
            if let Some(cycle) = visit(&name, classes, &mut color) {
                return Some(cycle);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn build(source: &str) -> Result<ClassGraph, Vec<Diagnostic>> {
        let (tokens, diags) = Lexer::new(source, 0).tokenize();
        assert!(diags.is_empty());
        let program = Parser::new(tokens).parse_program().unwrap();
        ClassGraph::build(&program)
    }

    #[test]
    fn test_simple_hierarchy() {
        let graph = build(
            "class A { };\nclass B inherits A { };\nclass Main { main(): Object { new B }; };\n",
        )
        .unwrap();
        assert!(graph.is_ancestor("A", "B"));
        assert!(graph.is_ancestor("Object", "B"));
        assert!(!graph.is_ancestor("B", "A"));
    }

    #[test]
    fn test_cycle_detected() {
        let err = build("class A inherits B { };\nclass B inherits A { };\nclass Main { main(): Object { 0 }; };\n").unwrap_err();
        assert!(err.iter().any(|d| d.kind == ErrorKind::Cycle));
    }

    #[test]
    fn test_inherit_from_int_rejected() {
        let err = build("class A inherits Int { };\nclass Main { main(): Object { 0 }; };\n").unwrap_err();
        assert!(err.iter().any(|d| d.kind == ErrorKind::BadParent));
    }

    #[test]
    fn test_duplicate_class() {
        let err = build("class A { };\nclass A { };\nclass Main { main(): Object { 0 }; };\n").unwrap_err();
        assert!(err.iter().any(|d| d.kind == ErrorKind::DuplicateClass));
    }

    #[test]
    fn test_missing_main_class() {
        let err = build("class A { };\n").unwrap_err();
        assert!(err.iter().any(|d| d.kind == ErrorKind::MissingMain));
    }

    #[test]
    fn test_missing_main_method() {
        let err = build("class Main { };\n").unwrap_err();
        assert!(err.iter().any(|d| d.kind == ErrorKind::MissingMainMethod));
    }

    #[test]
    fn test_wrong_main_arity() {
        let err = build("class Main { main(x: Int): Object { x }; };\n").unwrap_err();
        assert!(err.iter().any(|d| d.kind == ErrorKind::WrongMainArity));
    }

    #[test]
    fn test_bad_override_signature() {
        let err = build(
            "class A { foo(x: Int): Int { x }; };\nclass B inherits A { foo(x: Int): String { \"no\" }; };\nclass Main { main(): Object { 0 }; };\n",
        )
        .unwrap_err();
        assert!(err.iter().any(|d| d.kind == ErrorKind::BadOverride));
    }

    #[test]
    fn test_attribute_inherited_and_visible() {
        let graph = build(
            "class A { x: Int <- 0; };\nclass B inherits A { };\nclass Main { main(): Object { 0 }; };\n",
        )
        .unwrap();
        assert!(graph.attributes("B").unwrap().contains_key("x"));
    }

    #[test]
    fn test_least_common_ancestor() {
        let graph = build(
            "class A { };\nclass B inherits A { };\nclass C inherits A { };\nclass Main { main(): Object { 0 }; };\n",
        )
        .unwrap();
        assert_eq!(graph.least_common_ancestor("B", "C"), "A");
    }
}
