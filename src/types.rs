//! Semantic types used by the type checker (distinct from the bare type
//! names written in source, which the parser keeps as plain `String`s).

use crate::classgraph::ClassGraph;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    Int,
    Bool,
    Str,
    /// `SELF_TYPE`, still tagged with the class it was written in so two
    /// `SELF_TYPE`s from different classes are never confused with each
    /// other once resolved.
    SelfType(String),
    Named(String),
}

impl Ty {
    pub fn display(&self) -> String {
        match self {
            Ty::Int => "Int".to_string(),
            Ty::Bool => "Bool".to_string(),
            Ty::Str => "String".to_string(),
            Ty::SelfType(_) => "SELF_TYPE".to_string(),
            Ty::Named(name) => name.clone(),
        }
    }

    pub fn from_name(name: &str, current_class: &str) -> Ty {
        match name {
            "Int" => Ty::Int,
            "Bool" => Ty::Bool,
            "String" => Ty::Str,
            "SELF_TYPE" => Ty::SelfType(current_class.to_string()),
            other => Ty::Named(other.to_string()),
        }
    }

    /// Replace `SELF_TYPE` with the concrete class it was resolved against.
    /// Used wherever a static type is required (static dispatch qualifiers,
    /// `new`'s operand class, case branch types).
    pub fn resolve_self(&self) -> Ty {
        match self {
            Ty::SelfType(class) => Ty::Named(class.clone()),
            other => other.clone(),
        }
    }

    pub fn class_name(&self) -> String {
        match self {
            Ty::Int => "Int".to_string(),
            Ty::Bool => "Bool".to_string(),
            Ty::Str => "String".to_string(),
            Ty::SelfType(class) => class.clone(),
            Ty::Named(name) => name.clone(),
        }
    }
}

/// `sub <= sup` in the current class hierarchy, evaluated in the context of
/// `self_class` (needed because `SELF_TYPE <= SELF_TYPE` always holds, and
/// `SELF_TYPE <= C` holds exactly when the enclosing class is a subtype of `C`).
pub fn is_subtype(sub: &Ty, sup: &Ty, graph: &ClassGraph, self_class: &str) -> bool {
    if let (Ty::SelfType(a), Ty::SelfType(b)) = (sub, sup) {
        return a == b;
    }
    if matches!(sup, Ty::SelfType(_)) {
        // Only SELF_TYPE itself is a subtype of SELF_TYPE.
        return false;
    }

    let sub_class = match sub {
        Ty::SelfType(_) => self_class.to_string(),
        other => other.class_name(),
    };
    let sup_class = sup.class_name();

    graph.is_ancestor(&sup_class, &sub_class)
}

/// Least upper bound of two types in the class hierarchy, used to type
/// `if`/`case` branches and `loop` bodies.
pub fn lub(a: &Ty, b: &Ty, graph: &ClassGraph, self_class: &str) -> Ty {
    if a == b {
        return a.clone();
    }
    let a_class = match a {
        Ty::SelfType(_) => self_class.to_string(),
        other => other.class_name(),
    };
    let b_class = match b {
        Ty::SelfType(_) => self_class.to_string(),
        other => other.class_name(),
    };
    Ty::Named(graph.least_common_ancestor(&a_class, &b_class))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classgraph::ClassGraph;

    #[test]
    fn test_from_name_primitives() {
        assert_eq!(Ty::from_name("Int", "Main"), Ty::Int);
        assert_eq!(Ty::from_name("Bool", "Main"), Ty::Bool);
        assert_eq!(Ty::from_name("String", "Main"), Ty::Str);
        assert_eq!(Ty::from_name("SELF_TYPE", "Main"), Ty::SelfType("Main".to_string()));
        assert_eq!(Ty::from_name("Widget", "Main"), Ty::Named("Widget".to_string()));
    }

    #[test]
    fn test_subtype_with_builtins_only() {
        let graph = ClassGraph::with_builtins();
        assert!(is_subtype(&Ty::Int, &Ty::Int, &graph, "Main"));
        assert!(!is_subtype(&Ty::Int, &Ty::Bool, &graph, "Main"));
        assert!(is_subtype(
            &Ty::Named("IO".to_string()),
            &Ty::Named("Object".to_string()),
            &graph,
            "Main"
        ));
    }

    #[test]
    fn test_lub_unrelated_falls_back_to_object() {
        let graph = ClassGraph::with_builtins();
        let result = lub(&Ty::Int, &Ty::Bool, &graph, "Main");
        assert_eq!(result, Ty::Named("Object".to_string()));
    }
}
