//! AST navigation: find classes, methods, and attributes by name.

use super::{Attribute, Class, Method, Program};

/// Find a class by name in a parsed program.
pub fn find_class<'a>(program: &'a Program, name: &str) -> Option<&'a Class> {
    program.classes.iter().find(|c| c.name.node == name)
}

/// Find a method declared directly on a class (not inherited).
pub fn find_method<'a>(class: &'a Class, name: &str) -> Option<&'a Method> {
    class.methods().find(|m| m.name.node == name)
}

/// Find an attribute declared directly on a class (not inherited).
pub fn find_attribute<'a>(class: &'a Class, name: &str) -> Option<&'a Attribute> {
    class.attributes().find(|a| a.name.node == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::render_diagnostics;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn parse(source: &str) -> Program {
        let (tokens, lex_diags) = Lexer::new(source, 0).tokenize();
        assert!(lex_diags.is_empty(), "lex errors: {:?}", lex_diags);
        match Parser::new(tokens).parse_program() {
            Ok(p) => p,
            Err(errs) => {
                render_diagnostics(&errs, "test.cl", source);
                panic!("parse errors");
            }
        }
    }

    #[test]
    fn test_find_class() {
        let program = parse("class A { }; class B inherits A { }; ");
        assert!(find_class(&program, "A").is_some());
        assert!(find_class(&program, "B").is_some());
        assert!(find_class(&program, "C").is_none());
    }

    #[test]
    fn test_find_method_and_attribute() {
        let program = parse(
            "class A {\n  x: Int <- 0;\n  foo(): Int { x };\n};\n",
        );
        let class = find_class(&program, "A").unwrap();
        assert!(find_method(class, "foo").is_some());
        assert!(find_attribute(class, "x").is_some());
        assert!(find_method(class, "bar").is_none());
    }
}
