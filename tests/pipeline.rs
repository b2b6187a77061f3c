//! Whole-pipeline integration tests: real `.cl` source in, checked
//! behavior out, covering lexing through liveness. Unlike the per-module
//! unit tests these drive every stage through the crate's public API,
//! the way `coolc` itself does.

use cool_core::ir::{ConstValue, Instruction, Operand};

fn compile_tac(source: &str) -> cool_core::ir::TACProgram {
    let program = cool_core::parse(source).expect("parse failed");
    let graph = cool_core::analyze(&program).expect("semantic analysis failed");
    cool_core::translate(&program, &graph)
}

fn method<'a>(tac: &'a cool_core::ir::TACProgram, class: &str, name: &str) -> &'a cool_core::ir::TACMethod {
    tac.methods
        .iter()
        .find(|m| m.class_name == class && m.method_name == name)
        .unwrap_or_else(|| panic!("no method {}.{}", class, name))
}

#[test]
fn test_nested_comments_lex_cleanly() {
    let source = "(* outer (* inner *) still outer *) class Main { main(): Object { 0 }; };";
    let (tokens, diags) = cool_core::lex(source);
    assert!(diags.is_empty());
    assert!(!tokens.is_empty());
}

#[test]
fn test_unterminated_nested_comment_is_fatal() {
    let source = "(* outer (* inner *) class Main { main(): Object { 0 }; };";
    let (_, diags) = cool_core::lex(source);
    assert!(cool_core::diagnostic::has_fatal(&diags));
}

#[test]
fn test_duplicate_class_is_rejected() {
    let source = "class Main { main(): Object { 0 }; }; class Main { main(): Object { 1 }; };";
    let program = cool_core::parse(source).expect("parse failed");
    let result = cool_core::analyze(&program);
    assert!(result.is_err());
}

#[test]
fn test_inheritance_cycle_is_rejected() {
    let source = "class A inherits B { }; class B inherits A { };";
    let program = cool_core::parse(source).expect("parse failed");
    assert!(cool_core::analyze(&program).is_err());
}

#[test]
fn test_bad_override_arity_is_rejected() {
    let source = r#"
        class A { f(x: Int): Int { x }; };
        class B inherits A { f(x: Int, y: Int): Int { x }; };
        class Main { main(): Object { 0 }; };
    "#;
    let program = cool_core::parse(source).expect("parse failed");
    assert!(cool_core::analyze(&program).is_err());
}

#[test]
fn test_if_branches_join_to_least_common_ancestor() {
    let source = r#"
        class A { };
        class B inherits A { };
        class C inherits A { };
        class Main {
            pick(flag: Bool): A {
                if flag then new B else new C fi
            };
            main(): Object { 0 };
        };
    "#;
    let program = cool_core::parse(source).expect("parse failed");
    cool_core::analyze(&program).expect("should type-check: both branches are under A");
}

#[test]
fn test_constant_fold_through_if_diamond() {
    let source = r#"
        class Main {
            compute(flag: Bool): Int {
                let a: Int <- 2, b: Int <- 3 in
                    if flag then a + b else a + b fi
            };
            main(): Object { 0 };
        };
    "#;
    let tac = compile_tac(source);
    let m = method(&tac, "Main", "compute").clone();
    let cfg = cool_core::build_cfg(&m);
    let ssa_method = cool_core::convert_to_ssa(&m, &cfg);
    let ssa_cfg = cool_core::build_cfg(&ssa_method);

    let mut folded = ssa_method;
    let (_, changes) = cool_core::run_constant_propagation(&mut folded, &ssa_cfg);
    assert!(changes >= 1, "expected at least one fold of a constant a + b");

    let folded_add_result = folded.instructions.iter().find_map(|i| match i {
        Instruction::BinOp { dest, lhs: Operand::Const(ConstValue::Int(2)), rhs: Operand::Const(ConstValue::Int(3)), .. } => Some(dest.clone()),
        _ => None,
    });
    assert!(folded_add_result.is_some(), "expected a + b's operands to be folded to literal 2 and 3");
}

#[test]
fn test_dead_store_is_eliminated() {
    let source = r#"
        class Main {
            compute(): Int {
                let x: Int <- 1, y: Int <- 2 in y
            };
            main(): Object { 0 };
        };
    "#;
    let tac = compile_tac(source);
    let mut m = method(&tac, "Main", "compute").clone();
    let cfg = cool_core::build_cfg(&m);
    let removed = cool_core::run_dead_code_elimination(&mut m, &cfg);
    assert!(removed >= 1, "the dead store to x should have been removed");
    assert!(!m.instructions.iter().any(|i| matches!(
        i,
        Instruction::Copy { dest: Operand::Var(name), .. } if name == "x"
    )));
}

#[test]
fn test_ssa_of_diamond_inserts_phi_at_join() {
    let source = r#"
        class Main {
            pick(flag: Bool): Int {
                let x: Int <- 0 in {
                    if flag then x <- 1 else x <- 2 fi;
                    x;
                }
            };
            main(): Object { 0 };
        };
    "#;
    let tac = compile_tac(source);
    let m = method(&tac, "Main", "pick").clone();
    let cfg = cool_core::build_cfg(&m);
    let ssa_method = cool_core::convert_to_ssa(&m, &cfg);

    assert!(ssa_method.instructions.iter().any(|i| matches!(i, Instruction::Phi { .. })));
}

#[test]
fn test_liveness_and_interference_over_recursive_method() {
    let source = r#"
        class Main inherits IO {
            fib(n: Int): Int {
                if n <= 1 then n else fib(n - 1) + fib(n - 2) fi
            };
            main(): Object { out_int(fib(5)) };
        };
    "#;
    let tac = compile_tac(source);
    let m = method(&tac, "Main", "fib").clone();
    let cfg = cool_core::build_cfg(&m);
    let liveness = cool_core::run_liveness(&m, &cfg);
    let ranges = cool_core::compute_live_ranges(&m, &cfg, &liveness);
    let interference = cool_core::build_interference_graph(&m, &cfg, &liveness);

    assert!(!ranges.ranges.is_empty());
    // The graph should be symmetric: if a interferes with b, b interferes with a.
    for (a, neighbors) in &interference.edges {
        for b in neighbors {
            assert!(interference.interferes(b, a));
        }
    }
}

#[test]
fn test_full_program_compiles_end_to_end() {
    let source = r#"
        class Counter {
            count: Int <- 0;
            bump(): Int {
                count <- count + 1
            };
        };
        class Main inherits IO {
            main(): Object {
                let c: Counter <- new Counter in {
                    c.bump();
                    c.bump();
                    out_int(c.bump());
                }
            };
        };
    "#;
    let tac = compile_tac(source);
    assert!(tac.methods.iter().any(|m| m.class_name == "Counter" && m.method_name == "bump"));
    assert!(tac.methods.iter().any(|m| m.class_name == "Main" && m.method_name == "main"));

    for m in &tac.methods {
        let cfg = cool_core::build_cfg(m);
        let ssa_method = cool_core::convert_to_ssa(m, &cfg);
        let ssa_cfg = cool_core::build_cfg(&ssa_method);
        let mut folded = ssa_method;
        cool_core::run_constant_propagation(&mut folded, &ssa_cfg);
        let cfg_after = cool_core::build_cfg(&folded);
        let removed = cool_core::run_dead_code_elimination(&mut folded, &cfg_after);
        assert!(removed <= folded.instructions.len());
    }
}
