//! AST → TAC lowering. Each method body is walked once; every
//! sub-expression returns the operand holding its result, and callers
//! chain these the way a textbook one-pass translator does.

use std::collections::{HashMap, HashSet};

use crate::ast::{self, Expr, ExprKind};
use crate::classgraph::ClassGraph;
use crate::ir::{
    BinOp, CondKind, ConstValue, Instruction, LabelGenerator, Operand, TACMethod, TACProgram,
    TempGenerator, UnOp,
};

/// Per-method translation state: the fresh-temp counter (reset per
/// method), the shared label generator (shared across the whole
/// program so dumps never repeat a label), the lexical scope stack
/// (`let`/`case` push, the method body starts with one scope holding
/// `self` and the formals), and the current class's full attribute set
/// (inherited + own, from the attribute pre-pass below) so `Object(id)`
/// can tell a local from an attribute without re-walking the hierarchy.
struct Context<'a> {
    label_gen: &'a mut LabelGenerator,
    temp_gen: TempGenerator,
    scopes: Vec<HashMap<String, Operand>>,
    attributes: &'a HashSet<String>,
    /// Disambiguates shadowed `let`/`case` bindings of the same source
    /// name so each gets a distinct TAC variable; a plain-named `Var`
    /// would otherwise alias two different live ranges onto one name.
    next_shadow_id: u32,
}

impl<'a> Context<'a> {
    fn push_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn define(&mut self, name: &str, operand: Operand) {
        self.scopes
            .last_mut()
            .expect("define called with no active scope")
            .insert(name.to_string(), operand);
    }

    fn lookup(&self, name: &str) -> Option<Operand> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name).cloned())
    }

    /// A fresh TAC variable for a `let`/`case` binding named `base`.
    fn fresh_named(&mut self, base: &str) -> Operand {
        let id = self.next_shadow_id;
        self.next_shadow_id += 1;
        Operand::Var(format!("{}${}", base, id))
    }
}

/// Translate a type-checked program to TAC, one `TACMethod` per source
/// method, in declaration order. Attributes are collected for every class
/// before any method body is translated (mirrors the reference
/// translator's `_collect_attributes` pre-pass) so `GetAttr`/`SetAttr`
/// never need to re-derive the inheritance chain mid-expression.
pub fn translate_program(program: &ast::Program, graph: &ClassGraph) -> TACProgram {
    let mut label_gen = LabelGenerator::new();
    let mut methods = Vec::new();

    for class in &program.classes {
        let attrs: HashSet<String> = graph
            .attributes(&class.name.node)
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default();

        for method in class.methods() {
            methods.push(translate_method(class, method, &attrs, &mut label_gen));
        }
    }

    TACProgram { methods }
}

fn translate_method(
    class: &ast::Class,
    method: &ast::Method,
    attributes: &HashSet<String>,
    label_gen: &mut LabelGenerator,
) -> TACMethod {
    let mut ctx = Context {
        label_gen,
        temp_gen: TempGenerator::new(),
        scopes: Vec::new(),
        attributes,
        next_shadow_id: 0,
    };

    ctx.push_scope();
    ctx.define("self", Operand::var("self"));
    for formal in &method.formals {
        ctx.define(&formal.name.node, Operand::var(formal.name.node.clone()));
    }

    let mut instructions = vec![Instruction::Comment(format!(
        "{}.{}",
        class.name.node, method.name.node
    ))];
    let result = translate_expr(&method.body, &mut ctx, &mut instructions);
    instructions.push(Instruction::Return(result));
    ctx.pop_scope();

    TACMethod {
        class_name: class.name.node.clone(),
        method_name: method.name.node.clone(),
        params: method.formals.iter().map(|f| f.name.node.clone()).collect(),
        instructions,
    }
}

fn default_value(type_name: &str) -> Operand {
    match type_name {
        "Int" => Operand::Const(ConstValue::Int(0)),
        "Bool" => Operand::Const(ConstValue::Bool(false)),
        "String" => Operand::Const(ConstValue::Str(String::new())),
        // Object-typed locals default to void; this core has no object
        // layout to model a null reference with, so it reuses Int(0) as
        // the reference-lowering back-end is expected to recognize.
        _ => Operand::Const(ConstValue::Int(0)),
    }
}

fn translate_expr(expr: &Expr, ctx: &mut Context, instrs: &mut Vec<Instruction>) -> Operand {
    match &expr.kind {
        ExprKind::IntConst(n) => emit_copy(ctx, instrs, Operand::Const(ConstValue::Int(*n))),
        ExprKind::BoolConst(b) => emit_copy(ctx, instrs, Operand::Const(ConstValue::Bool(*b))),
        ExprKind::StringConst(s) => {
            emit_copy(ctx, instrs, Operand::Const(ConstValue::Str(s.clone())))
        }
        ExprKind::NoExpr => emit_copy(ctx, instrs, Operand::Const(ConstValue::Int(0))),

        ExprKind::Object(name) => {
            if let Some(local) = ctx.lookup(name) {
                local
            } else if ctx.attributes.contains(name) {
                let dest = ctx.temp_gen.next();
                instrs.push(Instruction::GetAttr {
                    dest: dest.clone(),
                    object: Operand::var("self"),
                    attr: name.clone(),
                });
                dest
            } else {
                // Semantic analysis rejects genuinely undefined variables
                // before translation ever runs; fall back to a plain
                // reference rather than panicking on a malformed AST.
                Operand::var(name.clone())
            }
        }

        ExprKind::Assign(name, rhs) => {
            let rhs_val = translate_expr(rhs, ctx, instrs);
            if let Some(local) = ctx.lookup(&name.node) {
                instrs.push(Instruction::Copy { dest: local, src: rhs_val.clone() });
            } else {
                instrs.push(Instruction::SetAttr {
                    object: Operand::var("self"),
                    attr: name.node.clone(),
                    value: rhs_val.clone(),
                });
            }
            rhs_val
        }

        ExprKind::Add(l, r) => translate_binop(BinOp::Add, l, r, ctx, instrs),
        ExprKind::Sub(l, r) => translate_binop(BinOp::Sub, l, r, ctx, instrs),
        ExprKind::Mul(l, r) => translate_binop(BinOp::Mul, l, r, ctx, instrs),
        ExprKind::Div(l, r) => translate_binop(BinOp::Div, l, r, ctx, instrs),
        ExprKind::Lt(l, r) => translate_binop(BinOp::Lt, l, r, ctx, instrs),
        ExprKind::Le(l, r) => translate_binop(BinOp::Le, l, r, ctx, instrs),
        ExprKind::Eq(l, r) => translate_binop(BinOp::Eq, l, r, ctx, instrs),

        ExprKind::Neg(e) => {
            let v = translate_expr(e, ctx, instrs);
            let dest = ctx.temp_gen.next();
            instrs.push(Instruction::UnOp { dest: dest.clone(), op: UnOp::Neg, src: v });
            dest
        }
        ExprKind::Not(e) => {
            let v = translate_expr(e, ctx, instrs);
            let dest = ctx.temp_gen.next();
            instrs.push(Instruction::UnOp { dest: dest.clone(), op: UnOp::Not, src: v });
            dest
        }
        ExprKind::Isvoid(e) => {
            let v = translate_expr(e, ctx, instrs);
            let dest = ctx.temp_gen.next();
            instrs.push(Instruction::IsVoid { dest: dest.clone(), src: v });
            dest
        }

        ExprKind::Block(exprs) => {
            let mut result = Operand::Const(ConstValue::Int(0));
            for e in exprs {
                result = translate_expr(e, ctx, instrs);
            }
            result
        }

        ExprKind::If { cond, then_branch, else_branch } => {
            let else_label = ctx.label_gen.next("else");
            let end_label = ctx.label_gen.next("endif");
            let result = ctx.temp_gen.next();

            let cond_val = translate_expr(cond, ctx, instrs);
            instrs.push(Instruction::CondJump {
                cond: cond_val,
                target: else_label.clone(),
                kind: CondKind::Falsy,
            });

            let then_val = translate_expr(then_branch, ctx, instrs);
            instrs.push(Instruction::Copy { dest: result.clone(), src: then_val });
            instrs.push(Instruction::Jump(end_label.clone()));

            instrs.push(Instruction::Label(else_label));
            let else_val = translate_expr(else_branch, ctx, instrs);
            instrs.push(Instruction::Copy { dest: result.clone(), src: else_val });

            instrs.push(Instruction::Label(end_label));
            result
        }

        ExprKind::While { cond, body } => {
            let head_label = ctx.label_gen.next("while");
            let end_label = ctx.label_gen.next("endwhile");

            instrs.push(Instruction::Label(head_label.clone()));
            let cond_val = translate_expr(cond, ctx, instrs);
            instrs.push(Instruction::CondJump {
                cond: cond_val,
                target: end_label.clone(),
                kind: CondKind::Falsy,
            });
            translate_expr(body, ctx, instrs);
            instrs.push(Instruction::Jump(head_label));
            instrs.push(Instruction::Label(end_label));

            // `while` evaluates to void; follow the reference
            // translator's choice of a deterministic placeholder so
            // tests and dumps never depend on an unspecified value.
            let dest = ctx.temp_gen.next();
            instrs.push(Instruction::Copy { dest: dest.clone(), src: Operand::var("self") });
            dest
        }

        ExprKind::Let { bindings, body } => {
            let mut pushed = 0;
            for binding in bindings {
                ctx.push_scope();
                pushed += 1;
                let var = ctx.fresh_named(&binding.name.node);
                let value = match &binding.init {
                    Some(init) => translate_expr(init, ctx, instrs),
                    None => default_value(&binding.declared_type.node),
                };
                instrs.push(Instruction::Copy { dest: var.clone(), src: value });
                ctx.define(&binding.name.node, var);
            }
            let result = translate_expr(body, ctx, instrs);
            for _ in 0..pushed {
                ctx.pop_scope();
            }
            result
        }

        ExprKind::Case { scrutinee, arms } => {
            let case_val = translate_expr(scrutinee, ctx, instrs);
            let result = ctx.temp_gen.next();
            let end_label = ctx.label_gen.next("endcase");

            for (i, arm) in arms.iter().enumerate() {
                let is_last = i == arms.len() - 1;

                ctx.push_scope();
                let var = ctx.fresh_named(&arm.name.node);
                instrs.push(Instruction::Copy { dest: var.clone(), src: case_val.clone() });
                ctx.define(&arm.name.node, var);

                let branch_val = translate_expr(&arm.body, ctx, instrs);
                instrs.push(Instruction::Copy { dest: result.clone(), src: branch_val });
                instrs.push(Instruction::Jump(end_label.clone()));
                ctx.pop_scope();

                if !is_last {
                    let next_label = ctx.label_gen.next("case");
                    instrs.push(Instruction::Label(next_label));
                }
            }

            instrs.push(Instruction::Label(end_label));
            result
        }

        ExprKind::New(ty) => {
            let dest = ctx.temp_gen.next();
            instrs.push(Instruction::New { dest: dest.clone(), class_name: ty.node.clone() });
            dest
        }

        ExprKind::Dispatch { receiver, method, args } => {
            let arg_vals = translate_args(args, ctx, instrs);
            let receiver_val = translate_expr(receiver, ctx, instrs);
            for arg in arg_vals {
                instrs.push(Instruction::Param(arg));
            }
            emit_dispatch(ctx, instrs, receiver_val, &method.node, args.len())
        }

        ExprKind::SelfDispatch { method, args } => {
            let arg_vals = translate_args(args, ctx, instrs);
            for arg in arg_vals {
                instrs.push(Instruction::Param(arg));
            }
            emit_dispatch(ctx, instrs, Operand::var("self"), &method.node, args.len())
        }

        ExprKind::StaticDispatch { receiver, dispatch_type, method, args } => {
            let arg_vals = translate_args(args, ctx, instrs);
            let receiver_val = translate_expr(receiver, ctx, instrs);
            for arg in arg_vals {
                instrs.push(Instruction::Param(arg));
            }
            let dest = ctx.temp_gen.next();
            instrs.push(Instruction::StaticDispatch {
                dest: dest.clone(),
                receiver: receiver_val,
                static_type: dispatch_type.node.clone(),
                method: method.node.clone(),
                num_args: args.len(),
            });
            dest
        }
    }
}

/// Evaluate arguments left to right, *before* the receiver: for each
/// argument evaluate then emit `param`, then evaluate the receiver.
/// Values are collected so the `param` instructions
/// can be emitted only once the receiver operand also exists — their
/// order in the instruction stream is still argument-first.
fn translate_args(args: &[Expr], ctx: &mut Context, instrs: &mut Vec<Instruction>) -> Vec<Operand> {
    args.iter().map(|arg| translate_expr(arg, ctx, instrs)).collect()
}

fn emit_dispatch(
    ctx: &mut Context,
    instrs: &mut Vec<Instruction>,
    receiver: Operand,
    method: &str,
    num_args: usize,
) -> Operand {
    let dest = ctx.temp_gen.next();
    instrs.push(Instruction::Dispatch {
        dest: dest.clone(),
        receiver,
        method: method.to_string(),
        num_args,
    });
    dest
}

fn translate_binop(
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    ctx: &mut Context,
    instrs: &mut Vec<Instruction>,
) -> Operand {
    let lhs_val = translate_expr(lhs, ctx, instrs);
    let rhs_val = translate_expr(rhs, ctx, instrs);
    let dest = ctx.temp_gen.next();
    instrs.push(Instruction::BinOp { dest: dest.clone(), op, lhs: lhs_val, rhs: rhs_val });
    dest
}

fn emit_copy(ctx: &mut Context, instrs: &mut Vec<Instruction>, src: Operand) -> Operand {
    let dest = ctx.temp_gen.next();
    instrs.push(Instruction::Copy { dest: dest.clone(), src });
    dest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;
    use crate::semant;

    fn translate_source(source: &str) -> TACProgram {
        let (tokens, diags) = Lexer::new(source, 0).tokenize();
        assert!(diags.is_empty(), "{:?}", diags);
        let program = Parser::new(tokens).parse_program().unwrap();
        let graph = semant::analyze(&program).unwrap();
        translate_program(&program, &graph)
    }

    #[test]
    fn test_arithmetic_flattens_to_binops() {
        let tac = translate_source(
            "class Main { main(): Int { (1 + 2) * 3 }; };\n",
        );
        let main = tac.methods.iter().find(|m| m.method_name == "main").unwrap();
        let binops = main
            .instructions
            .iter()
            .filter(|i| matches!(i, Instruction::BinOp { .. }))
            .count();
        assert_eq!(binops, 2);
    }

    #[test]
    fn test_if_emits_two_labels_and_cond_jump() {
        let tac = translate_source(
            "class Main { main(): Int { if true then 1 else 2 fi }; };\n",
        );
        let main = &tac.methods[0];
        assert!(main.instructions.iter().any(|i| matches!(i, Instruction::CondJump { .. })));
        let labels = main
            .instructions
            .iter()
            .filter(|i| matches!(i, Instruction::Label(_)))
            .count();
        assert_eq!(labels, 2);
    }

    #[test]
    fn test_attribute_read_emits_get_attr() {
        let tac = translate_source(
            "class Main inherits IO { x: Int <- 5; main(): Int { x }; };\n",
        );
        let main = tac.methods.iter().find(|m| m.method_name == "main").unwrap();
        assert!(main
            .instructions
            .iter()
            .any(|i| matches!(i, Instruction::GetAttr { attr, .. } if attr == "x")));
    }

    #[test]
    fn test_assign_to_attribute_emits_set_attr() {
        let tac = translate_source(
            "class Main { x: Int <- 0; main(): Int { x <- 9 }; };\n",
        );
        let main = tac.methods.iter().find(|m| m.method_name == "main").unwrap();
        assert!(main
            .instructions
            .iter()
            .any(|i| matches!(i, Instruction::SetAttr { attr, .. } if attr == "x")));
    }

    #[test]
    fn test_let_binds_distinct_shadowed_names() {
        let tac = translate_source(
            "class Main { main(): Int { let x: Int <- 1 in let x: Int <- 2 in x }; };\n",
        );
        let main = &tac.methods[0];
        let copies: Vec<_> = main
            .instructions
            .iter()
            .filter_map(|i| match i {
                Instruction::Copy { dest: Operand::Var(name), .. } if name.starts_with('x') => {
                    Some(name.clone())
                }
                _ => None,
            })
            .collect();
        assert_eq!(copies.len(), 2);
        assert_ne!(copies[0], copies[1]);
    }

    #[test]
    fn test_dispatch_emits_params_then_dispatch() {
        let tac = translate_source(
            "class Main inherits IO { main(): Object { out_string(\"hi\") }; };\n",
        );
        let main = &tac.methods[0];
        let dispatch_idx =
            main.instructions.iter().position(|i| matches!(i, Instruction::Dispatch { .. }));
        let param_idx = main.instructions.iter().position(|i| matches!(i, Instruction::Param(_)));
        assert!(param_idx.unwrap() < dispatch_idx.unwrap());
    }

    #[test]
    fn test_while_returns_self_placeholder() {
        let tac = translate_source(
            "class Main { main(): Object { while false loop 1 pool }; };\n",
        );
        let main = &tac.methods[0];
        let last_copy = main.instructions.iter().rev().find_map(|i| match i {
            Instruction::Copy { src: Operand::Var(name), .. } if name == "self" => Some(()),
            _ => None,
        });
        assert!(last_copy.is_some());
    }
}
