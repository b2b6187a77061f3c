//! Phase E: the expression type-checking rule table from the semantic
//! analyzer's contract. Every node gets a static type; on a rule
//! violation the node is given a placeholder type (`Object`) so the
//! traversal can keep surfacing further errors in the rest of the tree
//! instead of aborting at the first one.

use std::collections::HashSet;

use crate::ast::{CaseArm, Expr, ExprKind};
use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::semant::Env;
use crate::types::Ty;

fn object_ty() -> Ty {
    Ty::Named("Object".to_string())
}

/// Type-check `expr`, recording its result on the node itself
/// (`Expr::set_type`) and returning it for the caller to chain.
pub fn check_expr(expr: &Expr, env: &mut Env, diagnostics: &mut Vec<Diagnostic>) -> Ty {
    let ty = check_expr_kind(expr, env, diagnostics);
    expr.set_type(ty.clone());
    ty
}

fn check_expr_kind(expr: &Expr, env: &mut Env, diagnostics: &mut Vec<Diagnostic>) -> Ty {
    match &expr.kind {
        ExprKind::IntConst(_) => Ty::Int,
        ExprKind::StringConst(_) => Ty::Str,
        ExprKind::BoolConst(_) => Ty::Bool,
        ExprKind::NoExpr => object_ty(),

        ExprKind::Object(name) => {
            if name == "self" {
                return Ty::SelfType(env.current_class.clone());
            }
            match env.lookup(name) {
                Some(ty) => ty,
                None => {
                    diagnostics.push(Diagnostic::error(
                        ErrorKind::UndefinedVariable,
                        format!("undefined identifier '{}'", name),
                        expr.span,
                    ));
                    object_ty()
                }
            }
        }

        ExprKind::Assign(name, rhs) => {
            let rhs_ty = check_expr(rhs, env, diagnostics);
            if name.node == "self" {
                diagnostics.push(Diagnostic::error(
                    ErrorKind::UndefinedVariable,
                    "cannot assign to 'self'".to_string(),
                    name.span,
                ));
                return rhs_ty;
            }
            match env.lookup(&name.node) {
                Some(declared) => {
                    if !env.is_subtype(&rhs_ty, &declared) {
                        diagnostics.push(Diagnostic::error(
                            ErrorKind::TypeMismatch,
                            format!(
                                "cannot assign value of type {} to '{}' of type {}",
                                rhs_ty.display(),
                                name.node,
                                declared.display()
                            ),
                            expr.span,
                        ));
                    }
                }
                None => {
                    diagnostics.push(Diagnostic::error(
                        ErrorKind::UndefinedVariable,
                        format!("undefined identifier '{}'", name.node),
                        name.span,
                    ));
                }
            }
            rhs_ty
        }

        ExprKind::Add(a, b) | ExprKind::Sub(a, b) | ExprKind::Mul(a, b) | ExprKind::Div(a, b) => {
            check_both_int(expr, a, b, env, diagnostics, "arithmetic operator");
            Ty::Int
        }

        ExprKind::Lt(a, b) | ExprKind::Le(a, b) => {
            check_both_int(expr, a, b, env, diagnostics, "comparison operator");
            Ty::Bool
        }

        ExprKind::Eq(a, b) => {
            let ta = check_expr(a, env, diagnostics);
            let tb = check_expr(b, env, diagnostics);
            let primitive = |t: &Ty| matches!(t, Ty::Int | Ty::Bool | Ty::Str);
            if (primitive(&ta) || primitive(&tb)) && ta != tb {
                diagnostics.push(Diagnostic::error(
                    ErrorKind::TypeMismatch,
                    format!("cannot compare {} with {} for equality", ta.display(), tb.display()),
                    expr.span,
                ));
            }
            Ty::Bool
        }

        ExprKind::Neg(operand) => {
            let ty = check_expr(operand, env, diagnostics);
            if ty != Ty::Int {
                diagnostics.push(Diagnostic::error(
                    ErrorKind::TypeMismatch,
                    format!("'~' requires an Int operand, found {}", ty.display()),
                    expr.span,
                ));
            }
            Ty::Int
        }

        ExprKind::Not(operand) => {
            let ty = check_expr(operand, env, diagnostics);
            if ty != Ty::Bool {
                diagnostics.push(Diagnostic::error(
                    ErrorKind::TypeMismatch,
                    format!("'not' requires a Bool operand, found {}", ty.display()),
                    expr.span,
                ));
            }
            Ty::Bool
        }

        ExprKind::If { cond, then_branch, else_branch } => {
            let cond_ty = check_expr(cond, env, diagnostics);
            if cond_ty != Ty::Bool {
                diagnostics.push(Diagnostic::error(
                    ErrorKind::TypeMismatch,
                    format!("'if' condition must be Bool, found {}", cond_ty.display()),
                    cond.span,
                ));
            }
            let then_ty = check_expr(then_branch, env, diagnostics);
            let else_ty = check_expr(else_branch, env, diagnostics);
            env.lub(&then_ty, &else_ty)
        }

        ExprKind::While { cond, body } => {
            let cond_ty = check_expr(cond, env, diagnostics);
            if cond_ty != Ty::Bool {
                diagnostics.push(Diagnostic::error(
                    ErrorKind::TypeMismatch,
                    format!("'while' condition must be Bool, found {}", cond_ty.display()),
                    cond.span,
                ));
            }
            check_expr(body, env, diagnostics);
            object_ty()
        }

        ExprKind::Block(exprs) => {
            let mut last = object_ty();
            for e in exprs {
                last = check_expr(e, env, diagnostics);
            }
            last
        }

        ExprKind::Let { bindings, body } => {
            env.push_scope();
            for binding in bindings {
                if binding.name.node == "self" {
                    diagnostics.push(Diagnostic::error(
                        ErrorKind::UndefinedVariable,
                        "'self' cannot be bound in a let expression".to_string(),
                        binding.name.span,
                    ));
                }
                let declared = Ty::from_name(&binding.declared_type.node, &env.current_class);
                if let Some(init) = &binding.init {
                    let actual = check_expr(init, env, diagnostics);
                    if !env.is_subtype(&actual, &declared) {
                        diagnostics.push(Diagnostic::error(
                            ErrorKind::TypeMismatch,
                            format!(
                                "initializer for '{}' has type {} which is not a subtype of declared type {}",
                                binding.name.node,
                                actual.display(),
                                declared.display()
                            ),
                            init.span,
                        ));
                    }
                }
                env.bind(binding.name.node.clone(), declared);
            }
            let result = check_expr(body, env, diagnostics);
            env.pop_scope();
            result
        }

        ExprKind::Case { scrutinee, arms } => {
            check_expr(scrutinee, env, diagnostics);
            let mut seen_types: HashSet<String> = HashSet::new();
            let mut result: Option<Ty> = None;
            for arm in arms {
                check_case_arm(arm, env, diagnostics, &mut seen_types, &mut result);
            }
            result.unwrap_or_else(object_ty)
        }

        ExprKind::New(ty_name) => {
            if ty_name.node == "SELF_TYPE" {
                Ty::SelfType(env.current_class.clone())
            } else if env.graph.class_exists(&ty_name.node) {
                Ty::Named(ty_name.node.clone())
            } else {
                diagnostics.push(Diagnostic::error(
                    ErrorKind::UndefinedClass,
                    format!("'new' refers to undefined class '{}'", ty_name.node),
                    ty_name.span,
                ));
                object_ty()
            }
        }

        ExprKind::Isvoid(operand) => {
            check_expr(operand, env, diagnostics);
            Ty::Bool
        }

        ExprKind::SelfDispatch { method, args } => {
            let receiver_ty = Ty::SelfType(env.current_class.clone());
            check_dispatch(expr, &receiver_ty, &env.current_class.clone(), method, args, env, diagnostics)
        }

        ExprKind::Dispatch { receiver, method, args } => {
            let receiver_ty = check_expr(receiver, env, diagnostics);
            let lookup_class = receiver_ty.resolve_self().class_name();
            check_dispatch(expr, &receiver_ty, &lookup_class, method, args, env, diagnostics)
        }

        ExprKind::StaticDispatch { receiver, dispatch_type, method, args } => {
            let receiver_ty = check_expr(receiver, env, diagnostics);
            if dispatch_type.node == "SELF_TYPE" {
                diagnostics.push(Diagnostic::error(
                    ErrorKind::BadStaticDispatchType,
                    "static dispatch type cannot be SELF_TYPE".to_string(),
                    dispatch_type.span,
                ));
                return object_ty();
            }
            if !env.graph.class_exists(&dispatch_type.node) {
                diagnostics.push(Diagnostic::error(
                    ErrorKind::BadStaticDispatchType,
                    format!("static dispatch to undefined class '{}'", dispatch_type.node),
                    dispatch_type.span,
                ));
                return object_ty();
            }
            let target = Ty::Named(dispatch_type.node.clone());
            if !env.is_subtype(&receiver_ty, &target) {
                diagnostics.push(Diagnostic::error(
                    ErrorKind::BadStaticDispatchType,
                    format!(
                        "static dispatch target {} is not an ancestor of receiver type {}",
                        dispatch_type.node,
                        receiver_ty.display()
                    ),
                    dispatch_type.span,
                ));
                return object_ty();
            }
            check_dispatch(expr, &receiver_ty, &dispatch_type.node, method, args, env, diagnostics)
        }
    }
}

fn check_both_int(expr: &Expr, a: &Expr, b: &Expr, env: &mut Env, diagnostics: &mut Vec<Diagnostic>, what: &str) {
    let ta = check_expr(a, env, diagnostics);
    let tb = check_expr(b, env, diagnostics);
    if ta != Ty::Int || tb != Ty::Int {
        diagnostics.push(Diagnostic::error(
            ErrorKind::TypeMismatch,
            format!("{} requires two Int operands, found {} and {}", what, ta.display(), tb.display()),
            expr.span,
        ));
    }
}

fn check_case_arm(
    arm: &CaseArm,
    env: &mut Env,
    diagnostics: &mut Vec<Diagnostic>,
    seen_types: &mut HashSet<String>,
    result: &mut Option<Ty>,
) {
    if arm.name.node == "self" {
        diagnostics.push(Diagnostic::error(
            ErrorKind::UndefinedVariable,
            "'self' cannot be bound in a case branch".to_string(),
            arm.name.span,
        ));
    }
    if !seen_types.insert(arm.declared_type.node.clone()) {
        diagnostics.push(Diagnostic::error(
            ErrorKind::BadRedeclaration,
            format!("duplicate branch type '{}' in case expression", arm.declared_type.node),
            arm.declared_type.span,
        ));
    }
    if arm.declared_type.node != "SELF_TYPE" && !env.graph.class_exists(&arm.declared_type.node) {
        diagnostics.push(Diagnostic::error(
            ErrorKind::UndefinedClass,
            format!("case branch refers to undefined class '{}'", arm.declared_type.node),
            arm.declared_type.span,
        ));
    }

    env.push_scope();
    let branch_ty = Ty::from_name(&arm.declared_type.node, &env.current_class);
    env.bind(arm.name.node.clone(), branch_ty);
    let body_ty = check_expr(&arm.body, env, diagnostics);
    env.pop_scope();

    *result = Some(match result.take() {
        Some(acc) => env.lub(&acc, &body_ty),
        None => body_ty,
    });
}

/// Shared tail of `Dispatch`/`SelfDispatch`/`StaticDispatch`: resolve the
/// method in `lookup_class`'s table, check arity and argument types, and
/// resolve `SELF_TYPE` return types against `receiver_ty`.
fn check_dispatch(
    expr: &Expr,
    receiver_ty: &Ty,
    lookup_class: &str,
    method: &crate::span::Spanned<String>,
    args: &[Expr],
    env: &mut Env,
    diagnostics: &mut Vec<Diagnostic>,
) -> Ty {
    let arg_types: Vec<Ty> = args.iter().map(|a| check_expr(a, env, diagnostics)).collect();

    let sig = match env.graph.methods(lookup_class).and_then(|m| m.get(&method.node)) {
        Some(sig) => sig.clone(),
        None => {
            diagnostics.push(Diagnostic::error(
                ErrorKind::BadDispatch,
                format!("no method '{}' found on class '{}'", method.node, lookup_class),
                method.span,
            ));
            return object_ty();
        }
    };

    if sig.params.len() != arg_types.len() {
        diagnostics.push(Diagnostic::error(
            ErrorKind::BadDispatch,
            format!(
                "method '{}' expects {} argument(s), found {}",
                method.node,
                sig.params.len(),
                arg_types.len()
            ),
            expr.span,
        ));
    } else {
        for (i, (arg_ty, param_ty)) in arg_types.iter().zip(sig.params.iter()).enumerate() {
            if !env.is_subtype(arg_ty, param_ty) {
                diagnostics.push(Diagnostic::error(
                    ErrorKind::BadDispatch,
                    format!(
                        "argument {} to '{}' has type {}, expected a subtype of {}",
                        i + 1,
                        method.node,
                        arg_ty.display(),
                        param_ty.display()
                    ),
                    expr.span,
                ));
            }
        }
    }

    match &sig.return_ty {
        Ty::SelfType(_) => receiver_ty.clone(),
        other => other.clone(),
    }
}
