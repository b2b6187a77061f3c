//! Recursive-descent parser with precedence climbing for binary operators,
//! following COOL's fixed precedence table (highest to lowest):
//! `.` dispatch, `@` static dispatch, `~`, `isvoid`, `* /`, `+ -`,
//! `<= < =`, `not`, `<-` assignment.

use crate::ast::*;
use crate::diagnostic::{Diagnostic, ErrorKind};
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

const MAX_NESTING_DEPTH: u32 = 256;

pub struct Parser {
    tokens: Vec<Spanned<Lexeme>>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    depth: u32,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned<Lexeme>>) -> Self {
        Self { tokens, pos: 0, diagnostics: Vec::new(), depth: 0 }
    }

    fn enter_nesting(&mut self) -> bool {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.error_with_help(
                "expression nesting depth exceeded (maximum 256 levels)",
                "simplify this expression; deeply nested lets/cases/blocks are usually a sign of a missing helper method",
            );
            return false;
        }
        true
    }

    fn exit_nesting(&mut self) {
        self.depth -= 1;
    }

    pub fn parse_program(mut self) -> Result<Program, Vec<Diagnostic>> {
        let mut classes = Vec::new();
        while !self.at(&Lexeme::Eof) {
            match self.parse_class() {
                Some(class) => {
                    classes.push(class);
                    if !self.eat(&Lexeme::Semicolon) {
                        self.error_at_current("expected ';' after class definition");
                    }
                }
                None => self.synchronize(),
            }
        }

        if self.diagnostics.is_empty() {
            Ok(Program { classes })
        } else {
            Err(self.diagnostics)
        }
    }

    /// Skip tokens until the next `;` (consumed) or `}`/EOF, to resume
    /// parsing after a malformed class or feature.
    fn synchronize(&mut self) {
        while !self.at(&Lexeme::Eof) {
            if self.eat(&Lexeme::Semicolon) {
                return;
            }
            if self.at(&Lexeme::RBrace) {
                return;
            }
            self.advance();
        }
    }

    fn parse_class(&mut self) -> Option<Class> {
        let start = self.current_span();
        self.expect(&Lexeme::Class);
        let name = self.expect_type_id()?;
        let parent = if self.eat(&Lexeme::Inherits) { Some(self.expect_type_id()?) } else { None };
        self.expect(&Lexeme::LBrace);

        let mut features = Vec::new();
        while !self.at(&Lexeme::RBrace) && !self.at(&Lexeme::Eof) {
            match self.parse_feature() {
                Some(feature) => {
                    features.push(feature);
                    if !self.at(&Lexeme::RBrace) && !self.eat(&Lexeme::Semicolon) {
                        self.error_at_current("expected ';' after feature");
                    }
                }
                None => self.synchronize(),
            }
        }
        let end = self.expect(&Lexeme::RBrace);

        Some(Class { name, parent, features, span: start.merge(end) })
    }

    fn parse_feature(&mut self) -> Option<Feature> {
        let start = self.current_span();
        let name = self.expect_object_id()?;

        if self.at(&Lexeme::LParen) {
            self.advance();
            let mut formals = Vec::new();
            if !self.at(&Lexeme::RParen) {
                loop {
                    formals.push(self.parse_formal()?);
                    if !self.eat(&Lexeme::Comma) {
                        break;
                    }
                }
            }
            self.expect(&Lexeme::RParen);
            self.expect(&Lexeme::Colon);
            let return_type = self.expect_type_id()?;
            self.expect(&Lexeme::LBrace);
            let body = self.parse_expr()?;
            let end = self.expect(&Lexeme::RBrace);
            Some(Feature::Method(Method { name, formals, return_type, body, span: start.merge(end) }))
        } else {
            self.expect(&Lexeme::Colon);
            let declared_type = self.expect_type_id()?;
            let init = if self.eat(&Lexeme::Assign) { Some(self.parse_expr()?) } else { None };
            let end = init.as_ref().map(|e| e.span).unwrap_or(declared_type.span);
            Some(Feature::Attribute(Attribute { name, declared_type, init, span: start.merge(end) }))
        }
    }

    fn parse_formal(&mut self) -> Option<Formal> {
        let start = self.current_span();
        let name = self.expect_object_id()?;
        self.expect(&Lexeme::Colon);
        let declared_type = self.expect_type_id()?;
        Some(Formal { name, span: start.merge(declared_type.span), declared_type })
    }

    // --- Expression parsing ---

    fn parse_expr(&mut self) -> Option<Expr> {
        if !self.enter_nesting() {
            return None;
        }
        let result = self.parse_assign();
        self.exit_nesting();
        result
    }

    /// `<-` is right-associative and the lowest-precedence operator.
    fn parse_assign(&mut self) -> Option<Expr> {
        if let Lexeme::ObjectId(name) = self.peek().clone() {
            if matches!(self.peek_ahead(1), Lexeme::Assign) {
                let start = self.current_span();
                self.advance();
                self.advance();
                let rhs = self.parse_assign()?;
                let span = start.merge(rhs.span);
                return Some(Expr::new(ExprKind::Assign(Spanned::new(name, start), Box::new(rhs)), span));
            }
        }
        self.parse_not()
    }

    fn parse_not(&mut self) -> Option<Expr> {
        if self.at(&Lexeme::Not) {
            let start = self.current_span();
            self.advance();
            let operand = self.parse_not()?;
            let span = start.merge(operand.span);
            return Some(Expr::new(ExprKind::Not(Box::new(operand)), span));
        }
        self.parse_comparison()
    }

    /// `<= < =` are non-associative: at most one comparison per expression.
    fn parse_comparison(&mut self) -> Option<Expr> {
        let lhs = self.parse_additive()?;
        let build: fn(Box<Expr>, Box<Expr>) -> ExprKind = match self.peek() {
            Lexeme::Lt => ExprKind::Lt,
            Lexeme::Le => ExprKind::Le,
            Lexeme::Eq => ExprKind::Eq,
            _ => return Some(lhs),
        };
        self.advance();
        let rhs = self.parse_additive()?;
        let span = lhs.span.merge(rhs.span);
        Some(Expr::new(build(Box::new(lhs), Box::new(rhs)), span))
    }

    fn parse_additive(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let build: fn(Box<Expr>, Box<Expr>) -> ExprKind = match self.peek() {
                Lexeme::Plus => ExprKind::Add,
                Lexeme::Minus => ExprKind::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_multiplicative()?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(build(Box::new(lhs), Box::new(rhs)), span);
        }
        Some(lhs)
    }

    fn parse_multiplicative(&mut self) -> Option<Expr> {
        let mut lhs = self.parse_isvoid()?;
        loop {
            let build: fn(Box<Expr>, Box<Expr>) -> ExprKind = match self.peek() {
                Lexeme::Star => ExprKind::Mul,
                Lexeme::Slash => ExprKind::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_isvoid()?;
            let span = lhs.span.merge(rhs.span);
            lhs = Expr::new(build(Box::new(lhs), Box::new(rhs)), span);
        }
        Some(lhs)
    }

    fn parse_isvoid(&mut self) -> Option<Expr> {
        if self.at(&Lexeme::Isvoid) {
            let start = self.current_span();
            self.advance();
            let operand = self.parse_isvoid()?;
            let span = start.merge(operand.span);
            return Some(Expr::new(ExprKind::Isvoid(Box::new(operand)), span));
        }
        self.parse_neg()
    }

    fn parse_neg(&mut self) -> Option<Expr> {
        if self.at(&Lexeme::Tilde) {
            let start = self.current_span();
            self.advance();
            let operand = self.parse_neg()?;
            let span = start.merge(operand.span);
            return Some(Expr::new(ExprKind::Neg(Box::new(operand)), span));
        }
        self.parse_dispatch_chain()
    }

    /// Postfix `.method(args)` and `@Type.method(args)` chains.
    fn parse_dispatch_chain(&mut self) -> Option<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.at(&Lexeme::At) {
                self.advance();
                let dispatch_type = self.expect_type_id()?;
                self.expect(&Lexeme::Dot);
                let method = self.expect_object_id()?;
                let args = self.parse_args()?;
                let span = expr.span.merge(self.prev_span());
                expr = Expr::new(
                    ExprKind::StaticDispatch { receiver: Box::new(expr), dispatch_type, method, args },
                    span,
                );
            } else if self.at(&Lexeme::Dot) {
                self.advance();
                let method = self.expect_object_id()?;
                let args = self.parse_args()?;
                let span = expr.span.merge(self.prev_span());
                expr = Expr::new(ExprKind::Dispatch { receiver: Box::new(expr), method, args }, span);
            } else {
                break;
            }
        }
        Some(expr)
    }

    fn parse_args(&mut self) -> Option<Vec<Expr>> {
        self.expect(&Lexeme::LParen);
        let mut args = Vec::new();
        if !self.at(&Lexeme::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&Lexeme::Comma) {
                    break;
                }
            }
        }
        self.expect(&Lexeme::RParen);
        Some(args)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let start = self.current_span();
        match self.peek().clone() {
            Lexeme::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&Lexeme::RParen);
                Some(inner)
            }
            Lexeme::LBrace => self.parse_block(),
            Lexeme::If => self.parse_if(),
            Lexeme::While => self.parse_while(),
            Lexeme::Let => self.parse_let(),
            Lexeme::Case => self.parse_case(),
            Lexeme::New => {
                self.advance();
                let ty = self.expect_type_id()?;
                let span = start.merge(ty.span);
                Some(Expr::new(ExprKind::New(ty), span))
            }
            Lexeme::IntConst(n) => {
                self.advance();
                Some(Expr::new(ExprKind::IntConst(n), start))
            }
            Lexeme::StringConst(s) => {
                self.advance();
                Some(Expr::new(ExprKind::StringConst(s), start))
            }
            Lexeme::BoolConst(b) => {
                self.advance();
                Some(Expr::new(ExprKind::BoolConst(b), start))
            }
            Lexeme::ObjectId(name) => {
                self.advance();
                if self.at(&Lexeme::LParen) {
                    let args = self.parse_args()?;
                    let span = start.merge(self.prev_span());
                    Some(Expr::new(ExprKind::SelfDispatch { method: Spanned::new(name, start), args }, span))
                } else {
                    Some(Expr::new(ExprKind::Object(name), start))
                }
            }
            other => {
                self.error_at_current(&format!("unexpected {} in expression", other.description()));
                self.advance();
                None
            }
        }
    }

    fn parse_block(&mut self) -> Option<Expr> {
        let start = self.current_span();
        self.expect(&Lexeme::LBrace);
        let mut exprs = Vec::new();
        while !self.at(&Lexeme::RBrace) && !self.at(&Lexeme::Eof) {
            exprs.push(self.parse_expr()?);
            self.expect(&Lexeme::Semicolon);
        }
        if exprs.is_empty() {
            self.error_at_current("a block must contain at least one expression");
        }
        let end = self.expect(&Lexeme::RBrace);
        Some(Expr::new(ExprKind::Block(exprs), start.merge(end)))
    }

    fn parse_if(&mut self) -> Option<Expr> {
        let start = self.current_span();
        self.expect(&Lexeme::If);
        let cond = self.parse_expr()?;
        self.expect(&Lexeme::Then);
        let then_branch = self.parse_expr()?;
        self.expect(&Lexeme::Else);
        let else_branch = self.parse_expr()?;
        let end = self.expect(&Lexeme::Fi);
        Some(Expr::new(
            ExprKind::If { cond: Box::new(cond), then_branch: Box::new(then_branch), else_branch: Box::new(else_branch) },
            start.merge(end),
        ))
    }

    fn parse_while(&mut self) -> Option<Expr> {
        let start = self.current_span();
        self.expect(&Lexeme::While);
        let cond = self.parse_expr()?;
        self.expect(&Lexeme::Loop);
        let body = self.parse_expr()?;
        let end = self.expect(&Lexeme::Pool);
        Some(Expr::new(ExprKind::While { cond: Box::new(cond), body: Box::new(body) }, start.merge(end)))
    }

    fn parse_let(&mut self) -> Option<Expr> {
        let start = self.current_span();
        self.expect(&Lexeme::Let);
        let mut bindings = vec![self.parse_let_binding()?];
        while self.eat(&Lexeme::Comma) {
            bindings.push(self.parse_let_binding()?);
        }
        self.expect(&Lexeme::In);
        let body = self.parse_expr()?;
        let span = start.merge(body.span);
        Some(Expr::new(ExprKind::Let { bindings, body: Box::new(body) }, span))
    }

    fn parse_let_binding(&mut self) -> Option<LetBinding> {
        let start = self.current_span();
        let name = self.expect_object_id()?;
        self.expect(&Lexeme::Colon);
        let declared_type = self.expect_type_id()?;
        let init = if self.eat(&Lexeme::Assign) { Some(self.parse_expr()?) } else { None };
        let end = init.as_ref().map(|e| e.span).unwrap_or(declared_type.span);
        Some(LetBinding { name, declared_type, init, span: start.merge(end) })
    }

    fn parse_case(&mut self) -> Option<Expr> {
        let start = self.current_span();
        self.expect(&Lexeme::Case);
        let scrutinee = self.parse_expr()?;
        self.expect(&Lexeme::Of);
        let mut arms = Vec::new();
        while !self.at(&Lexeme::Esac) && !self.at(&Lexeme::Eof) {
            arms.push(self.parse_case_arm()?);
        }
        if arms.is_empty() {
            self.error_at_current("a case expression must have at least one branch");
        }
        let end = self.expect(&Lexeme::Esac);
        Some(Expr::new(ExprKind::Case { scrutinee: Box::new(scrutinee), arms }, start.merge(end)))
    }

    fn parse_case_arm(&mut self) -> Option<CaseArm> {
        let start = self.current_span();
        let name = self.expect_object_id()?;
        self.expect(&Lexeme::Colon);
        let declared_type = self.expect_type_id()?;
        self.expect(&Lexeme::Darrow);
        let body = self.parse_expr()?;
        self.expect(&Lexeme::Semicolon);
        let span = start.merge(body.span);
        Some(CaseArm { name, declared_type, body, span })
    }

    // --- Utility methods ---

    fn peek(&self) -> &Lexeme {
        &self.tokens[self.pos].node
    }

    fn peek_ahead(&self, n: usize) -> &Lexeme {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].node
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn prev_span(&self) -> Span {
        if self.pos > 0 {
            self.tokens[self.pos - 1].span
        } else {
            self.current_span()
        }
    }

    fn advance(&mut self) -> &Spanned<Lexeme> {
        let tok = &self.tokens[self.pos];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, token: &Lexeme) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Lexeme) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Lexeme) -> Span {
        if self.at(token) {
            let span = self.current_span();
            self.advance();
            span
        } else {
            self.error_at_current(&format!("expected {}, found {}", token.description(), self.peek().description()));
            self.current_span()
        }
    }

    fn expect_type_id(&mut self) -> Option<Spanned<String>> {
        if let Lexeme::TypeId(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            Some(Spanned::new(name, span))
        } else {
            self.error_at_current(&format!("expected a type name, found {}", self.peek().description()));
            None
        }
    }

    fn expect_object_id(&mut self) -> Option<Spanned<String>> {
        if let Lexeme::ObjectId(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            Some(Spanned::new(name, span))
        } else {
            self.error_at_current(&format!("expected an identifier, found {}", self.peek().description()));
            None
        }
    }

    fn error_at_current(&mut self, msg: &str) {
        self.diagnostics.push(Diagnostic::error(ErrorKind::SyntaxError, msg.to_string(), self.current_span()));
    }

    fn error_with_help(&mut self, msg: &str, help: &str) {
        self.diagnostics
            .push(Diagnostic::error(ErrorKind::SyntaxError, msg.to_string(), self.current_span()).with_help(help.to_string()));
    }
}
