//! Statement parsing (spec.md §4.2): dispatch on the leading token, the
//! let/for/while grammars, and the expression-statement upgrade to
//! assignment / operator-assignment.

use monke_ast::{
    AssignOp, AssignStmt, Expr, ExprStmt, FunctionLit, LetBinding, LetStmt, LoopStmt, OpAssignStmt,
    ReturnStmt, Stmt,
};
use monke_lex::TokenKind;

use crate::parser::Parser;
use crate::precedence::Precedence;

/// Mirrors the prefix-handler dispatch in `Parser::parse_prefix`, used to
/// decide whether a bare `return` has a trailing value.
fn has_prefix_handler(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Ident
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Str
            | TokenKind::Null
            | TokenKind::Nothing
            | TokenKind::Bang
            | TokenKind::Minus
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::LBrace
            | TokenKind::If
            | TokenKind::Fn
            | TokenKind::Require
    )
}

impl<'a> Parser<'a> {
    pub(crate) fn parse_statement(&mut self) -> Option<Stmt> {
        match self.cur.kind {
            TokenKind::Let => self.parse_let_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Break => self.parse_break_statement(),
            TokenKind::Continue => self.parse_continue_statement(),
            TokenKind::LBrace => self.parse_block_statement().map(Stmt::Block),
            TokenKind::Illegal => {
                self.error("unexpected illegal token");
                None
            }
            _ => self.parse_expression_statement(),
        }
    }

    /// `let name [= expr] (, name [= expr])*`. A function literal bound
    /// directly by name records that name so stack traces and recursive
    /// calls can refer to it (spec.md §3 invariant).
    fn parse_let_statement(&mut self) -> Option<Stmt> {
        let start = self.cur.span;
        let mut bindings = Vec::new();
        bindings.push(self.parse_let_binding()?);

        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            bindings.push(self.parse_let_binding()?);
        }

        if !self.check_statement_terminator() {
            return None;
        }

        let span = self.span_from(start);
        Some(Stmt::Let(LetStmt { bindings, span }))
    }

    fn parse_let_binding(&mut self) -> Option<LetBinding> {
        if !self.expect_peek(TokenKind::Ident) {
            return None;
        }
        let name = self.cur.span;

        if !self.peek_is(TokenKind::Assign) {
            return Some(LetBinding { name, value: None });
        }
        self.next_token();
        self.next_token();

        let mut value = self.parse_expression(Precedence::Lowest)?;
        if let Expr::Function(FunctionLit { name: fn_name, .. }) = &mut value {
            *fn_name = Some(name);
        }
        Some(LetBinding { name, value: Some(value) })
    }

    /// `return [expr];` — a value is parsed only if the next token could
    /// start one; otherwise this is a bare return.
    fn parse_return_statement(&mut self) -> Option<Stmt> {
        let start = self.cur.span;

        let value = if has_prefix_handler(self.peek.kind) {
            self.next_token();
            Some(self.parse_expression(Precedence::Lowest)?)
        } else {
            None
        };

        if !self.check_statement_terminator() {
            return None;
        }

        let span = self.span_from(start);
        Some(Stmt::Return(ReturnStmt { value, span }))
    }

    fn parse_break_statement(&mut self) -> Option<Stmt> {
        let span = self.cur.span;
        if !self.check_statement_terminator() {
            return None;
        }
        Some(Stmt::Break(span))
    }

    fn parse_continue_statement(&mut self) -> Option<Stmt> {
        let span = self.cur.span;
        if !self.check_statement_terminator() {
            return None;
        }
        Some(Stmt::Continue(span))
    }

    /// `for (init; cond; update) { body }`. Any clause may be empty, but
    /// the two semicolons are always required.
    fn parse_for_statement(&mut self) -> Option<Stmt> {
        let start = self.cur.span;
        if !self.expect_peek(TokenKind::LParen) {
            return None;
        }

        self.next_token();
        let init = if self.cur_is(TokenKind::Semicolon) {
            None
        } else {
            let stmt = self.parse_for_clause_statement()?;
            Some(Box::new(stmt))
        };
        if !self.cur_is(TokenKind::Semicolon) {
            if !self.expect_peek(TokenKind::Semicolon) {
                return None;
            }
        }

        self.next_token();
        let condition = if self.cur_is(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression(Precedence::Lowest)?)
        };
        if !self.expect_peek(TokenKind::Semicolon) {
            return None;
        }

        self.next_token();
        let update = if self.cur_is(TokenKind::RParen) {
            None
        } else {
            let stmt = self.parse_for_clause_statement()?;
            Some(Box::new(stmt))
        };
        if !self.cur_is(TokenKind::RParen) && !self.expect_peek(TokenKind::RParen) {
            return None;
        }

        if !self.expect_peek(TokenKind::LBrace) {
            return None;
        }
        let body = self.parse_block_statement()?;

        let span = self.span_from(start);
        Some(Stmt::Loop(LoopStmt { init, condition, update, body, span }))
    }

    /// A bare `let` or expression clause inside `for (...)`, without the
    /// trailing-semicolon rule that ordinary statements require.
    fn parse_for_clause_statement(&mut self) -> Option<Stmt> {
        if self.cur_is(TokenKind::Let) {
            let start = self.cur.span;
            let binding = self.parse_let_binding()?;
            let span = self.span_from(start);
            return Some(Stmt::Let(LetStmt { bindings: vec![binding], span }));
        }
        let start = self.cur.span;
        let expr = self.parse_expression(Precedence::Lowest)?;
        self.parse_expression_tail(expr, start)
    }

    /// `while (cond) { body }` shares the `LoopStmt` skeleton with no
    /// init/update clause.
    fn parse_while_statement(&mut self) -> Option<Stmt> {
        let start = self.cur.span;
        if !self.expect_peek(TokenKind::LParen) {
            return None;
        }
        self.next_token();
        let condition = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenKind::RParen) {
            return None;
        }
        if !self.expect_peek(TokenKind::LBrace) {
            return None;
        }
        let body = self.parse_block_statement()?;

        let span = self.span_from(start);
        Some(Stmt::Loop(LoopStmt {
            init: None,
            condition: Some(condition),
            update: None,
            body,
            span,
        }))
    }

    fn parse_expression_statement(&mut self) -> Option<Stmt> {
        let start = self.cur.span;
        let expr = self.parse_expression(Precedence::Lowest)?;
        let stmt = self.parse_expression_tail(expr, start)?;
        if !self.check_statement_terminator() {
            return None;
        }
        Some(stmt)
    }

    /// An expression may turn out to be the lvalue of `=`, `+=`, `-=`,
    /// `*=`, or `/=`; this folds that upgrade in after the expression is
    /// already parsed (spec.md §4.2).
    fn parse_expression_tail(&mut self, expr: Expr, start: monke_util::Span) -> Option<Stmt> {
        let op = match self.peek.kind {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(AssignOp::Add),
            TokenKind::MinusAssign => Some(AssignOp::Sub),
            TokenKind::AsteriskAssign => Some(AssignOp::Mul),
            TokenKind::SlashAssign => Some(AssignOp::Div),
            _ => {
                let span = self.span_from(start);
                return Some(Stmt::Expr(ExprStmt { expr, span }));
            }
        };

        if !expr.is_valid_assign_target() {
            self.next_token();
            self.error("invalid assignment target");
            return None;
        }

        self.next_token();
        self.next_token();
        let mut value = self.parse_expression(Precedence::Lowest)?;
        let span = start.merge(value.span());

        if op.is_none() {
            if let Expr::Ident(ident) = &expr {
                if let Expr::Function(FunctionLit { name: fn_name, .. }) = &mut value {
                    *fn_name = Some(ident.name);
                }
            }
        }

        match op {
            None => Some(Stmt::Assign(AssignStmt {
                target: Box::new(expr),
                value: Box::new(value),
                span,
            })),
            Some(op) => Some(Stmt::OpAssign(OpAssignStmt {
                target: Box::new(expr),
                op,
                value: Box::new(value),
                span,
            })),
        }
    }
}
