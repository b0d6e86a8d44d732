//! Prefix and infix expression handlers (spec.md §4.2), one per token
//! kind that can start or continue an expression.

use monke_ast::{
    ArrayLit, CallExpr, Expr, FunctionLit, Ident, IfExpr, IndexExpr, InfixExpr, InfixOp,
    PrefixExpr, PrefixOp, RequireExpr, TableLit,
};
use monke_lex::TokenKind;

use crate::numeric::{parse_float_literal, parse_int_literal};
use crate::precedence::Precedence;
use crate::parser::Parser;

impl<'a> Parser<'a> {
    pub(crate) fn parse_prefix(&mut self) -> Option<Expr> {
        match self.cur.kind {
            TokenKind::Ident => Some(self.parse_identifier()),
            TokenKind::Int => self.parse_int_literal(),
            TokenKind::Float => self.parse_float_literal_expr(),
            TokenKind::True | TokenKind::False => Some(self.parse_bool_literal()),
            TokenKind::Str => Some(self.parse_string_literal()),
            TokenKind::Null | TokenKind::Nothing => Some(Expr::Null(self.cur.span)),
            TokenKind::Bang => self.parse_prefix_expr(PrefixOp::Bang),
            TokenKind::Minus => self.parse_prefix_expr(PrefixOp::Minus),
            TokenKind::LParen => self.parse_grouped_expr(),
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_table_literal(),
            TokenKind::If => self.parse_if_expr(),
            TokenKind::Fn => self.parse_function_literal(),
            TokenKind::Require => self.parse_require_expr(),
            other => {
                self.error(format!("no prefix parse function for '{:?}' found", other));
                None
            }
        }
    }

    pub(crate) fn parse_infix(&mut self, left: Expr) -> Option<Expr> {
        match self.cur.kind {
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Asterisk
            | TokenKind::Slash
            | TokenKind::Eq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::Gt => self.parse_infix_expr(left),
            TokenKind::LParen => self.parse_call_expr(left),
            TokenKind::LBracket => self.parse_index_expr(left),
            other => {
                self.error(format!("no infix parse function for '{:?}' found", other));
                None
            }
        }
    }

    fn parse_identifier(&mut self) -> Expr {
        Expr::Ident(Ident { name: self.cur.span })
    }

    fn parse_int_literal(&mut self) -> Option<Expr> {
        let span = self.cur.span;
        let text = self.cur.span.slice(self.source);
        match parse_int_literal(text) {
            Ok(v) => Some(Expr::Int(v, span)),
            Err(message) => {
                self.error(message);
                None
            }
        }
    }

    fn parse_float_literal_expr(&mut self) -> Option<Expr> {
        let span = self.cur.span;
        let text = self.cur.span.slice(self.source);
        match parse_float_literal(text) {
            Ok(v) => Some(Expr::Float(v, span)),
            Err(message) => {
                self.error(message);
                None
            }
        }
    }

    fn parse_bool_literal(&mut self) -> Expr {
        Expr::Bool(self.cur_is(TokenKind::True), self.cur.span)
    }

    fn parse_string_literal(&mut self) -> Expr {
        Expr::Str(self.cur.span)
    }

    fn parse_prefix_expr(&mut self, op: PrefixOp) -> Option<Expr> {
        let start = self.cur.span;
        self.next_token();
        let right = self.parse_expression(Precedence::Prefix)?;
        let span = self.span_from(start);
        Some(Expr::Prefix(PrefixExpr { op, right: Box::new(right), span }))
    }

    fn parse_infix_expr(&mut self, left: Expr) -> Option<Expr> {
        let op = match self.cur.kind {
            TokenKind::Plus => InfixOp::Add,
            TokenKind::Minus => InfixOp::Sub,
            TokenKind::Asterisk => InfixOp::Mul,
            TokenKind::Slash => InfixOp::Div,
            TokenKind::Eq => InfixOp::Eq,
            TokenKind::NotEq => InfixOp::NotEq,
            TokenKind::Lt => InfixOp::Lt,
            TokenKind::Gt => InfixOp::Gt,
            _ => unreachable!("parse_infix_expr only dispatched for operator tokens"),
        };
        let precedence = self.cur_precedence();
        let start = left.span();
        self.next_token();
        let right = self.parse_expression(precedence)?;
        let span = start.merge(right.span());
        Some(Expr::Infix(InfixExpr { left: Box::new(left), op, right: Box::new(right), span }))
    }

    fn parse_grouped_expr(&mut self) -> Option<Expr> {
        self.next_token();
        let expr = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenKind::RParen) {
            return None;
        }
        Some(expr)
    }

    fn parse_array_literal(&mut self) -> Option<Expr> {
        let start = self.cur.span;
        let elements = self.parse_expression_list(TokenKind::RBracket)?;
        let span = self.span_from(start);
        Some(Expr::Array(ArrayLit { elements, span }))
    }

    /// Table literal with shorthand: `{ x, y: 2 }` expands bare `x` into
    /// `"x": x` (spec.md §4.2).
    fn parse_table_literal(&mut self) -> Option<Expr> {
        let start = self.cur.span;
        let mut pairs = Vec::new();

        if self.peek_is(TokenKind::RBrace) {
            self.next_token();
            return Some(Expr::Table(TableLit { pairs, span: self.span_from(start) }));
        }

        self.next_token();
        pairs.push(self.parse_table_pair()?);

        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            pairs.push(self.parse_table_pair()?);
        }

        if !self.expect_peek(TokenKind::RBrace) {
            return None;
        }
        Some(Expr::Table(TableLit { pairs, span: self.span_from(start) }))
    }

    fn parse_table_pair(&mut self) -> Option<monke_ast::TablePair> {
        let key = self.parse_expression(Precedence::Lowest)?;

        // Shorthand: a bare identifier key immediately followed by `,` or
        // `}` means `x: x`, recorded as its own variant so the compiler
        // never confuses it with `{ x: x }` written out by hand.
        if let Expr::Ident(ident) = key {
            if self.peek_is(TokenKind::Comma) || self.peek_is(TokenKind::RBrace) {
                return Some(monke_ast::TablePair::Shorthand(ident));
            }
        }

        if !self.expect_peek(TokenKind::Colon) {
            return None;
        }
        self.next_token();
        let value = self.parse_expression(Precedence::Lowest)?;
        Some(monke_ast::TablePair::Explicit(key, value))
    }

    fn parse_if_expr(&mut self) -> Option<Expr> {
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
        let consequence = self.parse_block_statement()?;

        let alternative = if self.peek_is(TokenKind::Else) {
            self.next_token();
            if !self.expect_peek(TokenKind::LBrace) {
                return None;
            }
            Some(self.parse_block_statement()?)
        } else {
            None
        };

        let span = self.span_from(start);
        Some(Expr::If(IfExpr { condition: Box::new(condition), consequence, alternative, span }))
    }

    fn parse_function_literal(&mut self) -> Option<Expr> {
        let start = self.cur.span;
        if !self.expect_peek(TokenKind::LParen) {
            return None;
        }
        let params = self.parse_function_params()?;
        if !self.expect_peek(TokenKind::LBrace) {
            return None;
        }
        let body = self.parse_block_statement()?;
        let span = self.span_from(start);
        Some(Expr::Function(FunctionLit { params, body, name: None, span }))
    }

    fn parse_function_params(&mut self) -> Option<Vec<Ident>> {
        let mut params = Vec::new();

        if self.peek_is(TokenKind::RParen) {
            self.next_token();
            return Some(params);
        }

        self.next_token();
        if !self.cur_is(TokenKind::Ident) {
            self.error(format!(
                "expected function parameter name, got '{:?}' instead",
                self.cur.kind
            ));
            return None;
        }
        params.push(Ident { name: self.cur.span });

        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            if !self.cur_is(TokenKind::Ident) {
                self.error(format!(
                    "expected function parameter name, got '{:?}' instead",
                    self.cur.kind
                ));
                return None;
            }
            params.push(Ident { name: self.cur.span });
        }

        if !self.expect_peek(TokenKind::RParen) {
            return None;
        }
        Some(params)
    }

    fn parse_require_expr(&mut self) -> Option<Expr> {
        let start = self.cur.span;
        if !self.expect_peek(TokenKind::LParen) {
            return None;
        }
        let args = self.parse_expression_list(TokenKind::RParen)?;
        let span = self.span_from(start);
        Some(Expr::Require(RequireExpr { args, span }))
    }

    fn parse_call_expr(&mut self, callee: Expr) -> Option<Expr> {
        let start = callee.span();
        let args = self.parse_expression_list(TokenKind::RParen)?;
        let span = start.merge(self.cur.span);
        Some(Expr::Call(CallExpr { callee: Box::new(callee), args, span }))
    }

    fn parse_index_expr(&mut self, container: Expr) -> Option<Expr> {
        let start = container.span();
        self.next_token();
        let index = self.parse_expression(Precedence::Lowest)?;
        if !self.expect_peek(TokenKind::RBracket) {
            return None;
        }
        let span = start.merge(self.cur.span);
        Some(Expr::Index(IndexExpr { container: Box::new(container), index: Box::new(index), span }))
    }
}
