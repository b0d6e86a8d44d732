//! Parser core: token cursor, statement driver loop, and the Pratt
//! expression-parsing entry point (spec.md §4.2).

use monke_ast::{BlockStmt, Program};
use monke_lex::{Lexer, Token, TokenKind};
use monke_util::Span;

use crate::error::ParseError;
use crate::precedence::Precedence;

pub struct Parser<'a> {
    pub(crate) source: &'a str,
    lexer: Lexer<'a>,
    pub(crate) cur: Token,
    pub(crate) peek: Token,
    pub(crate) errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let cur = lexer.next_token();
        let peek = lexer.next_token();
        Self { source, lexer, cur, peek, errors: Vec::new() }
    }

    pub(crate) fn next_token(&mut self) {
        self.cur = self.peek;
        self.peek = self.lexer.next_token();
    }

    pub(crate) fn cur_is(&self, kind: TokenKind) -> bool {
        self.cur.kind == kind
    }

    pub(crate) fn peek_is(&self, kind: TokenKind) -> bool {
        self.peek.kind == kind
    }

    pub(crate) fn cur_precedence(&self) -> Precedence {
        crate::precedence::precedence_of(self.cur.kind)
    }

    pub(crate) fn peek_precedence(&self) -> Precedence {
        crate::precedence::precedence_of(self.peek.kind)
    }

    /// If the peek token is `kind`, consume it and return true; otherwise
    /// record "expected next token to be X, got Y instead" and return
    /// false.
    pub(crate) fn expect_peek(&mut self, kind: TokenKind) -> bool {
        if self.peek_is(kind) {
            self.next_token();
            true
        } else {
            self.peek_error(kind);
            false
        }
    }

    pub(crate) fn peek_error(&mut self, expected: TokenKind) {
        self.error(format!(
            "expected next token to be '{:?}', got '{:?}' instead",
            expected, self.peek.kind
        ));
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        self.errors.push(ParseError::new(message.into(), self.cur.span));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Top-level driver: parses statements until EOF or the first error
    /// (spec.md §4.2 — the parser "stops on the first error").
    pub fn parse_program(&mut self) -> Program {
        let mut statements = Vec::new();
        while !self.cur_is(TokenKind::Eof) {
            match self.parse_statement() {
                Some(stmt) => {
                    statements.push(stmt);
                    self.next_token();
                }
                None => break,
            }
        }
        Program { statements }
    }

    /// Statement-termination rule (spec.md §4.2): after a statement, the
    /// next token must be `;`, or appear on a new line, or be one of
    /// `EOF ) ] }`.
    pub(crate) fn check_statement_terminator(&mut self) -> bool {
        if self.peek_is(TokenKind::Semicolon) {
            self.next_token();
            return true;
        }
        if self.peek.span.line != self.cur.span.line {
            return true;
        }
        match self.peek.kind {
            TokenKind::Eof | TokenKind::RBracket | TokenKind::RBrace | TokenKind::RParen => true,
            _ => {
                self.next_token();
                self.error("this statement must be on a new line or come after a semicolon");
                false
            }
        }
    }

    pub(crate) fn parse_block_statement(&mut self) -> Option<BlockStmt> {
        let start_span = self.cur.span;
        self.next_token();

        let mut statements = Vec::new();
        while !self.cur_is(TokenKind::RBrace) && !self.cur_is(TokenKind::Eof) {
            let stmt = self.parse_statement()?;
            statements.push(stmt);
            self.next_token();
        }

        if !self.cur_is(TokenKind::RBrace) {
            self.error("expected next token to be '}', got EOF instead");
            return None;
        }

        Some(BlockStmt { statements, span: start_span.merge(self.cur.span) })
    }

    /// Parses a comma-separated list of expressions up to (and
    /// including) `end`. Assumes `self.cur` is the opening delimiter.
    pub(crate) fn parse_expression_list(&mut self, end: TokenKind) -> Option<Vec<monke_ast::Expr>> {
        let mut list = Vec::new();
        if self.peek_is(end) {
            self.next_token();
            return Some(list);
        }

        self.next_token();
        list.push(self.parse_expression(Precedence::Lowest)?);

        while self.peek_is(TokenKind::Comma) {
            self.next_token();
            self.next_token();
            list.push(self.parse_expression(Precedence::Lowest)?);
        }

        if !self.expect_peek(end) {
            return None;
        }
        Some(list)
    }

    /// Pratt parsing core: dispatch the current token's prefix rule, then
    /// repeatedly fold in infix operators whose precedence exceeds
    /// `precedence`.
    pub(crate) fn parse_expression(&mut self, precedence: Precedence) -> Option<monke_ast::Expr> {
        let mut left = self.parse_prefix()?;

        while !self.peek_is(TokenKind::Semicolon) && precedence < self.peek_precedence() {
            if !has_infix(self.peek.kind) {
                return Some(left);
            }
            self.next_token();
            left = self.parse_infix(left)?;
        }

        Some(left)
    }

    pub(crate) fn span_from(&self, start: Span) -> Span {
        start.merge(self.cur.span)
    }
}

fn has_infix(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Asterisk
            | TokenKind::Slash
            | TokenKind::Eq
            | TokenKind::NotEq
            | TokenKind::Lt
            | TokenKind::Gt
            | TokenKind::LParen
            | TokenKind::LBracket
    )
}
