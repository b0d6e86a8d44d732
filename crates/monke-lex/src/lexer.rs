//! Single-pass, byte-oriented lexer (spec.md §4.1).
//!
//! State is a cursor into the source buffer (byte position, current byte,
//! line counter). Whitespace and `//` line comments are skipped between
//! tokens; lexing an unclassifiable byte never fails — it produces an
//! `Illegal` token and the cursor advances past it, so the driver can
//! always make forward progress through garbage input.

use monke_util::Span;

use crate::token::{lookup_ident, Token, TokenKind};

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    position: usize,
    read_position: usize,
    ch: u8,
    line: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let bytes = source.as_bytes();
        let mut lexer = Self {
            source,
            bytes,
            position: 0,
            read_position: 0,
            ch: 0,
            line: 1,
        };
        lexer.read_char();
        lexer
    }

    fn read_char(&mut self) {
        if self.read_position >= self.bytes.len() {
            self.ch = 0;
        } else {
            self.ch = self.bytes[self.read_position];
        }
        self.position = self.read_position;
        self.read_position += 1;
    }

    fn peek_char(&self) -> u8 {
        if self.read_position >= self.bytes.len() {
            0
        } else {
            self.bytes[self.read_position]
        }
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.bytes.len()
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.ch {
                b' ' | b'\t' | b'\r' => self.read_char(),
                b'\n' => {
                    self.line += 1;
                    self.read_char();
                }
                b'/' if self.peek_char() == b'/' => {
                    while self.ch != b'\n' && !self.is_at_end() {
                        self.read_char();
                    }
                }
                _ => break,
            }
        }
    }

    fn make(&self, kind: TokenKind, start: usize, start_line: u32) -> Token {
        Token::new(kind, Span::new(start, self.position, start_line))
    }

    /// Returns the next token in the stream, or `Token::Eof` at the end.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();

        let start = self.position;
        let start_line = self.line;

        if self.is_at_end() {
            return self.make(TokenKind::Eof, start, start_line);
        }

        let kind = match self.ch {
            b'=' => {
                if self.peek_char() == b'=' {
                    self.read_char();
                    self.read_char();
                    TokenKind::Eq
                } else {
                    self.read_char();
                    TokenKind::Assign
                }
            }
            b'+' => {
                if self.peek_char() == b'=' {
                    self.read_char();
                    self.read_char();
                    TokenKind::PlusAssign
                } else {
                    self.read_char();
                    TokenKind::Plus
                }
            }
            b'-' => {
                if self.peek_char() == b'=' {
                    self.read_char();
                    self.read_char();
                    TokenKind::MinusAssign
                } else {
                    self.read_char();
                    TokenKind::Minus
                }
            }
            b'*' => {
                if self.peek_char() == b'=' {
                    self.read_char();
                    self.read_char();
                    TokenKind::AsteriskAssign
                } else {
                    self.read_char();
                    TokenKind::Asterisk
                }
            }
            b'/' => {
                if self.peek_char() == b'=' {
                    self.read_char();
                    self.read_char();
                    TokenKind::SlashAssign
                } else {
                    self.read_char();
                    TokenKind::Slash
                }
            }
            b'!' => {
                if self.peek_char() == b'=' {
                    self.read_char();
                    self.read_char();
                    TokenKind::NotEq
                } else {
                    self.read_char();
                    TokenKind::Bang
                }
            }
            b'<' => {
                self.read_char();
                TokenKind::Lt
            }
            b'>' => {
                self.read_char();
                TokenKind::Gt
            }
            b':' => {
                self.read_char();
                TokenKind::Colon
            }
            b',' => {
                self.read_char();
                TokenKind::Comma
            }
            b';' => {
                self.read_char();
                TokenKind::Semicolon
            }
            b'(' => {
                self.read_char();
                TokenKind::LParen
            }
            b')' => {
                self.read_char();
                TokenKind::RParen
            }
            b'{' => {
                self.read_char();
                TokenKind::LBrace
            }
            b'}' => {
                self.read_char();
                TokenKind::RBrace
            }
            b'[' => {
                self.read_char();
                TokenKind::LBracket
            }
            b']' => {
                self.read_char();
                TokenKind::RBracket
            }
            b'"' => return self.lex_string(start, start_line),
            b'0'..=b'9' => return self.lex_number(start, start_line),
            c if is_ident_start(c) => return self.lex_identifier(start, start_line),
            _ => {
                self.read_char();
                TokenKind::Illegal
            }
        };

        self.make(kind, start, start_line)
    }

    fn lex_identifier(&mut self, start: usize, start_line: u32) -> Token {
        while is_ident_continue(self.ch) {
            self.read_char();
        }
        let text = &self.source[start..self.position];
        self.make(lookup_ident(text), start, start_line)
    }

    fn lex_number(&mut self, start: usize, start_line: u32) -> Token {
        if self.ch == b'0' && (self.peek_char() == b'x' || self.peek_char() == b'X') {
            self.read_char();
            self.read_char();
            while self.ch.is_ascii_hexdigit() {
                self.read_char();
            }
            return self.finish_number(start, start_line, TokenKind::Int);
        }
        if self.ch == b'0' && (self.peek_char() == b'b' || self.peek_char() == b'B') {
            self.read_char();
            self.read_char();
            while self.ch == b'0' || self.ch == b'1' {
                self.read_char();
            }
            return self.finish_number(start, start_line, TokenKind::Int);
        }

        while self.ch.is_ascii_digit() {
            self.read_char();
        }
        if self.ch == b'.' && self.peek_char().is_ascii_digit() {
            self.read_char();
            while self.ch.is_ascii_digit() {
                self.read_char();
            }
            return self.make(TokenKind::Float, start, start_line);
        }
        self.make(TokenKind::Int, start, start_line)
    }

    /// A `0x`/`0b` literal directly followed by `.` is malformed — per
    /// spec.md §9 ("Numeric literal base") it lexes as `Illegal` rather
    /// than silently becoming a float.
    fn finish_number(&mut self, start: usize, start_line: u32, kind: TokenKind) -> Token {
        if self.ch == b'.' {
            self.read_char();
            while self.ch.is_ascii_digit() {
                self.read_char();
            }
            return self.make(TokenKind::Illegal, start, start_line);
        }
        self.make(kind, start, start_line)
    }

    fn lex_string(&mut self, start: usize, start_line: u32) -> Token {
        self.read_char(); // consume opening quote
        loop {
            if self.ch == b'"' {
                self.read_char();
                return self.make(TokenKind::Str, start, start_line);
            }
            if self.is_at_end() {
                // Unterminated string: span covers just the opening quote.
                return Token::new(TokenKind::Illegal, Span::new(start, start + 1, start_line));
            }
            if self.ch == b'\n' {
                self.line += 1;
            }
            self.read_char();
        }
    }
}

fn is_ident_start(c: u8) -> bool {
    c.is_ascii_alphabetic() || c == b'_'
}

fn is_ident_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}
