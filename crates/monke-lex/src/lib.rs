//! Lexical analysis for Monke (spec.md §4.1): source text to a token
//! stream, with no backtracking and no fatal errors — an unclassifiable
//! byte yields `TokenKind::Illegal` and scanning continues.

pub mod lexer;
pub mod token;

pub use lexer::Lexer;
pub use token::{lookup_ident, Token, TokenKind};
