//! Core parser struct and token-cursor helpers.

use crate::ast::{Ident, Program};
use crate::error::ParserError;
use crate::lexer::{Lexer, Token, TokenKind};
use crate::span::Span;

pub type ParseResult<T> = Result<T, ParserError>;

/// The parser for Spike. Pulls tokens lazily from the lexer through a
/// two-slot window: `current` is the token being parsed, `peek` the
/// one-token look-ahead that drives precedence climbing.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    pub(crate) current: Token,
    pub(crate) peek: Token,
}

impl<'a> Parser<'a> {
    pub fn new(mut lexer: Lexer<'a>) -> ParseResult<Self> {
        let current = lexer.next_token()?;
        let peek = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            peek,
        })
    }

    /// Parse a complete program, stopping at the first error.
    pub fn parse_program(&mut self) -> ParseResult<Program> {
        let mut statements = Vec::new();

        while !self.current_is(&TokenKind::Eof) {
            // Stray semicolons between statements are consumed silently.
            if self.current_is(&TokenKind::Semicolon) {
                self.next_token()?;
                continue;
            }
            statements.push(self.parse_statement()?);
            self.next_token()?;
        }

        Ok(Program::new(statements))
    }

    // ===== Token manipulation =====

    pub(crate) fn next_token(&mut self) -> ParseResult<()> {
        self.current = std::mem::replace(&mut self.peek, self.lexer.next_token()?);
        Ok(())
    }

    pub(crate) fn current_is(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn peek_is(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.peek.kind) == std::mem::discriminant(kind)
    }

    /// Advance over `peek` if it matches, error otherwise.
    pub(crate) fn expect_peek(&mut self, kind: &TokenKind) -> ParseResult<()> {
        if self.peek_is(kind) {
            self.next_token()
        } else {
            Err(ParserError::unexpected_token(
                format!("{}", kind),
                format!("{}", self.peek.kind),
                self.peek.span,
            ))
        }
    }

    pub(crate) fn expect_peek_identifier(&mut self) -> ParseResult<Ident> {
        match &self.peek.kind {
            TokenKind::Identifier(name) => {
                let ident = Ident::new(name.clone(), self.peek.span);
                self.next_token()?;
                Ok(ident)
            }
            _ => Err(ParserError::unexpected_token(
                "identifier",
                format!("{}", self.peek.kind),
                self.peek.span,
            )),
        }
    }

    pub(crate) fn current_span(&self) -> Span {
        self.current.span
    }
}
