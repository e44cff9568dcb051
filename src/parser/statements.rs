//! Statement parsing.

use crate::ast::{Block, Stmt, StmtKind};
use crate::lexer::TokenKind;

use super::core::{ParseResult, Parser};
use super::precedence::Precedence;

impl Parser<'_> {
    /// Dispatch on the current token. On return, `current` sits on the last
    /// token of the statement (the trailing `;` when one was present).
    pub(crate) fn parse_statement(&mut self) -> ParseResult<Stmt> {
        match self.current.kind {
            TokenKind::Let => self.parse_let_statement(),
            TokenKind::Return => self.parse_return_statement(),
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();

        let name = self.expect_peek_identifier()?;
        self.expect_peek(&TokenKind::Equal)?;
        self.next_token()?;

        let value = self.parse_expression(Precedence::Lowest)?;
        self.consume_optional_semicolon()?;

        let span = start_span.merge(&self.current_span());
        Ok(Stmt::new(StmtKind::Let { name, value }, span))
    }

    fn parse_return_statement(&mut self) -> ParseResult<Stmt> {
        let start_span = self.current_span();

        self.next_token()?;
        let result = self.parse_expression(Precedence::Lowest)?;
        self.consume_optional_semicolon()?;

        let span = start_span.merge(&self.current_span());
        Ok(Stmt::new(StmtKind::Return(result), span))
    }

    fn parse_expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.parse_expression(Precedence::Lowest)?;
        self.consume_optional_semicolon()?;

        let span = expr.span.merge(&self.current_span());
        Ok(Stmt::new(StmtKind::Expression(expr), span))
    }

    /// Parse the statements of a `{ ... }` block. `current` must sit on the
    /// opening brace; on return it sits on the closing brace (or EOF, which
    /// also terminates a block).
    pub(crate) fn parse_block(&mut self) -> ParseResult<Block> {
        let start_span = self.current_span();
        self.next_token()?;

        let mut statements = Vec::new();
        while !self.current_is(&TokenKind::RightBrace) && !self.current_is(&TokenKind::Eof) {
            if self.current_is(&TokenKind::Semicolon) {
                self.next_token()?;
                continue;
            }
            statements.push(self.parse_statement()?);
            self.next_token()?;
        }

        let span = start_span.merge(&self.current_span());
        Ok(Block { statements, span })
    }

    fn consume_optional_semicolon(&mut self) -> ParseResult<()> {
        if self.peek_is(&TokenKind::Semicolon) {
            self.next_token()?;
        }
        Ok(())
    }
}
