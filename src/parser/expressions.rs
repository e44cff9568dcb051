//! Expression parsing using Pratt precedence climbing.

use crate::ast::{Expr, ExprKind, Ident, InfixOp, PrefixOp};
use crate::error::ParserError;
use crate::lexer::TokenKind;

use super::core::{ParseResult, Parser};
use super::precedence::{token_precedence, Precedence};

impl Parser<'_> {
    /// Parse an expression at the given minimum binding power. `current`
    /// must sit on the expression's first token; on return it sits on the
    /// last token consumed.
    pub(crate) fn parse_expression(&mut self, precedence: Precedence) -> ParseResult<Expr> {
        let mut left = self.parse_prefix()?;

        while !self.peek_is(&TokenKind::Semicolon)
            && precedence < token_precedence(&self.peek.kind)
        {
            self.next_token()?;
            left = self.parse_infix(left)?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> ParseResult<Expr> {
        let span = self.current_span();

        match &self.current.kind {
            TokenKind::Identifier(name) => {
                Ok(Expr::new(ExprKind::Identifier(name.clone()), span))
            }
            TokenKind::IntLiteral(n) => Ok(Expr::new(ExprKind::IntLiteral(*n), span)),
            TokenKind::StringLiteral(s) => {
                Ok(Expr::new(ExprKind::StringLiteral(s.clone()), span))
            }
            TokenKind::BoolLiteral(b) => Ok(Expr::new(ExprKind::BoolLiteral(*b), span)),

            TokenKind::Bang => self.parse_prefix_operator(PrefixOp::Not),
            TokenKind::Minus => self.parse_prefix_operator(PrefixOp::Negate),

            TokenKind::LeftParen => {
                self.next_token()?;
                let expr = self.parse_expression(Precedence::Lowest)?;
                self.expect_peek(&TokenKind::RightParen)?;
                Ok(expr)
            }

            TokenKind::If => self.parse_if_expression(),
            TokenKind::Fn => self.parse_function_literal(),
            TokenKind::LeftBracket => self.parse_array_literal(),
            TokenKind::LeftBrace => self.parse_hash_literal(),

            kind => Err(ParserError::invalid_prefix(format!("{}", kind), span)),
        }
    }

    fn parse_prefix_operator(&mut self, op: PrefixOp) -> ParseResult<Expr> {
        let start_span = self.current_span();
        self.next_token()?;
        let right = self.parse_expression(Precedence::Prefix)?;
        let span = start_span.merge(&right.span);
        Ok(Expr::new(
            ExprKind::Prefix {
                op,
                right: Box::new(right),
            },
            span,
        ))
    }

    /// `current` sits on an infix operator; `left` is the finished operand
    /// to its left.
    fn parse_infix(&mut self, left: Expr) -> ParseResult<Expr> {
        match self.current.kind {
            TokenKind::LeftParen => self.parse_call_expression(left),
            TokenKind::LeftBracket => self.parse_index_expression(left),
            _ => {
                let op = match self.current.kind {
                    TokenKind::Plus => InfixOp::Add,
                    TokenKind::Minus => InfixOp::Subtract,
                    TokenKind::Star => InfixOp::Multiply,
                    TokenKind::Slash => InfixOp::Divide,
                    TokenKind::EqualEqual => InfixOp::Equal,
                    TokenKind::BangEqual => InfixOp::NotEqual,
                    TokenKind::Less => InfixOp::Less,
                    TokenKind::LessEqual => InfixOp::LessEqual,
                    TokenKind::Greater => InfixOp::Greater,
                    TokenKind::GreaterEqual => InfixOp::GreaterEqual,
                    TokenKind::And => InfixOp::And,
                    TokenKind::Or => InfixOp::Or,
                    ref kind => {
                        return Err(ParserError::unexpected_token(
                            "infix operator",
                            format!("{}", kind),
                            self.current_span(),
                        ))
                    }
                };

                let precedence = token_precedence(&self.current.kind);
                self.next_token()?;
                let right = self.parse_expression(precedence)?;

                let span = left.span.merge(&right.span);
                Ok(Expr::new(
                    ExprKind::Infix {
                        op,
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    span,
                ))
            }
        }
    }

    fn parse_if_expression(&mut self) -> ParseResult<Expr> {
        let start_span = self.current_span();

        self.expect_peek(&TokenKind::LeftParen)?;
        self.next_token()?;
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(&TokenKind::RightParen)?;

        self.expect_peek(&TokenKind::LeftBrace)?;
        let then_branch = self.parse_block()?;

        let else_branch = if self.peek_is(&TokenKind::Else) {
            self.next_token()?;
            self.expect_peek(&TokenKind::LeftBrace)?;
            Some(self.parse_block()?)
        } else {
            None
        };

        let span = start_span.merge(&self.current_span());
        Ok(Expr::new(
            ExprKind::If {
                condition: Box::new(condition),
                then_branch,
                else_branch,
            },
            span,
        ))
    }

    fn parse_function_literal(&mut self) -> ParseResult<Expr> {
        let start_span = self.current_span();

        self.expect_peek(&TokenKind::LeftParen)?;
        let parameters = self.parse_function_parameters()?;

        self.expect_peek(&TokenKind::LeftBrace)?;
        let body = self.parse_block()?;

        let span = start_span.merge(&self.current_span());
        Ok(Expr::new(ExprKind::Function { parameters, body }, span))
    }

    fn parse_function_parameters(&mut self) -> ParseResult<Vec<Ident>> {
        let mut parameters = Vec::new();

        if self.peek_is(&TokenKind::RightParen) {
            self.next_token()?;
            return Ok(parameters);
        }

        parameters.push(self.expect_peek_identifier()?);
        while self.peek_is(&TokenKind::Comma) {
            self.next_token()?;
            parameters.push(self.expect_peek_identifier()?);
        }

        self.expect_peek(&TokenKind::RightParen)?;
        Ok(parameters)
    }

    fn parse_call_expression(&mut self, callee: Expr) -> ParseResult<Expr> {
        let arguments = self.parse_expression_list(&TokenKind::RightParen)?;
        let span = callee.span.merge(&self.current_span());
        Ok(Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                arguments,
            },
            span,
        ))
    }

    fn parse_index_expression(&mut self, collection: Expr) -> ParseResult<Expr> {
        self.next_token()?;
        let index = self.parse_expression(Precedence::Lowest)?;
        self.expect_peek(&TokenKind::RightBracket)?;

        let span = collection.span.merge(&self.current_span());
        Ok(Expr::new(
            ExprKind::Index {
                collection: Box::new(collection),
                index: Box::new(index),
            },
            span,
        ))
    }

    fn parse_array_literal(&mut self) -> ParseResult<Expr> {
        let start_span = self.current_span();
        let elements = self.parse_expression_list(&TokenKind::RightBracket)?;
        let span = start_span.merge(&self.current_span());
        Ok(Expr::new(ExprKind::Array(elements), span))
    }

    fn parse_hash_literal(&mut self) -> ParseResult<Expr> {
        let start_span = self.current_span();
        let mut pairs = Vec::new();

        while !self.peek_is(&TokenKind::RightBrace) {
            self.next_token()?;
            let key = self.parse_expression(Precedence::Lowest)?;
            self.expect_peek(&TokenKind::Colon)?;
            self.next_token()?;
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));

            if !self.peek_is(&TokenKind::RightBrace) {
                self.expect_peek(&TokenKind::Comma)?;
            }
        }
        self.expect_peek(&TokenKind::RightBrace)?;

        let span = start_span.merge(&self.current_span());
        Ok(Expr::new(ExprKind::Hash(pairs), span))
    }

    /// Comma-separated expressions up to (and consuming) `end`. `current`
    /// must sit on the opening delimiter.
    fn parse_expression_list(&mut self, end: &TokenKind) -> ParseResult<Vec<Expr>> {
        let mut list = Vec::new();

        if self.peek_is(end) {
            self.next_token()?;
            return Ok(list);
        }

        self.next_token()?;
        list.push(self.parse_expression(Precedence::Lowest)?);

        while self.peek_is(&TokenKind::Comma) {
            self.next_token()?;
            self.next_token()?;
            list.push(self.parse_expression(Precedence::Lowest)?);
        }

        self.expect_peek(end)?;
        Ok(list)
    }
}
