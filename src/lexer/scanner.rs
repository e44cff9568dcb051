//! Hand-written scanner producing tokens on demand.

use std::iter::Peekable;
use std::str::CharIndices;

use crate::error::LexerError;
use crate::span::Span;

use super::token::{Token, TokenKind};

/// The Spike lexer. Tokens are produced lazily, one `next_token` call at a
/// time; the parser drives it through its one-token look-ahead.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    /// Byte offset of the next unconsumed character.
    offset: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Produce the next token, or an error for malformed input. Returns an
    /// `Eof` token forever once the source is exhausted.
    pub fn next_token(&mut self) -> Result<Token, LexerError> {
        self.skip_whitespace();

        let start = self.offset;
        let line = self.line;
        let column = self.column;

        let c = match self.advance() {
            Some(c) => c,
            None => return Ok(Token::eof(start, line, column)),
        };

        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semicolon,
            '=' => {
                if self.match_char('=') {
                    TokenKind::EqualEqual
                } else {
                    TokenKind::Equal
                }
            }
            '!' => {
                if self.match_char('=') {
                    TokenKind::BangEqual
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if self.match_char('=') {
                    TokenKind::LessEqual
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.match_char('=') {
                    TokenKind::GreaterEqual
                } else {
                    TokenKind::Greater
                }
            }
            '&' => {
                if self.match_char('&') {
                    TokenKind::And
                } else {
                    TokenKind::Illegal('&')
                }
            }
            '|' => {
                if self.match_char('|') {
                    TokenKind::Or
                } else {
                    TokenKind::Illegal('|')
                }
            }
            '"' => self.string(start, line, column)?,
            c if c.is_ascii_digit() => self.number(start, line, column)?,
            c if c.is_alphabetic() || c == '_' => self.identifier(start),
            c => TokenKind::Illegal(c),
        };

        Ok(Token::new(kind, Span::new(start, self.offset, line, column)))
    }

    fn string(
        &mut self,
        start: usize,
        line: usize,
        column: usize,
    ) -> Result<TokenKind, LexerError> {
        let mut value = String::new();

        loop {
            match self.advance() {
                None => {
                    return Err(LexerError::UnterminatedString(Span::new(
                        start,
                        self.offset,
                        line,
                        column,
                    )))
                }
                Some('"') => break,
                Some('\\') => {
                    let escape_line = self.line;
                    let escape_column = self.column;
                    match self.advance() {
                        Some('n') => value.push('\n'),
                        Some('t') => value.push('\t'),
                        Some('r') => value.push('\r'),
                        Some('\\') => value.push('\\'),
                        Some('"') => value.push('"'),
                        Some(other) => {
                            return Err(LexerError::InvalidEscape(
                                other,
                                Span::new(start, self.offset, escape_line, escape_column),
                            ))
                        }
                        None => {
                            return Err(LexerError::UnterminatedString(Span::new(
                                start,
                                self.offset,
                                line,
                                column,
                            )))
                        }
                    }
                }
                Some(c) => value.push(c),
            }
        }

        Ok(TokenKind::StringLiteral(value))
    }

    fn number(
        &mut self,
        start: usize,
        line: usize,
        column: usize,
    ) -> Result<TokenKind, LexerError> {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        let text = &self.source[start..self.offset];
        let value = text.parse::<i64>().map_err(|_| {
            LexerError::InvalidNumber(
                text.to_string(),
                Span::new(start, self.offset, line, column),
            )
        })?;

        Ok(TokenKind::IntLiteral(value))
    }

    fn identifier(&mut self, start: usize) -> TokenKind {
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.advance();
        }

        let text = &self.source[start..self.offset];
        TokenKind::keyword(text).unwrap_or_else(|| TokenKind::Identifier(text.to_string()))
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
    }

    fn advance(&mut self) -> Option<char> {
        let (idx, c) = self.chars.next()?;
        self.offset = idx + c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }
}
