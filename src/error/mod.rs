//! Error types for all pipeline phases.

use crate::span::Span;
use thiserror::Error;

/// Lexer errors.
#[derive(Debug, Error)]
pub enum LexerError {
    #[error("Unterminated string at {0}")]
    UnterminatedString(Span),

    #[error("Invalid escape sequence '\\{0}' at {1}")]
    InvalidEscape(char, Span),

    #[error("Invalid number '{0}' at {1}")]
    InvalidNumber(String, Span),
}

impl LexerError {
    pub fn span(&self) -> Span {
        match self {
            Self::UnterminatedString(span) => *span,
            Self::InvalidEscape(_, span) => *span,
            Self::InvalidNumber(_, span) => *span,
        }
    }
}

/// Parser errors.
#[derive(Debug, Error)]
pub enum ParserError {
    /// A token with no prefix parse rule appeared in expression position.
    #[error("\"{kind}\" is not a valid prefix expression")]
    InvalidPrefix { kind: String, span: Span },

    #[error("Unexpected token '{found}', expected {expected} at {span}")]
    UnexpectedToken {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("{message} at {span}")]
    General { message: String, span: Span },
}

impl ParserError {
    pub fn invalid_prefix(kind: impl Into<String>, span: Span) -> Self {
        Self::InvalidPrefix {
            kind: kind.into(),
            span,
        }
    }

    pub fn unexpected_token(
        expected: impl Into<String>,
        found: impl Into<String>,
        span: Span,
    ) -> Self {
        Self::UnexpectedToken {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::InvalidPrefix { span, .. } => *span,
            Self::UnexpectedToken { span, .. } => *span,
            Self::General { span, .. } => *span,
        }
    }
}

impl From<LexerError> for ParserError {
    fn from(err: LexerError) -> Self {
        Self::General {
            message: err.to_string(),
            span: err.span(),
        }
    }
}

/// Bytecode compilation errors.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("unable to resolve identifier: {name}")]
    UnresolvedIdentifier { name: String, span: Span },

    #[error("{message}")]
    General { message: String, span: Span },
}

impl CompileError {
    pub fn unresolved_identifier(name: impl Into<String>, span: Span) -> Self {
        Self::UnresolvedIdentifier {
            name: name.into(),
            span,
        }
    }

    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self::General {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Self::UnresolvedIdentifier { span, .. } => *span,
            Self::General { span, .. } => *span,
        }
    }
}

/// Runtime errors raised by the virtual machine. Bytecode carries no source
/// positions, so these are position-free single-line messages.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("unsupported types for binary operation: {left} {right}")]
    UnsupportedBinaryOperands {
        left: &'static str,
        right: &'static str,
    },

    #[error("both operands must have same type, had: {left} and {right}")]
    ComparisonTypeMismatch {
        left: &'static str,
        right: &'static str,
    },

    #[error("wrong number of arguments: expected {expected}, got {got}")]
    WrongArity { expected: usize, got: usize },

    #[error("cannot call non-function")]
    NotCallable,

    #[error("stack overflow")]
    StackOverflow,

    #[error("division by zero")]
    DivisionByZero,

    #[error("unsupported type for negation: {0}")]
    UnsupportedNegation(&'static str),

    #[error("unusable as hash key: {0}")]
    UnusableHashKey(&'static str),

    #[error("index operator not supported: {0}")]
    UnsupportedIndex(&'static str),

    #[error("{0}")]
    General(String),
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::General(message.into())
    }

    pub fn wrong_arity(expected: usize, got: usize) -> Self {
        Self::WrongArity { expected, got }
    }
}

/// A unified error type for all phases.
#[derive(Debug, Error)]
pub enum SpikeError {
    #[error("Lexer error: {0}")]
    Lexer(#[from] LexerError),

    #[error("Parser error: {0}")]
    Parser(#[from] ParserError),

    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_prefix_message() {
        let err = ParserError::invalid_prefix("let", Span::default());
        assert_eq!(err.to_string(), "\"let\" is not a valid prefix expression");
    }

    #[test]
    fn test_runtime_messages() {
        assert_eq!(
            RuntimeError::UnsupportedBinaryOperands {
                left: "Integer",
                right: "Boolean",
            }
            .to_string(),
            "unsupported types for binary operation: Integer Boolean"
        );
        assert_eq!(
            RuntimeError::wrong_arity(2, 1).to_string(),
            "wrong number of arguments: expected 2, got 1"
        );
        assert_eq!(RuntimeError::StackOverflow.to_string(), "stack overflow");
    }

    #[test]
    fn test_compile_error_message() {
        let err = CompileError::unresolved_identifier("foo", Span::default());
        assert_eq!(err.to_string(), "unable to resolve identifier: foo");
    }
}
