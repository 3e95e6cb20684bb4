//! Statement parser error types.

use thiserror::Error;

/// Errors produced while parsing YANG compact syntax.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Input ended before the statement was complete.
    #[error("unexpected end of input at offset {0}")]
    EndOfInput(usize),

    /// A token other than the expected one was found.
    #[error("unexpected input at offset {offset}: expected {expected}")]
    UnexpectedInput { offset: usize, expected: &'static str },

    /// Malformed identifier, unterminated string or comment, bad escape.
    #[error("invalid statement at offset {offset}: {message}")]
    InvalidStatement { offset: usize, message: String },

    /// The top-level statement names a different module.
    #[error("module name mismatch: expected {expected}, found {found}")]
    ModuleNameMismatch { expected: String, found: String },

    /// The most recent revision disagrees with the expected one.
    #[error("module revision mismatch: expected {expected}, found {found}")]
    ModuleRevisionMismatch { expected: String, found: String },
}

impl ParseError {
    pub fn invalid(offset: usize, message: impl Into<String>) -> Self {
        Self::InvalidStatement {
            offset,
            message: message.into(),
        }
    }
}
