//! XPath error types.

use thiserror::Error;

/// Errors from XPath parsing and evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum XPathError {
    #[error("invalid XPath expression: {0}")]
    InvalidXPath(String),

    #[error("unexpected end of XPath expression")]
    EndOfInput,

    /// A construct outside the supported XPath subset (`preceding::`,
    /// `namespace::`, `id()`, `lang()`, variables at evaluation time).
    #[error("not supported: {0}")]
    NotSupported(String),

    /// An operation with no defined coercion, e.g. `deref()` on a
    /// non-leafref leaf.
    #[error("XPath type error: {0}")]
    TypeError(String),

    #[error("unknown prefix in XPath expression: {0}")]
    UnknownPrefix(String),
}
