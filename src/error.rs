//! Crate-wide error types.
//!
//! Each layer owns its error enum (parser, registry, xpath, instance,
//! validation); this module adds the schema-build errors shared between
//! type construction and the tree builder, plus the top-level [`Error`]
//! that the public API surfaces. Errors are propagated to the caller;
//! nothing is recovered locally.

use thiserror::Error;

use crate::instance::{RawError, ZipperError};
use crate::parser::ParseError;
use crate::registry::RegistryError;
use crate::validation::ValidationError;
use crate::xpath::XPathError;

/// Errors raised while compiling statements into the schema tree.
#[derive(Debug, Error)]
pub enum SchemaBuildError {
    /// A schema path (augment/deviation/refine target, leafref path) does
    /// not name an existing schema node.
    #[error("nonexistent schema node: {0}")]
    NonexistentSchemaNode(String),

    /// The named node exists but has the wrong kind for the operation.
    #[error("bad schema node type: {node} is not {expected}")]
    BadSchemaNodeType {
        node: String,
        expected: &'static str,
    },

    /// A leafref `path` cannot be resolved to a leaf data node.
    #[error("invalid leafref path: {0}")]
    InvalidLeafrefPath(String),

    /// An illegal restriction on a derived type (widening a range,
    /// unknown enum member, missing fraction-digits, ...).
    #[error("invalid type restriction: {0}")]
    InvalidTypeRestriction(String),

    /// Circular `uses` or `typedef` chain.
    #[error("circular definition: {0}")]
    CircularDefinition(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    XPath(#[from] XPathError),
}

/// Top-level error for the public API.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    SchemaBuild(#[from] SchemaBuildError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    XPath(#[from] XPathError),

    #[error(transparent)]
    Zipper(#[from] ZipperError),

    #[error(transparent)]
    Raw(#[from] RawError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid yang-library data: {0}")]
    BadYangLibrary(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// A convenience wrapper around `Result` for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
