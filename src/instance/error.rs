//! Instance-layer error types.

use thiserror::Error;

/// Errors crossing the raw→cooked boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RawError {
    /// A member name the schema does not allow.
    #[error("{path}: undefined member {member}")]
    MemberError { path: String, member: String },

    /// A scalar that does not parse under the schema node's type.
    #[error("{path}: {message}")]
    TypeError { path: String, message: String },
}

/// Errors from zipper navigation and editing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZipperError {
    /// The addressed instance does not exist.
    #[error("{path}: nonexistent instance: {detail}")]
    NonexistentInstance { path: String, detail: String },

    /// The focused value has the wrong structure for the operation.
    #[error("{path}: {detail}")]
    InstanceValueError { path: String, detail: String },

    /// The schema does not define the addressed member.
    #[error("{path}: schema does not allow member {member}")]
    NonexistentSchemaNode { path: String, member: String },

    /// The operation applies only to data nodes.
    #[error("{path}: not a data node")]
    NonDataNode { path: String },
}
