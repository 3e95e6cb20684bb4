//! Module-registry error types.

use thiserror::Error;

use crate::parser::ParseError;

/// Errors raised while registering modules or resolving names.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No `name[@revision].yang` file found in the search directories.
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// The same module is listed as implemented in more than one revision.
    #[error("multiple implemented revisions of module {0}")]
    MultipleImplementedRevisions(String),

    /// The module-import graph contains a cycle.
    #[error("cyclic imports involving module {0}")]
    CyclicImports(String),

    /// A prefix does not appear in the context module's prefix map.
    #[error("unknown prefix: {0}")]
    UnknownPrefix(String),

    /// A supported feature depends on a feature the manifest does not
    /// support.
    #[error("feature {feature} requires unsupported prerequisite")]
    FeaturePrerequisiteError { feature: String },

    /// Malformed `if-feature` boolean expression.
    #[error("invalid feature expression: {0}")]
    InvalidFeatureExpression(String),

    /// No grouping/typedef with the referenced name is in scope.
    #[error("{kind} not found: {name}")]
    DefinitionNotFound { kind: &'static str, name: String },

    /// A submodule's `belongs-to` disagrees with the manifest.
    #[error("submodule {submodule} does not belong to {module}")]
    BadSubmodule { submodule: String, module: String },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}
