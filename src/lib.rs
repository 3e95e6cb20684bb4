//! # yangcore
//!
//! Core library for YANG data model parsing, schema compilation, and JSON
//! instance validation.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! model      → DataModel: registry + schema tree, public entry point
//!   ↓
//! validation → schema and semantic checks over instance trees
//!   ↓
//! schema     → compiled schema tree, uses/augment/deviation expansion
//!   ↓
//! xpath      → XPath 1.0 + YANG 1.1 parser and evaluator
//!   ↓
//! instance   → cooked values, persistent zipper, instance routes
//!   ↓
//! types      → built-in and derived types, raw↔cooked conversion
//!   ↓
//! registry   → module registry, prefixes, features, identities
//!   ↓
//! library    → YANG-library manifests (RFC 7895 / RFC 8525)
//!   ↓
//! parser     → logos lexer, recursive-descent statement parser
//!   ↓
//! base       → primitives (QualName, ModuleId, routes)
//! ```

// ============================================================================
// MODULES (dependency order: base → parser → ... → model)
// ============================================================================

/// Foundation types: qualified names, module identifiers, routes
pub mod base;

/// Parser: logos lexer and recursive-descent YANG statement parser
pub mod parser;

/// YANG-library manifests and the module-set identifier
pub mod library;

/// Module registry: staging, prefixes, imports, features, identities
pub mod registry;

/// Type system: built-in and derived types with restrictions
pub mod types;

/// Instance layer: cooked values, persistent zipper, instance routes
pub mod instance;

/// XPath 1.0 subsystem with YANG 1.1 extensions
pub mod xpath;

/// Compiled schema tree and its builder
pub mod schema;

/// Validation engine: scopes, content types, error tags
pub mod validation;

/// The data model entry point
pub mod model;

/// Crate-wide error types
pub mod error;

// Re-export commonly needed items
pub use base::{ContentType, ModuleId, QualName};
pub use error::{Error, Result};
pub use instance::{Focus, InstanceRoute, Value};
pub use library::YangLibrary;
pub use model::DataModel;
pub use schema::TreeOptions;
pub use validation::{ValidationError, ValidationScope};
