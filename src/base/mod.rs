//! Foundation types for the yangcore crate.
//!
//! This module provides fundamental types used throughout the library:
//! - [`QualName`] - Qualified names `(local, module)`
//! - [`ModuleId`] - Module identifiers `(name, revision)`
//! - [`ContentType`], [`Status`], [`DefaultDeny`] - Schema node classifications
//! - [`SchemaRoute`] - Routes through the schema tree
//! - Instance-name helpers (RFC 7951 member naming)
//!
//! This module has NO dependencies on other yangcore modules.

mod name;
mod route;

pub use name::{
    make_instance_name, split_instance_name, InstanceName, ModuleId, QualName,
};
pub use route::{data_path, SchemaRoute};

use std::fmt;
use std::str::FromStr;

/// Classification of schema content: configuration, state data, or both.
///
/// Governs which subtrees participate in validation and default insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    /// Configuration data only (`config true`).
    Config,
    /// State data only (`config false`).
    Nonconfig,
    /// Both configuration and state data.
    #[default]
    All,
}

impl ContentType {
    /// Does this content type admit nodes with the given content type?
    pub fn admits(self, other: ContentType) -> bool {
        match (self, other) {
            (ContentType::All, _) | (_, ContentType::All) => true,
            (a, b) => a == b,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Config => "config",
            ContentType::Nonconfig => "nonconfig",
            ContentType::All => "all",
        }
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "config" => Ok(ContentType::Config),
            "nonconfig" => Ok(ContentType::Nonconfig),
            "all" => Ok(ContentType::All),
            other => Err(format!("unknown content type: {other}")),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Definition lifecycle status (`status` statement).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Current,
    Deprecated,
    Obsolete,
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(Status::Current),
            "deprecated" => Ok(Status::Deprecated),
            "obsolete" => Ok(Status::Obsolete),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// NACM extension classification for data nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefaultDeny {
    #[default]
    None,
    Write,
    All,
}
