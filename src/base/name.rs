//! Qualified names, module identifiers, and instance member names.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A qualified name: a local name paired with the name of its defining module.
///
/// Module names (not namespace URIs) are the canonical namespace keys. All
/// named schema entities (schema nodes, identities, features, types,
/// groupings) are identified by qualified names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualName {
    pub name: SmolStr,
    pub module: SmolStr,
}

impl QualName {
    pub fn new(name: impl Into<SmolStr>, module: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
        }
    }

    /// Parse the `[module:]local` form used by identityref values and
    /// instance member names. An unprefixed name falls back to
    /// `default_module`.
    pub fn parse(text: &str, default_module: &str) -> Self {
        match text.split_once(':') {
            Some((module, local)) => Self::new(local, module),
            None => Self::new(text, default_module),
        }
    }
}

impl fmt::Display for QualName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.name)
    }
}

/// A module identifier: a module name plus a revision date (`YYYY-MM-DD`)
/// or the empty string when the revision is unspecified.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId {
    pub name: SmolStr,
    pub revision: SmolStr,
}

impl ModuleId {
    pub fn new(name: impl Into<SmolStr>, revision: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            revision: revision.into(),
        }
    }

    /// The `name[@revision].yang` file name this module is expected
    /// to be stored under.
    pub fn file_name(&self) -> String {
        if self.revision.is_empty() {
            format!("{}.yang", self.name)
        } else {
            format!("{}@{}.yang", self.name, self.revision)
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.revision.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}@{}", self.name, self.revision)
        }
    }
}

/// A JSON member name for a data-tree node: `"<local>"` or
/// `"<module>:<local>"`.
///
/// The prefixed form is required when (a) the node is a top-level data node,
/// or (b) its defining module differs from the module of its parent node in
/// the data tree.
pub type InstanceName = SmolStr;

/// Split an instance name into its optional module prefix and local part.
pub fn split_instance_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((module, local)) => (Some(module), local),
        None => (None, name),
    }
}

/// Build the instance name for a node defined in `module`, appearing under
/// a parent whose namespace is `parent_module` (`None` at the top level).
pub fn make_instance_name(local: &str, module: &str, parent_module: Option<&str>) -> InstanceName {
    match parent_module {
        Some(parent) if parent == module => SmolStr::new(local),
        _ => SmolStr::new(format!("{module}:{local}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qual_name_parse() {
        assert_eq!(
            QualName::parse("ex:foo", "other"),
            QualName::new("foo", "ex")
        );
        assert_eq!(QualName::parse("foo", "ex"), QualName::new("foo", "ex"));
    }

    #[test]
    fn module_file_name() {
        assert_eq!(
            ModuleId::new("example-1", "2020-01-01").file_name(),
            "example-1@2020-01-01.yang"
        );
        assert_eq!(ModuleId::new("example-1", "").file_name(), "example-1.yang");
    }

    #[test]
    fn instance_names() {
        assert_eq!(make_instance_name("greeting", "example-1", None), "example-1:greeting");
        assert_eq!(
            make_instance_name("bar", "example-2", Some("example-2")),
            "bar"
        );
        assert_eq!(
            make_instance_name("aug", "other", Some("example-2")),
            "other:aug"
        );
        assert_eq!(split_instance_name("ex:foo"), (Some("ex"), "foo"));
        assert_eq!(split_instance_name("foo"), (None, "foo"));
    }
}
