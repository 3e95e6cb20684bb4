//! The data model: module registry plus compiled schema tree.
//!
//! A [`DataModel`] is an ordinary owned value; multiple independent data
//! models can coexist in one process. Configuration happens through
//! constructor arguments, never global state. After construction the
//! model is immutable and can be shared freely.

use std::path::PathBuf;
use std::sync::Arc;

use smol_str::SmolStr;
use tracing::debug;

use crate::base::ContentType;
use crate::error::{Error, Result};
use crate::instance::route::percent_decode;
use crate::instance::{Focus, InstanceRoute, RouteStep, Value};
use crate::library::YangLibrary;
use crate::parser::ParseError;
use crate::registry::ModuleRegistry;
use crate::schema::{self, SchemaKind, SchemaTree, TreeOptions};
use crate::validation::{self, ValidationScope};

/// Registry and schema tree shared by every focus of the model.
#[derive(Debug)]
pub struct ModelInner {
    pub registry: ModuleRegistry,
    pub schema: SchemaTree,
}

/// A compiled YANG data model.
#[derive(Debug, Clone)]
pub struct DataModel {
    inner: Arc<ModelInner>,
    library: YangLibrary,
}

impl DataModel {
    /// Build a data model from a parsed YANG-library manifest, loading
    /// modules from the search directories.
    pub fn from_library(library: YangLibrary, search_dirs: &[PathBuf]) -> Result<Self> {
        let registry = ModuleRegistry::register_modules(&library, search_dirs)?;
        let schema = schema::build_schema(&registry)?;
        debug!(nodes = schema.len(), "data model built");
        Ok(Self {
            inner: Arc::new(ModelInner { registry, schema }),
            library,
        })
    }

    /// Build from YANG-library JSON text; both the RFC 7895 and RFC 8525
    /// forms are accepted.
    pub fn from_library_str(text: &str, search_dirs: &[PathBuf]) -> Result<Self> {
        let library = if text.contains("ietf-yang-library:yang-library") {
            YangLibrary::from_8525(text, None).map_err(Error::BadYangLibrary)?
        } else {
            YangLibrary::from_str(text)?
        };
        Self::from_library(library, search_dirs)
    }

    /// Build from a YANG-library file.
    pub fn from_file(path: impl Into<PathBuf>, search_dirs: &[PathBuf]) -> Result<Self> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_library_str(&text, search_dirs)
    }

    pub fn library(&self) -> &YangLibrary {
        &self.library
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.inner.registry
    }

    pub fn schema(&self) -> &SchemaTree {
        &self.inner.schema
    }

    /// SHA-1 module-set identifier over the manifest's (sub)modules.
    pub fn module_set_id(&self) -> String {
        self.library.module_set_id()
    }

    // ===== instances =====

    /// Cook a raw (JSON-parsed) instance document into a root focus.
    pub fn from_raw(&self, raw: &serde_json::Value) -> Result<Focus> {
        let value =
            self.inner
                .schema
                .from_raw(&self.inner.registry, self.inner.schema.root(), raw)?;
        Ok(Focus::new_root(self.inner.clone(), value))
    }

    /// Cook an instance document from JSON text.
    pub fn from_raw_str(&self, text: &str) -> Result<Focus> {
        let raw: serde_json::Value = serde_json::from_str(text)?;
        self.from_raw(&raw)
    }

    /// Emit the RFC 7951 encoding of the subtree at `focus`.
    pub fn to_raw(&self, focus: &Focus) -> Result<serde_json::Value> {
        Ok(self.inner.schema.to_raw(focus.schema(), focus.value())?)
    }

    /// Validate a focus's subtree. Subtree validation behaves identically
    /// to a root validation starting from the same schema node.
    pub fn validate(
        &self,
        focus: &Focus,
        scope: ValidationScope,
        content: ContentType,
    ) -> std::result::Result<(), validation::ValidationError> {
        validation::validate(focus, scope, content)
    }

    // ===== schema output =====

    pub fn ascii_tree(&self, options: TreeOptions) -> String {
        schema::ascii_tree(&self.inner.schema, options)
    }

    pub fn schema_digest(&self) -> serde_json::Value {
        schema::schema_digest(&self.inner.schema)
    }

    // ===== route parsing =====

    /// Parse an instance identifier (RFC 7951 §6.11).
    pub fn parse_instance_id(&self, text: &str) -> Result<InstanceRoute> {
        Ok(crate::instance::parse_instance_id(text)?)
    }

    /// Parse a RESTCONF api-path (RFC 8040 §3.5.3, extended: the final
    /// component may name a whole list or leaf-list with no keys).
    pub fn parse_resource_id(&self, text: &str) -> Result<InstanceRoute> {
        let mut route = InstanceRoute::default();
        let mut schema_id = self.inner.schema.root();
        let trimmed = text.strip_prefix('/').unwrap_or(text);
        if trimmed.is_empty() {
            return Ok(route);
        }
        let mut default_module: Option<SmolStr> = None;
        for segment in trimmed.split('/') {
            let (identifier, values) = match segment.split_once('=') {
                Some((identifier, values)) => (identifier, Some(values)),
                None => (segment, None),
            };
            let (module, local) = match identifier.split_once(':') {
                Some((module, local)) => (Some(SmolStr::new(module)), local),
                None => (default_module.clone(), identifier),
            };
            let Some(module) = module else {
                return Err(ParseError::invalid(0, format!("unprefixed first component: {local}"))
                    .into());
            };
            let child = self
                .inner
                .schema
                .data_child(schema_id, local, &module)
                .ok_or_else(|| {
                    ParseError::invalid(0, format!("unknown resource component: {segment}"))
                })?;
            route.push(RouteStep::MemberName {
                name: SmolStr::new(local),
                module: Some(module.clone()),
            });
            let node = self.inner.schema.node(child);
            match (&node.kind, values) {
                (SchemaKind::List(spec), Some(values)) => {
                    // Key values map positionally onto the list's keys.
                    let values: Vec<&str> = values.split(',').collect();
                    if values.len() != spec.keys.len() {
                        return Err(ParseError::invalid(
                            0,
                            format!("expected {} key values for {local}", spec.keys.len()),
                        )
                        .into());
                    }
                    let mut keys = Vec::with_capacity(values.len());
                    for (key, value) in spec.keys.iter().zip(values) {
                        keys.push((
                            key.name.clone(),
                            Value::String(percent_decode(value)?),
                        ));
                    }
                    route.push(RouteStep::EntryKeys(keys));
                }
                (SchemaKind::LeafList(_), Some(value)) => {
                    route.push(RouteStep::EntryValue(Value::String(percent_decode(
                        value,
                    )?)));
                }
                (_, Some(_)) => {
                    return Err(ParseError::invalid(
                        0,
                        format!("{local} does not take key values"),
                    )
                    .into())
                }
                // A final list/leaf-list component with no keys addresses
                // the entire array.
                (_, None) => {}
            }
            default_module = Some(node.module.clone());
            schema_id = child;
        }
        Ok(route)
    }
}
