//! The compiled schema tree.
//!
//! Schema nodes live in an arena owned by [`SchemaTree`]; parents are
//! referenced by index, so the parent back-pointers are acyclic. The tree
//! is immutable after [`build`](crate::schema::build_schema) completes;
//! validation counters use atomics so a shared tree can count visits.

mod builder;
mod print;

pub use builder::build_schema;
pub use print::{ascii_tree, schema_digest, TreeOptions};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use smol_str::SmolStr;

use crate::base::{
    make_instance_name, split_instance_name, ContentType, DefaultDeny, InstanceName, QualName,
    SchemaRoute, Status,
};
use crate::instance::{RawError, Value};
use crate::registry::ModuleRegistry;
use crate::types::DataType;
use crate::xpath::CompiledExpr;

/// Index of a schema node within the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaId(u32);

impl SchemaId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One `must` constraint: the parsed expression plus optional custom error
/// reporting from `error-app-tag`/`error-message`.
#[derive(Debug, Clone)]
pub struct MustConstraint {
    pub expr: Arc<CompiledExpr>,
    pub error_tag: Option<String>,
    pub error_message: Option<String>,
}

/// Variant-specific payload of a schema node.
#[derive(Debug)]
pub enum SchemaKind {
    /// Distinguished internal group at the root of a schema sub-tree.
    SchemaRoot,
    /// Anonymous group arising from a conditional `uses`/`augment`.
    Group,
    Container {
        presence: bool,
    },
    List(ListSpec),
    LeafList(LeafListSpec),
    Leaf(LeafSpec),
    Choice {
        default_case: Option<SmolStr>,
        mandatory: bool,
    },
    Case,
    Anydata,
    Anyxml,
    RpcAction,
    Input,
    Output,
    Notification,
}

#[derive(Debug)]
pub struct ListSpec {
    /// Key leaf names, in the order given by the `key` statement.
    pub keys: Vec<QualName>,
    /// `unique` constraint groups, each a list of descendant schema routes.
    pub unique: Vec<Vec<SchemaRoute>>,
    pub min_elements: u64,
    pub max_elements: Option<u64>,
    pub user_ordered: bool,
}

#[derive(Debug)]
pub struct LeafListSpec {
    pub data_type: DataType,
    pub defaults: Vec<Value>,
    pub min_elements: u64,
    pub max_elements: Option<u64>,
    pub user_ordered: bool,
}

#[derive(Debug)]
pub struct LeafSpec {
    pub data_type: DataType,
    pub default: Option<Value>,
    pub mandatory: bool,
}

/// A node of the compiled schema tree.
#[derive(Debug)]
pub struct SchemaNode {
    pub name: SmolStr,
    /// Namespace: the defining (main) module's name.
    pub module: SmolStr,
    /// Non-owning parent reference; the arena owns nodes in topological
    /// order.
    pub parent: Option<SchemaId>,
    pub children: Vec<SchemaId>,
    pub when: Option<Arc<CompiledExpr>>,
    pub musts: Vec<MustConstraint>,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub status: Status,
    pub content: ContentType,
    pub default_deny: DefaultDeny,
    /// Incremented on every validation visit; drives coverage reporting.
    pub val_count: AtomicU64,
    pub kind: SchemaKind,
}

impl SchemaNode {
    pub fn qual_name(&self) -> QualName {
        QualName::new(self.name.clone(), self.module.clone())
    }

    /// Data nodes can appear in instance documents; Choice/Case/Group and
    /// the root are transparent.
    pub fn is_data_node(&self) -> bool {
        !matches!(
            self.kind,
            SchemaKind::SchemaRoot | SchemaKind::Group | SchemaKind::Choice { .. } | SchemaKind::Case
        )
    }

    pub fn data_type(&self) -> Option<&DataType> {
        match &self.kind {
            SchemaKind::Leaf(spec) => Some(&spec.data_type),
            SchemaKind::LeafList(spec) => Some(&spec.data_type),
            _ => None,
        }
    }

    /// Is an instance of this node an array of entries?
    pub fn is_array_node(&self) -> bool {
        matches!(self.kind, SchemaKind::List(_) | SchemaKind::LeafList(_))
    }

    pub fn bump_val_count(&self) {
        self.val_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn val_count(&self) -> u64 {
        self.val_count.load(Ordering::Relaxed)
    }
}

/// Arena-backed schema tree.
#[derive(Debug)]
pub struct SchemaTree {
    nodes: Vec<SchemaNode>,
    root: SchemaId,
}

impl SchemaTree {
    pub(crate) fn new() -> Self {
        let root = SchemaNode {
            name: SmolStr::new(""),
            module: SmolStr::new(""),
            parent: None,
            children: Vec::new(),
            when: None,
            musts: Vec::new(),
            description: None,
            reference: None,
            status: Status::Current,
            content: ContentType::All,
            default_deny: DefaultDeny::None,
            val_count: AtomicU64::new(0),
            kind: SchemaKind::SchemaRoot,
        };
        Self {
            nodes: vec![root],
            root: SchemaId::new(0),
        }
    }

    pub fn root(&self) -> SchemaId {
        self.root
    }

    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: SchemaId) -> &mut SchemaNode {
        &mut self.nodes[id.index()]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = SchemaId> {
        (0..self.nodes.len()).map(SchemaId::new)
    }

    pub(crate) fn alloc(&mut self, node: SchemaNode) -> SchemaId {
        let id = SchemaId::new(self.nodes.len());
        if let Some(parent) = node.parent {
            self.nodes[parent.index()].children.push(id);
        }
        self.nodes.push(node);
        id
    }

    pub(crate) fn detach(&mut self, id: SchemaId) {
        if let Some(parent) = self.node(id).parent {
            self.nodes[parent.index()].children.retain(|&c| c != id);
        }
    }

    // ===== navigation =====

    /// Direct data children, looking through Choice/Case/Group nodes.
    pub fn data_children(&self, id: SchemaId) -> Vec<SchemaId> {
        let mut out = Vec::new();
        self.collect_data_children(id, &mut out);
        out
    }

    fn collect_data_children(&self, id: SchemaId, out: &mut Vec<SchemaId>) {
        for &child in &self.node(id).children {
            if self.node(child).is_data_node() {
                out.push(child);
            } else {
                self.collect_data_children(child, out);
            }
        }
    }

    /// Data-child lookup by qualified name; skips intermediate
    /// Choice/Case/Group nodes.
    pub fn data_child(&self, id: SchemaId, name: &str, module: &str) -> Option<SchemaId> {
        for &child in &self.node(id).children {
            let node = self.node(child);
            if node.is_data_node() {
                if node.name == name && node.module == module {
                    return Some(child);
                }
            } else if let Some(found) = self.data_child(child, name, module) {
                return Some(found);
            }
        }
        None
    }

    /// Any direct schema child (including Choice/Case) by qualified name;
    /// Group nodes stay transparent.
    pub fn schema_child(&self, id: SchemaId, name: &str, module: &str) -> Option<SchemaId> {
        for &child in &self.node(id).children {
            let node = self.node(child);
            if matches!(node.kind, SchemaKind::Group) {
                if let Some(found) = self.schema_child(child, name, module) {
                    return Some(found);
                }
            } else if node.name == name && node.module == module {
                return Some(child);
            }
        }
        None
    }

    /// Nearest ancestor that is a data node; `None` directly under the
    /// root.
    pub fn data_parent(&self, id: SchemaId) -> Option<SchemaId> {
        let mut current = self.node(id).parent;
        while let Some(parent) = current {
            let node = self.node(parent);
            if matches!(node.kind, SchemaKind::SchemaRoot) {
                return None;
            }
            if node.is_data_node() {
                return Some(parent);
            }
            current = node.parent;
        }
        None
    }

    /// Resolve a member's instance name against this node's data children.
    ///
    /// The prefix form is required at the top level and at namespace
    /// boundaries; the bare form is accepted only within the parent's
    /// namespace.
    pub fn child_by_instance_name(&self, id: SchemaId, name: &str) -> Option<SchemaId> {
        let (module, local) = split_instance_name(name);
        match module {
            Some(module) => self.data_child(id, local, module),
            None => {
                let parent_module = self.node(id).module.clone();
                if parent_module.is_empty() {
                    // Top-level members must be prefixed.
                    None
                } else {
                    self.data_child(id, local, &parent_module)
                }
            }
        }
    }

    /// The JSON member name for `id` under its data parent.
    pub fn instance_name(&self, id: SchemaId) -> InstanceName {
        let node = self.node(id);
        let parent_module = self
            .data_parent(id)
            .map(|parent| self.node(parent).module.clone());
        make_instance_name(&node.name, &node.module, parent_module.as_deref())
    }

    /// Schema route from the root (data nodes only).
    pub fn data_route(&self, id: SchemaId) -> SchemaRoute {
        let mut route = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let node = self.node(id);
            if matches!(node.kind, SchemaKind::SchemaRoot) {
                break;
            }
            if node.is_data_node() {
                route.push(node.qual_name());
            }
            current = node.parent;
        }
        route.reverse();
        route
    }

    /// Textual data path (`/module:name/...`) for diagnostics.
    pub fn data_path(&self, id: SchemaId) -> String {
        crate::base::data_path(&self.data_route(id))
    }

    /// Walk a data route of qualified names from `id`.
    pub fn descendant(&self, id: SchemaId, route: &[QualName]) -> Option<SchemaId> {
        let mut current = id;
        for qn in route {
            current = self.data_child(current, &qn.name, &qn.module)?;
        }
        Some(current)
    }

    // ===== raw → cooked =====

    /// Cook a raw (JSON-parsed) instance document rooted at `id`.
    ///
    /// Member names are checked against the schema; unknown members are
    /// `RawError::MemberError`, scalar conversion failures are
    /// `RawError::TypeError`.
    pub fn from_raw(
        &self,
        registry: &ModuleRegistry,
        id: SchemaId,
        raw: &serde_json::Value,
    ) -> Result<Value, RawError> {
        let node = self.node(id);
        match &node.kind {
            SchemaKind::SchemaRoot
            | SchemaKind::Group
            | SchemaKind::Container { .. }
            | SchemaKind::Input
            | SchemaKind::Output
            | SchemaKind::RpcAction
            | SchemaKind::Notification
            | SchemaKind::Case
            | SchemaKind::Choice { .. } => {
                let serde_json::Value::Object(members) = raw else {
                    return Err(RawError::TypeError {
                        path: self.data_path(id),
                        message: "expected object".to_string(),
                    });
                };
                let mut cooked = IndexMap::new();
                for (name, value) in members {
                    let child = self.child_by_instance_name(id, name).ok_or_else(|| {
                        RawError::MemberError {
                            path: self.data_path(id),
                            member: name.clone(),
                        }
                    })?;
                    cooked.insert(SmolStr::new(name), self.from_raw(registry, child, value)?);
                }
                Ok(Value::object(cooked))
            }
            SchemaKind::List(_) => {
                let serde_json::Value::Array(entries) = raw else {
                    return Err(RawError::TypeError {
                        path: self.data_path(id),
                        message: "expected array of list entries".to_string(),
                    });
                };
                let mut cooked = Vec::with_capacity(entries.len());
                for entry in entries {
                    let serde_json::Value::Object(members) = entry else {
                        return Err(RawError::TypeError {
                            path: self.data_path(id),
                            message: "list entry must be an object".to_string(),
                        });
                    };
                    let mut object = IndexMap::new();
                    for (name, value) in members {
                        let child = self.child_by_instance_name(id, name).ok_or_else(|| {
                            RawError::MemberError {
                                path: self.data_path(id),
                                member: name.clone(),
                            }
                        })?;
                        object.insert(SmolStr::new(name), self.from_raw(registry, child, value)?);
                    }
                    cooked.push(Value::object(object));
                }
                Ok(Value::array(cooked))
            }
            SchemaKind::LeafList(spec) => {
                let serde_json::Value::Array(entries) = raw else {
                    return Err(RawError::TypeError {
                        path: self.data_path(id),
                        message: "expected array of leaf-list values".to_string(),
                    });
                };
                let mut cooked = Vec::with_capacity(entries.len());
                for entry in entries {
                    cooked.push(spec.data_type.from_raw(entry, &node.module).map_err(
                        |message| RawError::TypeError {
                            path: self.data_path(id),
                            message,
                        },
                    )?);
                }
                Ok(Value::array(cooked))
            }
            SchemaKind::Leaf(spec) => {
                spec.data_type
                    .from_raw(raw, &node.module)
                    .map_err(|message| RawError::TypeError {
                        path: self.data_path(id),
                        message,
                    })
            }
            SchemaKind::Anydata | SchemaKind::Anyxml => Ok(anydata_value(raw)),
        }
    }

    /// Emit the RFC 7951 raw encoding for a cooked subtree.
    pub fn to_raw(&self, id: SchemaId, value: &Value) -> Result<serde_json::Value, RawError> {
        let node = self.node(id);
        match value {
            Value::Object(object) => {
                let mut members = serde_json::Map::new();
                for (name, member) in &object.members {
                    let child = self.child_by_instance_name(id, name);
                    let raw = match child {
                        Some(child) => self.to_raw(child, member)?,
                        // Inside anydata there is no schema to consult.
                        None => anydata_raw(member),
                    };
                    members.insert(name.to_string(), raw);
                }
                Ok(serde_json::Value::Object(members))
            }
            Value::Array(array) => {
                let mut entries = Vec::with_capacity(array.entries.len());
                for entry in &array.entries {
                    entries.push(self.to_raw(id, entry)?);
                }
                Ok(serde_json::Value::Array(entries))
            }
            scalar => match node.data_type() {
                Some(data_type) => {
                    data_type
                        .to_raw(scalar)
                        .map_err(|message| RawError::TypeError {
                            path: self.data_path(id),
                            message,
                        })
                }
                None => Ok(anydata_raw(scalar)),
            },
        }
    }
}

/// Structural conversion for anydata/anyxml content, which has no schema.
fn anydata_value(raw: &serde_json::Value) -> Value {
    match raw {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int64(i),
            None => Value::String(n.to_string()),
        },
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(entries) => {
            Value::array(entries.iter().map(anydata_value).collect())
        }
        serde_json::Value::Object(members) => Value::object(
            members
                .iter()
                .map(|(name, value)| (SmolStr::new(name), anydata_value(value)))
                .collect(),
        ),
    }
}

fn anydata_raw(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Int64(i) => serde_json::json!(i),
        Value::Object(object) => serde_json::Value::Object(
            object
                .members
                .iter()
                .map(|(name, member)| (name.to_string(), anydata_raw(member)))
                .collect(),
        ),
        Value::Array(array) => {
            serde_json::Value::Array(array.entries.iter().map(anydata_raw).collect())
        }
        other => serde_json::Value::String(other.as_xpath_string()),
    }
}
