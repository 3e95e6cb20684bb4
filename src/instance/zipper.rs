//! Persistent instance zipper.
//!
//! A [`Focus`] is a position on the data tree: the subtree value at the
//! focus, the corresponding schema node, and enough sibling context to
//! reconstruct the whole tree by zipping up. Mutating operations return a
//! new focus; the original focus's subtree remains reachable and
//! unmodified, with unchanged subtrees shared structurally.

use std::sync::Arc;
use std::time::SystemTime;

use smol_str::SmolStr;

use crate::base::{split_instance_name, InstanceName};
use crate::instance::route::{InstanceRoute, RouteStep};
use crate::instance::value::{ArrayValue, ObjectValue, Value};
use crate::instance::{RawError, ZipperError};
use crate::model::ModelInner;
use crate::schema::{SchemaId, SchemaKind};
use crate::types::DataType;
use crate::xpath;

type Result<T, E = ZipperError> = std::result::Result<T, E>;

/// An instance-node position: Root, ObjectMember, or ArrayEntry.
#[derive(Debug, Clone)]
enum FocusStep {
    Root,
    ObjectMember {
        name: InstanceName,
        /// Position of the member within the parent object, so zipping up
        /// preserves insertion order.
        index: usize,
        /// The parent object's other members.
        siblings: indexmap::IndexMap<InstanceName, Value>,
        parent: Box<Focus>,
    },
    ArrayEntry {
        before: Vec<Value>,
        after: Vec<Value>,
        parent: Box<Focus>,
    },
}

/// A focused position on a persistent instance tree.
#[derive(Debug, Clone)]
pub struct Focus {
    model: Arc<ModelInner>,
    value: Value,
    schema: SchemaId,
    timestamp: SystemTime,
    step: FocusStep,
}

impl Focus {
    pub(crate) fn new_root(model: Arc<ModelInner>, value: Value) -> Focus {
        let schema = model.schema.root();
        Focus {
            timestamp: value.timestamp().unwrap_or_else(SystemTime::now),
            model,
            value,
            schema,
            step: FocusStep::Root,
        }
    }

    /// The subtree value at this focus.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The corresponding schema node.
    pub fn schema(&self) -> SchemaId {
        self.schema
    }

    /// Last-modification timestamp of the subtree.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub(crate) fn model(&self) -> &Arc<ModelInner> {
        &self.model
    }

    pub fn is_root(&self) -> bool {
        matches!(self.step, FocusStep::Root)
    }

    /// Member name for object-member foci.
    pub fn member_name(&self) -> Option<&InstanceName> {
        match &self.step {
            FocusStep::ObjectMember { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Entry position for array-entry foci.
    pub fn entry_index(&self) -> Option<usize> {
        match &self.step {
            FocusStep::ArrayEntry { before, .. } => Some(before.len()),
            _ => None,
        }
    }

    /// The instance route from the root to this focus.
    pub fn route(&self) -> InstanceRoute {
        let mut steps = Vec::new();
        self.push_route(&mut steps);
        InstanceRoute::new(steps)
    }

    fn push_route(&self, steps: &mut Vec<RouteStep>) {
        match &self.step {
            FocusStep::Root => {}
            FocusStep::ObjectMember { name, parent, .. } => {
                parent.push_route(steps);
                let (module, local) = split_instance_name(name);
                steps.push(RouteStep::MemberName {
                    name: SmolStr::new(local),
                    module: module.map(SmolStr::new),
                });
            }
            FocusStep::ArrayEntry { before, parent, .. } => {
                parent.push_route(steps);
                steps.push(RouteStep::EntryIndex(before.len()));
            }
        }
    }

    /// Instance-identifier form of the route, for diagnostics.
    pub fn path(&self) -> String {
        self.route().to_string()
    }

    // ===== navigation =====

    /// Descend to an object member.
    pub fn member(&self, name: &str) -> Result<Focus> {
        let Value::Object(object) = &self.value else {
            return Err(self.value_error("not an object"));
        };
        let schema = self.child_schema(name)?;
        let Some((index, _, value)) = object.members.get_full(name) else {
            return Err(ZipperError::NonexistentInstance {
                path: self.path(),
                detail: format!("member {name}"),
            });
        };
        let value = value.clone();
        let mut siblings = object.members.clone();
        siblings.shift_remove(name);
        Ok(Focus {
            model: self.model.clone(),
            timestamp: value.timestamp().unwrap_or(object.timestamp),
            schema,
            step: FocusStep::ObjectMember {
                name: SmolStr::new(name),
                index,
                siblings,
                parent: Box::new(self.clone()),
            },
            value,
        })
    }

    fn child_schema(&self, name: &str) -> Result<SchemaId> {
        let node = self.model.schema.node(self.schema);
        if matches!(node.kind, SchemaKind::Anydata | SchemaKind::Anyxml) {
            // Inside anydata there is no schema to consult.
            return Ok(self.schema);
        }
        self.model
            .schema
            .child_by_instance_name(self.schema, name)
            .ok_or_else(|| ZipperError::NonexistentSchemaNode {
                path: self.path(),
                member: name.to_string(),
            })
    }

    /// Descend to an array entry.
    pub fn entry(&self, index: usize) -> Result<Focus> {
        let Value::Array(array) = &self.value else {
            return Err(self.value_error("not an array"));
        };
        if index >= array.entries.len() {
            return Err(ZipperError::NonexistentInstance {
                path: self.path(),
                detail: format!("entry {index}"),
            });
        }
        let value = array.entries[index].clone();
        Ok(Focus {
            model: self.model.clone(),
            timestamp: value.timestamp().unwrap_or(array.timestamp),
            schema: self.schema,
            step: FocusStep::ArrayEntry {
                before: array.entries[..index].to_vec(),
                after: array.entries[index + 1..].to_vec(),
                parent: Box::new(self.clone()),
            },
            value,
        })
    }

    /// Descend to the final array entry.
    pub fn last_entry(&self) -> Result<Focus> {
        let Value::Array(array) = &self.value else {
            return Err(self.value_error("not an array"));
        };
        if array.entries.is_empty() {
            return Err(ZipperError::NonexistentInstance {
                path: self.path(),
                detail: "last entry of an empty array".to_string(),
            });
        }
        self.entry(array.entries.len() - 1)
    }

    /// Switch to a sibling member of the parent object.
    pub fn sibling(&self, name: &str) -> Result<Focus> {
        match &self.step {
            FocusStep::ObjectMember { .. } => self.up()?.member(name),
            _ => Err(self.value_error("not an object member")),
        }
    }

    /// The previous entry of the containing array.
    pub fn previous(&self) -> Result<Focus> {
        match &self.step {
            FocusStep::ArrayEntry { before, .. } if !before.is_empty() => {
                let index = before.len() - 1;
                self.up()?.entry(index)
            }
            FocusStep::ArrayEntry { .. } => Err(ZipperError::NonexistentInstance {
                path: self.path(),
                detail: "no previous entry".to_string(),
            }),
            _ => Err(self.value_error("not an array entry")),
        }
    }

    /// The next entry of the containing array.
    pub fn next(&self) -> Result<Focus> {
        match &self.step {
            FocusStep::ArrayEntry { before, after, .. } if !after.is_empty() => {
                let index = before.len() + 1;
                self.up()?.entry(index)
            }
            FocusStep::ArrayEntry { .. } => Err(ZipperError::NonexistentInstance {
                path: self.path(),
                detail: "no next entry".to_string(),
            }),
            _ => Err(self.value_error("not an array entry")),
        }
    }

    /// One level up, rebuilding the parent value with this subtree zipped
    /// in.
    pub fn up(&self) -> Result<Focus> {
        match &self.step {
            FocusStep::Root => Err(ZipperError::NonexistentInstance {
                path: self.path(),
                detail: "the root has no parent".to_string(),
            }),
            FocusStep::ObjectMember {
                name,
                index,
                siblings,
                parent,
            } => {
                let mut members = siblings.clone();
                let position = (*index).min(members.len());
                members.shift_insert(position, name.clone(), self.value.clone());
                let timestamp = parent.timestamp.max(self.timestamp);
                let mut parent = (**parent).clone();
                parent.value = Value::Object(Arc::new(ObjectValue::with_timestamp(
                    members, timestamp,
                )));
                parent.timestamp = timestamp;
                Ok(parent)
            }
            FocusStep::ArrayEntry {
                before,
                after,
                parent,
            } => {
                let mut entries = Vec::with_capacity(before.len() + after.len() + 1);
                entries.extend(before.iter().cloned());
                entries.push(self.value.clone());
                entries.extend(after.iter().cloned());
                let timestamp = parent.timestamp.max(self.timestamp);
                let mut parent = (**parent).clone();
                parent.value =
                    Value::Array(Arc::new(ArrayValue::with_timestamp(entries, timestamp)));
                parent.timestamp = timestamp;
                Ok(parent)
            }
        }
    }

    /// Rezip all the way to the root focus.
    pub fn top(&self) -> Focus {
        let mut focus = self.clone();
        while !focus.is_root() {
            focus = focus.up().expect("non-root focus has a parent");
        }
        focus
    }

    /// Compose many moves; the first failing step surfaces its error.
    pub fn goto(&self, route: &InstanceRoute) -> Result<Focus> {
        let mut focus = self.clone();
        for step in route.iter() {
            focus = match step {
                RouteStep::MemberName { name, module } => {
                    let key = focus.member_key(name, module.as_deref());
                    focus.member(&key)?
                }
                RouteStep::EntryIndex(index) => focus.entry(*index)?,
                RouteStep::EntryValue(value) => focus.find_entry_by_value(value)?,
                RouteStep::EntryKeys(keys) => focus.look_up(keys)?,
            };
        }
        Ok(focus)
    }

    /// The member key a route step addresses: prefixed iff the schema says
    /// the namespace changes here.
    fn member_key(&self, name: &str, module: Option<&str>) -> InstanceName {
        match module {
            None => SmolStr::new(name),
            Some(module) => match self.model.schema.data_child(self.schema, name, module) {
                Some(child) => self.model.schema.instance_name(child),
                None => SmolStr::new(format!("{module}:{name}")),
            },
        }
    }

    /// Leaf-list entry selection by value.
    fn find_entry_by_value(&self, wanted: &Value) -> Result<Focus> {
        let Value::Array(array) = &self.value else {
            return Err(self.value_error("not an array"));
        };
        let data_type = self.model.schema.node(self.schema).data_type();
        let wanted = self.canonical(data_type, wanted);
        for index in 0..array.entries.len() {
            if self.canonical(data_type, &array.entries[index]) == wanted {
                return self.entry(index);
            }
        }
        Err(ZipperError::NonexistentInstance {
            path: self.path(),
            detail: format!("no entry with value {wanted}"),
        })
    }

    /// List-entry selection by key values. Key names may carry a module
    /// prefix; key values given as strings are cooked through the key
    /// leaf's type before comparison.
    pub fn look_up(&self, keys: &[(SmolStr, Value)]) -> Result<Focus> {
        let Value::Array(array) = &self.value else {
            return Err(self.value_error("not an array"));
        };
        let list = self.model.schema.node(self.schema);
        if !matches!(list.kind, SchemaKind::List(_)) {
            return Err(self.value_error("not a list"));
        }
        // Resolve key schema nodes once.
        let mut resolved = Vec::with_capacity(keys.len());
        for (written, wanted) in keys {
            let (module, local) = split_instance_name(written);
            let module = module.unwrap_or(list.module.as_str());
            let key_schema = self
                .model
                .schema
                .data_child(self.schema, local, module)
                .ok_or_else(|| ZipperError::NonexistentSchemaNode {
                    path: self.path(),
                    member: written.to_string(),
                })?;
            let member = self.model.schema.instance_name(key_schema);
            let data_type = self.model.schema.node(key_schema).data_type();
            resolved.push((member, self.canonical(data_type, wanted), key_schema));
        }
        'entries: for index in 0..array.entries.len() {
            let Some(entry) = array.entries[index].as_object() else {
                continue;
            };
            for (member, wanted, key_schema) in &resolved {
                let data_type = self.model.schema.node(*key_schema).data_type();
                match entry.members.get(member.as_str()) {
                    Some(value) if &self.canonical(data_type, value) == wanted => {}
                    _ => continue 'entries,
                }
            }
            return self.entry(index);
        }
        Err(ZipperError::NonexistentInstance {
            path: self.path(),
            detail: "no entry with matching keys".to_string(),
        })
    }

    /// Canonical comparison string for a (possibly still textual) value.
    fn canonical(&self, data_type: Option<&DataType>, value: &Value) -> String {
        let node = self.model.schema.node(self.schema);
        match (data_type, value) {
            (Some(data_type), Value::String(text)) => {
                match data_type.parse_value(text, &node.module) {
                    Ok(cooked) => data_type.canonical_string(&cooked),
                    Err(_) => text.clone(),
                }
            }
            (Some(data_type), cooked) => data_type.canonical_string(cooked),
            (None, value) => value.as_xpath_string(),
        }
    }

    /// Read the raw in-tree value at `route` without constructing a focus.
    ///
    /// The returned value must be treated as read-only.
    pub fn peek(&self, route: &InstanceRoute) -> Option<&Value> {
        let mut current = &self.value;
        for step in route.iter() {
            current = match step {
                RouteStep::MemberName { name, module } => {
                    let object = current.as_object()?;
                    match module {
                        None => object.members.get(name.as_str())?,
                        Some(module) => {
                            let prefixed = format!("{module}:{name}");
                            object
                                .members
                                .get(prefixed.as_str())
                                .or_else(|| object.members.get(name.as_str()))?
                        }
                    }
                }
                RouteStep::EntryIndex(index) => current.as_array()?.entries.get(*index)?,
                RouteStep::EntryValue(wanted) => {
                    let wanted = wanted.as_xpath_string();
                    current
                        .as_array()?
                        .entries
                        .iter()
                        .find(|entry| entry.as_xpath_string() == wanted)?
                }
                RouteStep::EntryKeys(keys) => {
                    current.as_array()?.entries.iter().find(|entry| {
                        entry.as_object().is_some_and(|object| {
                            keys.iter().all(|(written, wanted)| {
                                let (_, local) = split_instance_name(written);
                                let value = object
                                    .members
                                    .get(written.as_str())
                                    .or_else(|| object.members.get(local));
                                value.is_some_and(|v| {
                                    v.as_xpath_string() == wanted.as_xpath_string()
                                })
                            })
                        })
                    })?
                }
            };
        }
        Some(current)
    }

    // ===== mutation =====

    /// Replace the value at this focus.
    pub fn update(&self, value: Value) -> Focus {
        let mut out = self.clone();
        out.value = value;
        out.timestamp = SystemTime::now();
        out
    }

    /// Cook a raw value through this focus's schema node, then update.
    pub fn update_from_raw(&self, raw: &serde_json::Value) -> Result<Focus, RawError> {
        let value = self
            .model
            .schema
            .from_raw(&self.model.registry, self.schema, raw)?;
        Ok(self.update(value))
    }

    /// Add or replace an object member; the schema must allow the name.
    pub fn put_member(&self, name: &str, value: Value) -> Result<Focus> {
        let Value::Object(object) = &self.value else {
            return Err(self.value_error("not an object"));
        };
        self.child_schema(name)?;
        let mut members = object.members.clone();
        members.insert(SmolStr::new(name), value);
        Ok(self.update(Value::object(members)))
    }

    /// Remove an object member.
    pub fn delete_member(&self, name: &str) -> Result<Focus> {
        let Value::Object(object) = &self.value else {
            return Err(self.value_error("not an object"));
        };
        let mut members = object.members.clone();
        if members.shift_remove(name).is_none() {
            return Err(ZipperError::NonexistentInstance {
                path: self.path(),
                detail: format!("member {name}"),
            });
        }
        Ok(self.update(Value::object(members)))
    }

    /// Insert a new entry before this one; the focus moves to the new
    /// entry.
    pub fn insert_before(&self, value: Value) -> Result<Focus> {
        let FocusStep::ArrayEntry {
            before,
            after,
            parent,
        } = &self.step
        else {
            return Err(self.value_error("not an array entry"));
        };
        let mut new_after = Vec::with_capacity(after.len() + 1);
        new_after.push(self.value.clone());
        new_after.extend(after.iter().cloned());
        Ok(Focus {
            model: self.model.clone(),
            value,
            schema: self.schema,
            timestamp: SystemTime::now(),
            step: FocusStep::ArrayEntry {
                before: before.clone(),
                after: new_after,
                parent: parent.clone(),
            },
        })
    }

    /// Insert a new entry after this one; the focus moves to the new
    /// entry.
    pub fn insert_after(&self, value: Value) -> Result<Focus> {
        let FocusStep::ArrayEntry {
            before,
            after,
            parent,
        } = &self.step
        else {
            return Err(self.value_error("not an array entry"));
        };
        let mut new_before = Vec::with_capacity(before.len() + 1);
        new_before.extend(before.iter().cloned());
        new_before.push(self.value.clone());
        Ok(Focus {
            model: self.model.clone(),
            value,
            schema: self.schema,
            timestamp: SystemTime::now(),
            step: FocusStep::ArrayEntry {
                before: new_before,
                after: after.clone(),
                parent: parent.clone(),
            },
        })
    }

    /// Remove an entry of the focused array.
    pub fn delete_entry(&self, index: usize) -> Result<Focus> {
        let Value::Array(array) = &self.value else {
            return Err(self.value_error("not an array"));
        };
        if index >= array.entries.len() {
            return Err(ZipperError::NonexistentInstance {
                path: self.path(),
                detail: format!("entry {index}"),
            });
        }
        let mut entries = array.entries.clone();
        entries.remove(index);
        Ok(self.update(Value::array(entries)))
    }

    fn value_error(&self, detail: &str) -> ZipperError {
        ZipperError::InstanceValueError {
            path: self.path(),
            detail: detail.to_string(),
        }
    }

    /// Validate the subtree under this focus against its schema node.
    ///
    /// Behaves identically to a root validation that starts from the same
    /// schema node.
    pub fn validate(
        &self,
        scope: crate::validation::ValidationScope,
        content: crate::base::ContentType,
    ) -> std::result::Result<(), crate::validation::ValidationError> {
        crate::validation::validate(self, scope, content)
    }

    // ===== defaults =====

    /// Insert default members/values throughout the subtree under this
    /// focus. A default is only inserted if its `when` condition holds and
    /// all its ancestors exist.
    pub fn add_defaults(&self) -> crate::error::Result<Focus> {
        match &self.value {
            Value::Object(_) => self.add_defaults_object(),
            Value::Array(array) => {
                if !matches!(self.model.schema.node(self.schema).kind, SchemaKind::List(_)) {
                    return Ok(self.clone());
                }
                let mut focus = self.clone();
                for index in 0..array.entries.len() {
                    let entry = focus.entry(index)?;
                    let defaulted = entry.add_defaults_object()?;
                    focus = defaulted.up()?;
                }
                Ok(focus)
            }
            _ => Ok(self.clone()),
        }
    }

    fn add_defaults_object(&self) -> crate::error::Result<Focus> {
        let mut focus = self.clone();
        // Recurse into existing structured members first.
        let names: Vec<InstanceName> = match focus.value.as_object() {
            Some(object) => object.members.keys().cloned().collect(),
            None => return Ok(focus),
        };
        for name in names {
            let member = focus.member(&name)?;
            if member.value.is_structured()
                && !matches!(
                    self.model.schema.node(member.schema).kind,
                    SchemaKind::Anydata | SchemaKind::Anyxml
                )
            {
                focus = member.add_defaults()?.up()?;
            }
        }
        // Then insert defaults for absent children.
        let children = self.model.schema.node(focus.schema).children.clone();
        self.insert_defaults_under(focus, &children)
    }

    fn insert_defaults_under(
        &self,
        mut focus: Focus,
        children: &[SchemaId],
    ) -> crate::error::Result<Focus> {
        for &child in children {
            let node = self.model.schema.node(child);
            match &node.kind {
                SchemaKind::Group => {
                    if let Some(when) = &node.when {
                        if !xpath::evaluate(when, &focus)?.boolean() {
                            continue;
                        }
                    }
                    let grandchildren = node.children.clone();
                    focus = self.insert_defaults_under(focus, &grandchildren)?;
                }
                SchemaKind::Choice { default_case, .. } => {
                    let case = match self.active_case(&focus, child) {
                        Some(case) => Some(case),
                        None => default_case.as_ref().and_then(|name| {
                            node.children.iter().copied().find(|&c| {
                                self.model.schema.node(c).name == *name
                            })
                        }),
                    };
                    if let Some(case) = case {
                        let case_children = self.model.schema.node(case).children.clone();
                        focus = self.insert_defaults_under(focus, &case_children)?;
                    }
                }
                SchemaKind::Case => {
                    // Reached only through an active or default choice.
                    let case_children = node.children.clone();
                    focus = self.insert_defaults_under(focus, &case_children)?;
                }
                SchemaKind::Leaf(spec) => {
                    if let Some(default) = &spec.default {
                        let name = self.model.schema.instance_name(child);
                        if focus.has_member(&name) {
                            continue;
                        }
                        focus = self.try_insert(focus, child, &name, default.clone())?;
                    }
                }
                SchemaKind::LeafList(spec) => {
                    if !spec.defaults.is_empty() {
                        let name = self.model.schema.instance_name(child);
                        if focus.has_member(&name) {
                            continue;
                        }
                        let value = Value::array(spec.defaults.clone());
                        focus = self.try_insert(focus, child, &name, value)?;
                    }
                }
                SchemaKind::Container { presence: false } => {
                    let name = self.model.schema.instance_name(child);
                    if focus.has_member(&name) {
                        continue;
                    }
                    // Materialize the container only if defaults exist
                    // inside it.
                    let candidate = self.try_insert(
                        focus.clone(),
                        child,
                        &name,
                        Value::object(indexmap::IndexMap::new()),
                    )?;
                    if !candidate.has_member(&name) {
                        focus = candidate;
                        continue;
                    }
                    let filled = candidate.member(&name)?.add_defaults_object()?;
                    let keep = filled
                        .value
                        .as_object()
                        .is_some_and(|object| !object.members.is_empty());
                    focus = if keep {
                        filled.up()?
                    } else {
                        focus
                    };
                }
                _ => {}
            }
        }
        Ok(focus)
    }

    fn has_member(&self, name: &str) -> bool {
        self.value
            .as_object()
            .is_some_and(|object| object.members.contains_key(name))
    }

    /// Insert a default member, then drop it again if the node's `when`
    /// does not hold.
    fn try_insert(
        &self,
        focus: Focus,
        child: SchemaId,
        name: &str,
        value: Value,
    ) -> crate::error::Result<Focus> {
        let candidate = focus.put_member(name, value)?;
        if let Some(when) = &self.model.schema.node(child).when {
            let member = candidate.member(name)?;
            if !xpath::evaluate(when, &member)?.boolean() {
                return Ok(focus);
            }
        }
        Ok(candidate)
    }

    fn active_case(&self, focus: &Focus, choice: SchemaId) -> Option<SchemaId> {
        for &case in &self.model.schema.node(choice).children {
            for data_child in self.model.schema.data_children(case) {
                let name = self.model.schema.instance_name(data_child);
                if focus.has_member(&name) {
                    return Some(case);
                }
            }
        }
        None
    }

    // ===== XPath support =====

    /// Child instance nodes in document order; array members expand into
    /// their entries.
    pub(crate) fn child_nodes(&self) -> Vec<Focus> {
        let mut out = Vec::new();
        if let Value::Object(object) = &self.value {
            let names: Vec<InstanceName> = object.members.keys().cloned().collect();
            for name in names {
                let Ok(member) = self.member(&name) else {
                    continue;
                };
                if let Value::Array(array) = &member.value {
                    for index in 0..array.entries.len() {
                        if let Ok(entry) = member.entry(index) {
                            out.push(entry);
                        }
                    }
                } else {
                    out.push(member);
                }
            }
        }
        out
    }

    /// XPath parent: arrays are invisible, so an entry's parent is the
    /// containing object node.
    pub(crate) fn xpath_parent(&self) -> Option<Focus> {
        match &self.step {
            FocusStep::Root => None,
            FocusStep::ObjectMember { .. } => self.up().ok(),
            FocusStep::ArrayEntry { .. } => self.up().ok()?.up().ok(),
        }
    }

    /// `(local, module)` name of this node; `None` at the root.
    pub(crate) fn node_name(&self) -> Option<(SmolStr, SmolStr)> {
        match &self.step {
            FocusStep::Root => None,
            FocusStep::ArrayEntry { parent, .. } => parent.node_name(),
            FocusStep::ObjectMember { name, parent, .. } => {
                let (module, local) = split_instance_name(name);
                match module {
                    Some(module) => Some((SmolStr::new(local), SmolStr::new(module))),
                    None => {
                        let inherited = parent
                            .node_name()
                            .map(|(_, module)| module)
                            .unwrap_or_default();
                        Some((SmolStr::new(local), inherited))
                    }
                }
            }
        }
    }

    /// XPath string-value: canonical form for leaves, concatenated leaf
    /// values in document order for interior nodes.
    pub(crate) fn string_value(&self) -> String {
        match &self.value {
            Value::Object(_) | Value::Array(_) => {
                let mut out = String::new();
                for child in self.child_nodes() {
                    out.push_str(&child.string_value());
                }
                out
            }
            scalar => match self.model.schema.node(self.schema).data_type() {
                Some(data_type) => data_type.canonical_string(scalar),
                None => scalar.as_xpath_string(),
            },
        }
    }
}
