//! The validation engine.
//!
//! [`validate`] traverses a focus's subtree against its schema node and
//! raises on the first violation. Validation of a subtree behaves
//! identically to a root validation started from the same schema node;
//! [`crate::model::DataModel::validate`] is a thin wrapper over the same
//! code.

use std::str::FromStr;

use thiserror::Error;

use crate::base::ContentType;
use crate::instance::{Focus, Value};
use crate::schema::{SchemaId, SchemaKind};
use crate::xpath;

/// What is checked: grammar-level (`syntax`), semantic constraints
/// (`semantics`), or both (`all`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationScope {
    Syntax,
    Semantics,
    #[default]
    All,
}

impl ValidationScope {
    fn syntax(self) -> bool {
        matches!(self, ValidationScope::Syntax | ValidationScope::All)
    }

    fn semantics(self) -> bool {
        matches!(self, ValidationScope::Semantics | ValidationScope::All)
    }
}

impl FromStr for ValidationScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "syntax" => Ok(ValidationScope::Syntax),
            "semantics" => Ok(ValidationScope::Semantics),
            "all" => Ok(ValidationScope::All),
            other => Err(format!("unknown validation scope: {other}")),
        }
    }
}

/// Schema violations come from the grammar; semantic violations from
/// constraints evaluated over the whole tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    Schema,
    Semantic,
}

/// A validation failure: the offending instance path, a stable error tag
/// (possibly overridden by the data model via `error-app-tag`), and an
/// optional message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {tag}{}", .message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
pub struct ValidationError {
    pub kind: ViolationKind,
    pub path: String,
    pub tag: String,
    pub message: Option<String>,
}

impl ValidationError {
    fn schema(focus: &Focus, tag: &str, message: impl Into<Option<String>>) -> Self {
        Self {
            kind: ViolationKind::Schema,
            path: focus.path(),
            tag: tag.to_string(),
            message: message.into(),
        }
    }

    fn semantic(focus: &Focus, tag: &str, message: impl Into<Option<String>>) -> Self {
        Self {
            kind: ViolationKind::Semantic,
            path: focus.path(),
            tag: tag.to_string(),
            message: message.into(),
        }
    }
}

type Result<T> = std::result::Result<T, ValidationError>;

/// Validate the subtree under `focus` against its schema node.
pub fn validate(focus: &Focus, scope: ValidationScope, content: ContentType) -> Result<()> {
    let validator = Validator { scope, content };
    validator.validate_node(focus)
}

struct Validator {
    scope: ValidationScope,
    content: ContentType,
}

impl Validator {
    /// Does the content-type filter admit this schema node?
    fn admits(&self, focus: &Focus, id: SchemaId) -> bool {
        let node = focus.model().schema.node(id);
        self.content.admits(node.content)
    }

    fn when_error(&self, focus: &Focus) -> Result<()> {
        Err(ValidationError::schema(
            focus,
            "member-not-allowed",
            Some("when condition is false".to_string()),
        ))
    }

    fn validate_node(&self, focus: &Focus) -> Result<()> {
        let model = focus.model().clone();
        let node = model.schema.node(focus.schema());
        node.bump_val_count();

        // A node whose `when` is false is treated as absent; its value,
        // if present, is a schema violation.
        if self.scope.syntax() {
            if let Some(when) = &node.when {
                if !self.eval_boolean(when, focus)? {
                    return self.when_error(focus);
                }
            }
        }

        match &node.kind {
            SchemaKind::Leaf(spec) => {
                if self.scope.syntax() {
                    self.check_type(focus, &spec.data_type)?;
                }
                if self.scope.semantics() {
                    self.check_musts(focus)?;
                    self.check_reference_integrity(focus, &spec.data_type)?;
                }
            }
            SchemaKind::LeafList(spec) => {
                let Value::Array(array) = focus.value() else {
                    return Err(ValidationError::schema(
                        focus,
                        "invalid-type",
                        Some("leaf-list expects an array".to_string()),
                    ));
                };
                if self.scope.syntax() {
                    for index in 0..array.entries.len() {
                        let entry = self.entry(focus, index)?;
                        self.check_type(&entry, &spec.data_type)?;
                    }
                }
                if self.scope.semantics() {
                    self.check_cardinality(
                        focus,
                        array.entries.len() as u64,
                        spec.min_elements,
                        spec.max_elements,
                    )?;
                    // Config leaf-lists must not repeat values.
                    if node.content == ContentType::Config {
                        let mut seen = Vec::new();
                        for entry in &array.entries {
                            let canonical = spec.data_type.canonical_string(entry);
                            if seen.contains(&canonical) {
                                return Err(ValidationError::semantic(
                                    focus,
                                    "repeated-leaf-list-values",
                                    Some(canonical),
                                ));
                            }
                            seen.push(canonical);
                        }
                    }
                    self.check_musts(focus)?;
                    for index in 0..array.entries.len() {
                        let entry = self.entry(focus, index)?;
                        self.check_reference_integrity(&entry, &spec.data_type)?;
                    }
                }
            }
            SchemaKind::List(spec) => {
                let Value::Array(array) = focus.value() else {
                    return Err(ValidationError::schema(
                        focus,
                        "invalid-type",
                        Some("list expects an array".to_string()),
                    ));
                };
                if self.scope.semantics() {
                    self.check_cardinality(
                        focus,
                        array.entries.len() as u64,
                        spec.min_elements,
                        spec.max_elements,
                    )?;
                    self.check_musts(focus)?;
                }
                let mut seen_keys: Vec<String> = Vec::new();
                for index in 0..array.entries.len() {
                    let entry = self.entry(focus, index)?;
                    if self.scope.syntax() {
                        // Every entry carries all its keys.
                        for key in &spec.keys {
                            let child = model
                                .schema
                                .data_child(focus.schema(), &key.name, &key.module);
                            let present = child.is_some_and(|child| {
                                let name = model.schema.instance_name(child);
                                entry
                                    .value()
                                    .as_object()
                                    .is_some_and(|o| o.members.contains_key(name.as_str()))
                            });
                            if !present {
                                return Err(ValidationError::schema(
                                    &entry,
                                    "list-key-missing",
                                    Some(key.name.to_string()),
                                ));
                            }
                        }
                    }
                    if self.scope.semantics() && !spec.keys.is_empty() {
                        // Key tuples compared in canonical string form.
                        let tuple = self.key_tuple(&entry, &spec.keys)?;
                        if seen_keys.contains(&tuple) {
                            return Err(ValidationError::semantic(
                                focus,
                                "non-unique-key",
                                Some(tuple),
                            ));
                        }
                        seen_keys.push(tuple);
                    }
                    self.validate_object(&entry)?;
                }
                if self.scope.semantics() {
                    self.check_unique_groups(focus, array.entries.len(), spec)?;
                }
            }
            SchemaKind::Anydata | SchemaKind::Anyxml => {
                // Any value structure is accepted.
            }
            _ => {
                self.validate_object(focus)?;
                if self.scope.semantics() {
                    self.check_musts(focus)?;
                }
            }
        }
        Ok(())
    }

    /// Validate an object against its schema children: no undeclared
    /// members, every member valid, active when-conditions, mandatory
    /// children present, at most one case per choice. Members outside the
    /// requested content type are not checked.
    fn validate_object(&self, focus: &Focus) -> Result<()> {
        let model = focus.model().clone();
        let Value::Object(object) = focus.value() else {
            return Err(ValidationError::schema(
                focus,
                "invalid-type",
                Some("expected an object".to_string()),
            ));
        };
        let member_names: Vec<_> = object.members.keys().cloned().collect();
        for name in &member_names {
            let Some(child) = model.schema.child_by_instance_name(focus.schema(), name) else {
                // Undeclared members are a grammar-level violation.
                if self.scope.syntax() {
                    return Err(ValidationError::schema(
                        focus,
                        "member-not-allowed",
                        Some(name.to_string()),
                    ));
                }
                continue;
            };
            if !self.admits(focus, child) {
                // A config node may still contain state-data descendants;
                // pass through interior nodes without checking them, skip
                // everything else outside the requested content.
                let interior = matches!(
                    model.schema.node(child).kind,
                    SchemaKind::Container { .. } | SchemaKind::List(_)
                );
                if self.content == ContentType::Nonconfig && interior {
                    let member = focus.member(name).map_err(|e| {
                        ValidationError::schema(focus, "member-not-allowed", Some(e.to_string()))
                    })?;
                    self.descend_passthrough(&member)?;
                }
                continue;
            }
            // when-conditions of wrapping Group/Choice/Case nodes gate
            // this member jointly with its siblings.
            if self.scope.syntax() && !self.wrappers_active(focus, child)? {
                let member = focus.member(name).map_err(|e| {
                    ValidationError::schema(focus, "member-not-allowed", Some(e.to_string()))
                })?;
                return self.when_error(&member);
            }
            let member = focus.member(name).map_err(|e| {
                ValidationError::schema(focus, "member-not-allowed", Some(e.to_string()))
            })?;
            self.validate_node(&member)?;
        }
        if self.scope.syntax() {
            self.check_children_present(focus, focus.schema())?;
        }
        if self.scope.semantics() {
            self.check_min_cardinality_of_absent(focus, focus.schema())?;
        }
        Ok(())
    }

    /// Walk through a node outside the requested content without applying
    /// its own checks, so admitted descendants are still reached.
    fn descend_passthrough(&self, member: &Focus) -> Result<()> {
        match member.value() {
            Value::Object(_) => self.validate_object(member),
            Value::Array(array) => {
                for index in 0..array.entries.len() {
                    let entry = self.entry(member, index)?;
                    if entry.value().as_object().is_some() {
                        self.validate_object(&entry)?;
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Evaluate when-conditions on Group/Choice/Case ancestors between a
    /// data child and the containing data node.
    fn wrappers_active(&self, parent: &Focus, child: SchemaId) -> Result<bool> {
        let model = parent.model().clone();
        let mut current = model.schema.node(child).parent;
        while let Some(id) = current {
            let node = model.schema.node(id);
            if node.is_data_node() || matches!(node.kind, SchemaKind::SchemaRoot) {
                break;
            }
            if let Some(when) = &node.when {
                if !self.eval_boolean(when, parent)? {
                    return Ok(false);
                }
            }
            current = node.parent;
        }
        Ok(true)
    }

    /// Mandatory members present; at most one case per choice.
    fn check_children_present(&self, focus: &Focus, schema: SchemaId) -> Result<()> {
        let model = focus.model().clone();
        for &child in &model.schema.node(schema).children {
            let node = model.schema.node(child);
            match &node.kind {
                SchemaKind::Group => {
                    let active = match &node.when {
                        Some(when) => self.eval_boolean(when, focus)?,
                        None => true,
                    };
                    if active {
                        self.check_children_present(focus, child)?;
                    }
                }
                SchemaKind::Choice {
                    mandatory,
                    ..
                } => {
                    let mut active_cases = 0usize;
                    for &case in &model.schema.node(child).children {
                        if self.case_active(focus, case) {
                            active_cases += 1;
                        }
                    }
                    if active_cases > 1 {
                        return Err(ValidationError::schema(
                            focus,
                            "member-not-allowed",
                            Some(format!(
                                "multiple cases of choice {} instantiated",
                                node.name
                            )),
                        ));
                    }
                    if *mandatory && active_cases == 0 && self.content.admits(node.content) {
                        return Err(ValidationError::schema(
                            focus,
                            "missing-data",
                            Some(format!("mandatory choice {} has no case", node.name)),
                        ));
                    }
                    // Mandatory members inside an active case still apply.
                    for &case in &model.schema.node(child).children {
                        if self.case_active(focus, case) {
                            self.check_children_present(focus, case)?;
                        }
                    }
                }
                SchemaKind::Leaf(spec) if spec.mandatory => {
                    if !self.admits(focus, child) {
                        continue;
                    }
                    let name = model.schema.instance_name(child);
                    if !has_member(focus, &name) && self.node_required(focus, child)? {
                        return Err(ValidationError::schema(
                            focus,
                            "missing-data",
                            Some(format!("missing mandatory member {name}")),
                        ));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Absent (leaf-)lists with `min-elements` violate cardinality.
    fn check_min_cardinality_of_absent(&self, focus: &Focus, schema: SchemaId) -> Result<()> {
        let model = focus.model().clone();
        for &child in &model.schema.node(schema).children {
            let node = model.schema.node(child);
            if !node.is_data_node() {
                self.check_min_cardinality_of_absent(focus, child)?;
                continue;
            }
            let min_elements = match &node.kind {
                SchemaKind::List(spec) => spec.min_elements,
                SchemaKind::LeafList(spec) => spec.min_elements,
                _ => continue,
            };
            if min_elements == 0 || !self.admits(focus, child) {
                continue;
            }
            let name = model.schema.instance_name(child);
            if !has_member(focus, &name) && self.node_required(focus, child)? {
                return Err(ValidationError::semantic(
                    focus,
                    "too-few-elements",
                    Some(name.to_string()),
                ));
            }
        }
        Ok(())
    }

    /// A missing node is only required when its own and its wrappers'
    /// when-conditions hold (evaluated at the parent, the nearest
    /// existing ancestor).
    fn node_required(&self, parent: &Focus, child: SchemaId) -> Result<bool> {
        if !self.wrappers_active(parent, child)? {
            return Ok(false);
        }
        if let Some(when) = &parent.model().schema.node(child).when {
            if !self.eval_boolean(when, parent)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn case_active(&self, focus: &Focus, case: SchemaId) -> bool {
        let model = focus.model();
        for data_child in model.schema.data_children(case) {
            let name = model.schema.instance_name(data_child);
            if has_member(focus, &name) {
                return true;
            }
        }
        false
    }

    // ===== per-kind checks =====

    fn check_type(&self, focus: &Focus, data_type: &crate::types::DataType) -> Result<()> {
        let model = focus.model();
        if let Err(violation) = data_type.check(focus.value(), &model.registry) {
            return Err(ValidationError {
                kind: ViolationKind::Schema,
                path: focus.path(),
                tag: violation.error_tag,
                message: violation.error_message,
            });
        }
        Ok(())
    }

    fn check_musts(&self, focus: &Focus) -> Result<()> {
        let model = focus.model().clone();
        for must in &model.schema.node(focus.schema()).musts {
            if !self.eval_boolean(&must.expr, focus)? {
                return Err(ValidationError {
                    kind: ViolationKind::Semantic,
                    path: focus.path(),
                    tag: must
                        .error_tag
                        .clone()
                        .unwrap_or_else(|| "must-violation".to_string()),
                    message: must
                        .error_message
                        .clone()
                        .or_else(|| Some(must.expr.source.clone())),
                });
            }
        }
        Ok(())
    }

    /// Leafref and instance-identifier integrity (`require-instance`).
    fn check_reference_integrity(
        &self,
        focus: &Focus,
        data_type: &crate::types::DataType,
    ) -> Result<()> {
        use crate::types::TypeSpec;
        match &data_type.spec {
            TypeSpec::Leafref {
                compiled_path,
                require_instance,
                target,
                ..
            } => {
                if !require_instance {
                    return Ok(());
                }
                let wanted = match target {
                    Some(target) => target.canonical_string(focus.value()),
                    None => focus.value().as_xpath_string(),
                };
                let targets = xpath::evaluate(compiled_path, focus)
                    .map_err(|e| {
                        ValidationError::semantic(focus, "instance-required", Some(e.to_string()))
                    })?;
                let found = match targets {
                    xpath::XPathValue::NodeSet(nodes) => {
                        nodes.iter().any(|n| n.string_value() == wanted)
                    }
                    _ => false,
                };
                if !found {
                    return Err(ValidationError::semantic(
                        focus,
                        "instance-required",
                        Some(wanted),
                    ));
                }
                Ok(())
            }
            TypeSpec::InstanceIdentifier { require_instance } => {
                if !require_instance {
                    return Ok(());
                }
                let Value::InstanceRef(route) = focus.value() else {
                    return Ok(());
                };
                if focus.top().peek(route).is_none() {
                    return Err(ValidationError::semantic(
                        focus,
                        "instance-required",
                        Some(route.to_string()),
                    ));
                }
                Ok(())
            }
            TypeSpec::Union { members } => {
                // The value must satisfy at least one member's referential
                // requirements; non-reference members accept it outright.
                let model = focus.model();
                for member in members {
                    if !matches!(
                        member.spec,
                        TypeSpec::Leafref { .. } | TypeSpec::InstanceIdentifier { .. }
                    ) {
                        if member.contains(focus.value(), &model.registry) {
                            return Ok(());
                        }
                        continue;
                    }
                    if self.check_reference_integrity(focus, member).is_ok() {
                        return Ok(());
                    }
                }
                Err(ValidationError::semantic(
                    focus,
                    "instance-required",
                    Some(focus.value().as_xpath_string()),
                ))
            }
            _ => Ok(()),
        }
    }

    fn check_cardinality(
        &self,
        focus: &Focus,
        count: u64,
        min_elements: u64,
        max_elements: Option<u64>,
    ) -> Result<()> {
        if count < min_elements {
            return Err(ValidationError::semantic(
                focus,
                "too-few-elements",
                Some(format!("{count} < {min_elements}")),
            ));
        }
        if let Some(max) = max_elements {
            if count > max {
                return Err(ValidationError::semantic(
                    focus,
                    "too-many-elements",
                    Some(format!("{count} > {max}")),
                ));
            }
        }
        Ok(())
    }

    /// `unique` groups: a group is vacuously satisfied for entries missing
    /// any referenced value (including leaves under inactive cases).
    fn check_unique_groups(
        &self,
        focus: &Focus,
        entries: usize,
        spec: &crate::schema::ListSpec,
    ) -> Result<()> {
        let model = focus.model().clone();
        for group in &spec.unique {
            let mut seen: Vec<String> = Vec::new();
            for index in 0..entries {
                let entry = self.entry(focus, index)?;
                let mut tuple = Vec::with_capacity(group.len());
                let mut complete = true;
                for route in group {
                    let Some(leaf) = model.schema.descendant(focus.schema(), route) else {
                        complete = false;
                        break;
                    };
                    match self.leaf_value_at(&entry, leaf) {
                        Some(canonical) => tuple.push(canonical),
                        None => {
                            complete = false;
                            break;
                        }
                    }
                }
                if !complete {
                    continue;
                }
                let tuple = tuple.join(" ");
                if seen.contains(&tuple) {
                    return Err(ValidationError::semantic(
                        focus,
                        "data-not-unique",
                        Some(tuple),
                    ));
                }
                seen.push(tuple);
            }
        }
        Ok(())
    }

    /// Canonical value of a descendant leaf within a list entry, walking
    /// member names from the entry object.
    fn leaf_value_at(&self, entry: &Focus, leaf: SchemaId) -> Option<String> {
        let model = entry.model().clone();
        // Build the member-name chain from the entry's schema node down.
        let mut chain = Vec::new();
        let mut current = leaf;
        while current != entry.schema() {
            chain.push(current);
            current = model.schema.data_parent(current)?;
        }
        chain.reverse();
        let mut focus = entry.clone();
        for id in chain {
            let name = model.schema.instance_name(id);
            focus = focus.member(&name).ok()?;
        }
        let data_type = model.schema.node(leaf).data_type()?;
        Some(data_type.canonical_string(focus.value()))
    }

    fn key_tuple(&self, entry: &Focus, keys: &[crate::base::QualName]) -> Result<String> {
        let model = entry.model().clone();
        // List entries share the list's schema node.
        let list_schema = entry.schema();
        let mut parts = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(child) = model.schema.data_child(list_schema, &key.name, &key.module) else {
                continue;
            };
            let name = model.schema.instance_name(child);
            let member = entry.member(&name).map_err(|_| {
                ValidationError::schema(entry, "list-key-missing", Some(key.name.to_string()))
            })?;
            let canonical = match model.schema.node(child).data_type() {
                Some(data_type) => data_type.canonical_string(member.value()),
                None => member.value().as_xpath_string(),
            };
            parts.push(canonical);
        }
        Ok(parts.join(" "))
    }

    // ===== helpers =====

    fn entry(&self, focus: &Focus, index: usize) -> Result<Focus> {
        focus.entry(index).map_err(|e| {
            ValidationError::schema(focus, "invalid-type", Some(e.to_string()))
        })
    }

    fn eval_boolean(&self, expr: &crate::xpath::CompiledExpr, focus: &Focus) -> Result<bool> {
        xpath::evaluate(expr, focus)
            .map(|v| v.boolean())
            .map_err(|e| ValidationError::semantic(focus, "must-violation", Some(e.to_string())))
    }
}

fn has_member(focus: &Focus, name: &str) -> bool {
    focus
        .value()
        .as_object()
        .is_some_and(|object| object.members.contains_key(name))
}
