//! Schema tree construction.
//!
//! Walks the implemented modules' statement trees in registration order:
//! data definitions first, then all augments, then all deviations (always
//! last), and finally leafref resolution. Statements guarded by a false
//! `if-feature` expression are discarded wherever they appear.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use smol_str::SmolStr;
use tracing::{debug, trace};

use crate::base::{ContentType, DefaultDeny, QualName, SchemaRoute, Status};
use crate::error::SchemaBuildError;
use crate::instance::Value;
use crate::parser::Stmt;
use crate::registry::ModuleRegistry;
use crate::types::{build_type, DataType, TypeSpec};
use crate::xpath::{parse_xpath_shared, Axis, CompiledExpr, Expr, NodeTest, SchemaContext};

use super::{
    LeafListSpec, LeafSpec, ListSpec, MustConstraint, SchemaId, SchemaKind, SchemaNode, SchemaTree,
};

type Result<T> = std::result::Result<T, SchemaBuildError>;

const DATA_DEF_KEYWORDS: &[&str] = &[
    "container", "leaf", "leaf-list", "list", "choice", "case", "anydata", "anyxml", "uses",
];

/// Compile the registry's implemented modules into a schema tree.
pub fn build_schema(registry: &ModuleRegistry) -> Result<SchemaTree> {
    let mut builder = Builder {
        registry,
        tree: SchemaTree::new(),
        contexts: vec![None; registry.entries().len()],
        uses_chain: Vec::new(),
    };
    let root = builder.tree.root();

    // Data definitions, rpcs, and notifications, module by module.
    for &index in registry.implemented() {
        for scope in registry.module_scope(index) {
            let tree = &registry.entry(scope).tree;
            debug!(module = %registry.entry(scope).id, "building schema nodes");
            for stmt in tree.root().children() {
                if stmt.is_builtin()
                    && (DATA_DEF_KEYWORDS.contains(&stmt.keyword())
                        || matches!(stmt.keyword(), "rpc" | "notification"))
                {
                    builder.build_child(root, stmt, scope)?;
                }
            }
        }
    }

    // Augments in module-registration order.
    for &index in registry.implemented() {
        for scope in registry.module_scope(index) {
            let tree = &registry.entry(scope).tree;
            for stmt in tree.root().find_all("augment") {
                builder.apply_augment(stmt, scope)?;
            }
        }
    }

    // Deviations always come last.
    for &index in registry.implemented() {
        for scope in registry.module_scope(index) {
            let tree = &registry.entry(scope).tree;
            for stmt in tree.root().find_all("deviation") {
                builder.apply_deviation(stmt, scope)?;
            }
        }
    }

    builder.resolve_leafrefs()?;
    Ok(builder.tree)
}

struct Builder<'a> {
    registry: &'a ModuleRegistry,
    tree: SchemaTree,
    /// Cached XPath schema contexts, one per registry entry.
    contexts: Vec<Option<Arc<SchemaContext>>>,
    /// Grouping names currently being expanded, for cycle detection.
    uses_chain: Vec<QualName>,
}

impl<'a> Builder<'a> {
    fn context(&mut self, scope: usize) -> Arc<SchemaContext> {
        self.contexts[scope]
            .get_or_insert_with(|| Arc::new(self.registry.schema_context(scope)))
            .clone()
    }

    fn parse_expr(&mut self, text: &str, scope: usize) -> Result<Arc<CompiledExpr>> {
        let context = self.context(scope);
        Ok(Arc::new(parse_xpath_shared(text, context)?))
    }

    /// Build one child of `parent`, wrapping shorthand case members when
    /// the parent is a choice. Returns `None` when an `if-feature`
    /// discards the statement.
    fn build_child(
        &mut self,
        parent: SchemaId,
        stmt: Stmt<'_>,
        scope: usize,
    ) -> Result<Option<SchemaId>> {
        let parent_is_choice = matches!(self.tree.node(parent).kind, SchemaKind::Choice { .. });
        if parent_is_choice && stmt.keyword() != "case" && stmt.keyword() != "uses" {
            if !self.registry.if_features(stmt, scope)? {
                return Ok(None);
            }
            // Shorthand: a data node directly under a choice gets an
            // implicit case with the same name.
            let case = self.alloc_implicit_case(parent, stmt, scope);
            return self.build_node(case, stmt, scope);
        }
        self.build_node(parent, stmt, scope)
    }

    fn build_node(
        &mut self,
        parent: SchemaId,
        stmt: Stmt<'_>,
        scope: usize,
    ) -> Result<Option<SchemaId>> {
        if !self.registry.if_features(stmt, scope)? {
            trace!(node = ?stmt.argument(), "discarded by if-feature");
            return Ok(None);
        }
        let id = match stmt.keyword() {
            "container" => {
                let presence = stmt.find1("presence").is_some();
                let id = self.alloc_node(parent, stmt, scope, SchemaKind::Container { presence })?;
                self.build_children(id, stmt, scope)?;
                id
            }
            "leaf" => {
                let data_type = build_type(self.registry, scope, self.type_stmt(stmt)?)?;
                let default = match stmt.arg_of("default") {
                    Some(text) => Some(self.parse_default(&data_type, text, scope)?),
                    None => data_type.default.clone(),
                };
                let mandatory = stmt.arg_of("mandatory") == Some("true");
                if mandatory && default.is_some() && stmt.arg_of("default").is_some() {
                    return Err(SchemaBuildError::InvalidTypeRestriction(format!(
                        "mandatory leaf {} must not have a default",
                        stmt.argument().unwrap_or_default()
                    )));
                }
                let spec = LeafSpec {
                    data_type,
                    default: if mandatory { None } else { default },
                    mandatory,
                };
                self.alloc_node(parent, stmt, scope, SchemaKind::Leaf(spec))?
            }
            "leaf-list" => {
                let data_type = build_type(self.registry, scope, self.type_stmt(stmt)?)?;
                let mut defaults = Vec::new();
                for default in stmt.find_all("default") {
                    if let Some(text) = default.argument() {
                        defaults.push(self.parse_default(&data_type, text, scope)?);
                    }
                }
                if defaults.is_empty() {
                    if let Some(default) = data_type.default.clone() {
                        defaults.push(default);
                    }
                }
                let (min_elements, max_elements) = cardinality(stmt)?;
                if min_elements > 0 {
                    defaults.clear();
                }
                let spec = LeafListSpec {
                    data_type,
                    defaults,
                    min_elements,
                    max_elements,
                    user_ordered: stmt.arg_of("ordered-by") == Some("user"),
                };
                self.alloc_node(parent, stmt, scope, SchemaKind::LeafList(spec))?
            }
            "list" => {
                let (min_elements, max_elements) = cardinality(stmt)?;
                let spec = ListSpec {
                    keys: Vec::new(),
                    unique: self.unique_groups(stmt, scope)?,
                    min_elements,
                    max_elements,
                    user_ordered: stmt.arg_of("ordered-by") == Some("user"),
                };
                let id = self.alloc_node(parent, stmt, scope, SchemaKind::List(spec))?;
                self.build_children(id, stmt, scope)?;
                self.resolve_list_keys(id, stmt, scope)?;
                id
            }
            "choice" => {
                let kind = SchemaKind::Choice {
                    default_case: stmt.arg_of("default").map(SmolStr::new),
                    mandatory: stmt.arg_of("mandatory") == Some("true"),
                };
                let id = self.alloc_node(parent, stmt, scope, kind)?;
                for child in data_def_children(stmt) {
                    self.build_child(id, child, scope)?;
                }
                id
            }
            "case" => {
                let id = self.alloc_node(parent, stmt, scope, SchemaKind::Case)?;
                self.build_children(id, stmt, scope)?;
                id
            }
            "anydata" => self.alloc_node(parent, stmt, scope, SchemaKind::Anydata)?,
            "anyxml" => self.alloc_node(parent, stmt, scope, SchemaKind::Anyxml)?,
            "uses" => {
                self.expand_uses(parent, stmt, scope)?;
                return Ok(None);
            }
            "rpc" | "action" => {
                let id = self.alloc_node(parent, stmt, scope, SchemaKind::RpcAction)?;
                for (keyword, kind) in [("input", SchemaKind::Input), ("output", SchemaKind::Output)]
                {
                    if let Some(io) = stmt.find1(keyword) {
                        let io_id = self.alloc_node(id, io, scope, kind)?;
                        self.build_children(io_id, io, scope)?;
                    }
                }
                id
            }
            "notification" => {
                let id = self.alloc_node(parent, stmt, scope, SchemaKind::Notification)?;
                self.build_children(id, stmt, scope)?;
                id
            }
            other => {
                return Err(SchemaBuildError::BadSchemaNodeType {
                    node: other.to_string(),
                    expected: "a data definition statement",
                })
            }
        };
        Ok(Some(id))
    }

    /// Ordinary data-definition children plus nested actions and
    /// notifications.
    fn build_children(&mut self, id: SchemaId, stmt: Stmt<'_>, scope: usize) -> Result<()> {
        for child in stmt.children() {
            if !child.is_builtin() {
                continue;
            }
            if DATA_DEF_KEYWORDS.contains(&child.keyword())
                || matches!(child.keyword(), "action" | "notification")
            {
                self.build_child(id, child, scope)?;
            }
        }
        Ok(())
    }

    /// A shorthand case carries only the wrapped node's name; the node's
    /// own when/must stay on the node.
    fn alloc_implicit_case(&mut self, parent: SchemaId, stmt: Stmt<'_>, scope: usize) -> SchemaId {
        let content = self.tree.node(parent).content;
        self.tree.alloc(SchemaNode {
            name: SmolStr::new(stmt.argument().unwrap_or_default()),
            module: self.registry.namespace(scope).clone(),
            parent: Some(parent),
            children: Vec::new(),
            when: None,
            musts: Vec::new(),
            description: None,
            reference: None,
            status: Status::Current,
            content,
            default_deny: DefaultDeny::None,
            val_count: AtomicU64::new(0),
            kind: SchemaKind::Case,
        })
    }

    /// Allocate a node with the common fields filled in from `stmt`.
    fn alloc_node(
        &mut self,
        parent: SchemaId,
        stmt: Stmt<'_>,
        scope: usize,
        kind: SchemaKind,
    ) -> Result<SchemaId> {
        let name = match &kind {
            SchemaKind::Input => SmolStr::new("input"),
            SchemaKind::Output => SmolStr::new("output"),
            _ => SmolStr::new(stmt.argument().unwrap_or_default()),
        };
        let module = self.registry.namespace(scope).clone();
        let content = self.effective_content(parent, stmt, &kind);

        let when = match stmt.find1("when") {
            Some(when) => Some(self.parse_expr(when.argument().unwrap_or_default(), scope)?),
            None => None,
        };
        let mut musts = Vec::new();
        for must in stmt.find_all("must") {
            musts.push(MustConstraint {
                expr: self.parse_expr(must.argument().unwrap_or_default(), scope)?,
                error_tag: must.arg_of("error-app-tag").map(String::from),
                error_message: must.arg_of("error-message").map(String::from),
            });
        }
        let status = stmt
            .arg_of("status")
            .map(|s| s.parse::<Status>())
            .transpose()
            .map_err(SchemaBuildError::InvalidTypeRestriction)?
            .unwrap_or_default();

        let mut default_deny = DefaultDeny::None;
        for child in stmt.children() {
            if !child.is_builtin() {
                match child.keyword() {
                    "default-deny-write" => default_deny = DefaultDeny::Write,
                    "default-deny-all" => default_deny = DefaultDeny::All,
                    _ => {}
                }
            }
        }

        Ok(self.tree.alloc(SchemaNode {
            name,
            module,
            parent: Some(parent),
            children: Vec::new(),
            when,
            musts,
            description: stmt.arg_of("description").map(String::from),
            reference: stmt.arg_of("reference").map(String::from),
            status,
            content,
            default_deny,
            val_count: AtomicU64::new(0),
            kind,
        }))
    }

    /// Content classification: `config false` starts a nonconfig subtree,
    /// rpc/notification subtrees are exempt from config filtering, and
    /// choice/case have no config status of their own.
    fn effective_content(
        &self,
        parent: SchemaId,
        stmt: Stmt<'_>,
        kind: &SchemaKind,
    ) -> ContentType {
        if matches!(kind, SchemaKind::RpcAction | SchemaKind::Notification) {
            return ContentType::All;
        }
        let parent_node = self.tree.node(parent);
        let inherited = match parent_node.kind {
            SchemaKind::SchemaRoot => ContentType::Config,
            _ => parent_node.content,
        };
        if inherited == ContentType::Nonconfig || matches!(kind, SchemaKind::Choice { .. } | SchemaKind::Case) {
            return inherited;
        }
        match stmt.arg_of("config") {
            Some("false") => ContentType::Nonconfig,
            _ => inherited,
        }
    }

    fn type_stmt<'s>(&self, stmt: Stmt<'s>) -> Result<Stmt<'s>> {
        stmt.find1("type").ok_or_else(|| {
            SchemaBuildError::InvalidTypeRestriction(format!(
                "{} {} without type",
                stmt.keyword(),
                stmt.argument().unwrap_or_default()
            ))
        })
    }

    fn parse_default(&self, data_type: &DataType, text: &str, scope: usize) -> Result<Value> {
        data_type
            .parse_value(text, self.registry.namespace(scope))
            .map_err(SchemaBuildError::InvalidTypeRestriction)
    }

    fn unique_groups(&self, stmt: Stmt<'_>, scope: usize) -> Result<Vec<Vec<SchemaRoute>>> {
        let mut groups = Vec::new();
        for unique in stmt.find_all("unique") {
            let mut routes = Vec::new();
            for descendant in unique.argument().unwrap_or_default().split_whitespace() {
                let mut route = Vec::new();
                for segment in descendant.split('/') {
                    route.push(self.registry.translate_pname(segment, scope)?);
                }
                routes.push(route);
            }
            groups.push(routes);
        }
        Ok(groups)
    }

    /// Key names must resolve to leaf children with scalar, non-empty
    /// types; keys are implicitly config iff the list is config.
    fn resolve_list_keys(&mut self, id: SchemaId, stmt: Stmt<'_>, scope: usize) -> Result<()> {
        let Some(key_arg) = stmt.arg_of("key") else {
            return Ok(());
        };
        let mut keys = Vec::new();
        for name in key_arg.split_whitespace() {
            let qn = self.registry.translate_pname(name, scope)?;
            let child = self
                .tree
                .data_child(id, &qn.name, &qn.module)
                .ok_or_else(|| SchemaBuildError::NonexistentSchemaNode(qn.to_string()))?;
            match &self.tree.node(child).kind {
                SchemaKind::Leaf(spec) => {
                    if matches!(spec.data_type.spec, TypeSpec::Empty) {
                        return Err(SchemaBuildError::BadSchemaNodeType {
                            node: qn.to_string(),
                            expected: "a leaf with a non-empty type",
                        });
                    }
                }
                _ => {
                    return Err(SchemaBuildError::BadSchemaNodeType {
                        node: qn.to_string(),
                        expected: "a leaf",
                    })
                }
            }
            keys.push(qn);
        }
        let list_content = self.tree.node(id).content;
        if let SchemaKind::List(spec) = &mut self.tree.node_mut(id).kind {
            spec.keys = keys.clone();
        }
        // Keys inherit the list's config status.
        for qn in &keys {
            if let Some(child) = self.tree.data_child(id, &qn.name, &qn.module) {
                self.tree.node_mut(child).content = list_content;
            }
        }
        Ok(())
    }

    // ===== uses =====

    fn expand_uses(&mut self, parent: SchemaId, stmt: Stmt<'_>, scope: usize) -> Result<()> {
        if !self.registry.if_features(stmt, scope)? {
            return Ok(());
        }
        let (def_scope, def_id) = self.registry.get_definition(stmt, scope)?;
        let def = self.registry.entry(def_scope).tree.get(def_id);
        let qname = QualName::new(
            def.argument().unwrap_or_default(),
            self.registry.namespace(def_scope).clone(),
        );
        if self.uses_chain.contains(&qname) {
            return Err(SchemaBuildError::CircularDefinition(qname.to_string()));
        }
        self.uses_chain.push(qname.clone());
        trace!(grouping = %qname, "expanding uses");

        // A conditional uses inserts its contents under a synthetic Group
        // so the `when` applies jointly to all inserted children.
        let insertion_point = match stmt.find1("when") {
            Some(when) => {
                let expr = self.parse_expr(when.argument().unwrap_or_default(), scope)?;
                self.alloc_group(parent, qname.name.clone(), scope, Some(expr))
            }
            None => parent,
        };

        // The grouping's contents resolve names in the defining module's
        // context but are inserted bound to the using module's namespace.
        let using_module = self.registry.namespace(scope).clone();
        let result = (|| -> Result<()> {
            for child in data_def_children(def) {
                let built = self.build_child(insertion_point, child, def_scope)?;
                if let Some(built) = built {
                    self.rebind_namespace(built, &using_module);
                }
            }
            for refine in stmt.find_all("refine") {
                self.apply_refine(insertion_point, refine, scope)?;
            }
            for augment in stmt.find_all("augment") {
                self.apply_relative_augment(insertion_point, augment, scope)?;
            }
            Ok(())
        })();
        self.uses_chain.pop();
        result
    }

    /// Rebind a subtree inserted from a grouping to the using module's
    /// namespace.
    fn rebind_namespace(&mut self, id: SchemaId, module: &SmolStr) {
        self.tree.node_mut(id).module = module.clone();
        let children = self.tree.node(id).children.clone();
        for child in children {
            self.rebind_namespace(child, module);
        }
    }

    fn alloc_group(
        &mut self,
        parent: SchemaId,
        name: SmolStr,
        scope: usize,
        when: Option<Arc<CompiledExpr>>,
    ) -> SchemaId {
        let content = self.tree.node(parent).content;
        self.tree.alloc(SchemaNode {
            name,
            module: self.registry.namespace(scope).clone(),
            parent: Some(parent),
            children: Vec::new(),
            when,
            musts: Vec::new(),
            description: None,
            reference: None,
            status: Status::Current,
            content: match self.tree.node(parent).kind {
                SchemaKind::SchemaRoot => ContentType::Config,
                _ => content,
            },
            default_deny: DefaultDeny::None,
            val_count: AtomicU64::new(0),
            kind: SchemaKind::Group,
        })
    }

    /// `refine` modifies specific properties of a named descendant of the
    /// used grouping, with per-property validity rules.
    fn apply_refine(&mut self, root: SchemaId, refine: Stmt<'_>, scope: usize) -> Result<()> {
        let path = refine.argument().unwrap_or_default();
        let target = self.resolve_descendant_path(root, path, scope)?;
        let module = self.registry.namespace(scope).clone();

        if let Some(text) = refine.arg_of("description") {
            self.tree.node_mut(target).description = Some(text.to_string());
        }
        if let Some(text) = refine.arg_of("reference") {
            self.tree.node_mut(target).reference = Some(text.to_string());
        }
        if refine.arg_of("config") == Some("false") {
            self.tree.node_mut(target).content = ContentType::Nonconfig;
        }
        for must in refine.find_all("must") {
            let expr = self.parse_expr(must.argument().unwrap_or_default(), scope)?;
            self.tree.node_mut(target).musts.push(MustConstraint {
                expr,
                error_tag: must.arg_of("error-app-tag").map(String::from),
                error_message: must.arg_of("error-message").map(String::from),
            });
        }

        let mandatory = refine.arg_of("mandatory").map(|m| m == "true");
        let default = refine.arg_of("default").map(String::from);
        let presence = refine.find1("presence").is_some();
        let (min_elements, max_elements) = cardinality(refine)?;
        let has_min = refine.find1("min-elements").is_some();
        let has_max = refine.find1("max-elements").is_some();

        let node = self.tree.node_mut(target);
        match &mut node.kind {
            SchemaKind::Leaf(spec) => {
                if let Some(mandatory) = mandatory {
                    spec.mandatory = mandatory;
                    if mandatory {
                        spec.default = None;
                    }
                }
                if let Some(text) = default {
                    let cooked = spec
                        .data_type
                        .parse_value(&text, &module)
                        .map_err(SchemaBuildError::InvalidTypeRestriction)?;
                    spec.default = Some(cooked);
                }
            }
            SchemaKind::Choice { default_case, mandatory: m } => {
                if let Some(mandatory) = mandatory {
                    *m = mandatory;
                }
                if let Some(text) = default {
                    *default_case = Some(SmolStr::new(text));
                }
            }
            SchemaKind::Container { presence: p } => {
                if presence {
                    *p = true;
                }
            }
            SchemaKind::List(spec) => {
                if has_min {
                    spec.min_elements = min_elements;
                }
                if has_max {
                    spec.max_elements = max_elements;
                }
            }
            SchemaKind::LeafList(spec) => {
                if has_min {
                    spec.min_elements = min_elements;
                }
                if has_max {
                    spec.max_elements = max_elements;
                }
                if let Some(text) = default {
                    let cooked = spec
                        .data_type
                        .parse_value(&text, &module)
                        .map_err(SchemaBuildError::InvalidTypeRestriction)?;
                    spec.defaults = vec![cooked];
                }
            }
            _ => {
                if mandatory.is_some() || default.is_some() || presence || has_min || has_max {
                    return Err(SchemaBuildError::BadSchemaNodeType {
                        node: path.to_string(),
                        expected: "a node the refined property applies to",
                    });
                }
            }
        }
        Ok(())
    }

    // ===== augment =====

    fn apply_augment(&mut self, stmt: Stmt<'_>, scope: usize) -> Result<()> {
        if !self.registry.if_features(stmt, scope)? {
            return Ok(());
        }
        let path = stmt.argument().unwrap_or_default();
        debug!(target = path, module = %self.registry.entry(scope).id, "applying augment");
        let target = self.resolve_schema_path(self.tree.root(), path, scope)?;
        self.augment_into(target, stmt, scope)
    }

    fn apply_relative_augment(
        &mut self,
        root: SchemaId,
        stmt: Stmt<'_>,
        scope: usize,
    ) -> Result<()> {
        if !self.registry.if_features(stmt, scope)? {
            return Ok(());
        }
        let path = stmt.argument().unwrap_or_default();
        let target = self.resolve_descendant_path(root, path, scope)?;
        self.augment_into(target, stmt, scope)
    }

    fn augment_into(&mut self, target: SchemaId, stmt: Stmt<'_>, scope: usize) -> Result<()> {
        // An augment with a `when` inserts its children under a synthetic
        // Group so the condition applies jointly to all of them.
        let insertion_point = match stmt.find1("when") {
            Some(when) => {
                let expr = self.parse_expr(when.argument().unwrap_or_default(), scope)?;
                let name = self.registry.namespace(scope).clone();
                self.alloc_group(target, name, scope, Some(expr))
            }
            None => target,
        };
        for child in data_def_children(stmt) {
            self.build_child(insertion_point, child, scope)?;
        }
        for child in stmt.children() {
            if child.is_builtin() && matches!(child.keyword(), "action" | "notification") {
                self.build_child(insertion_point, child, scope)?;
            }
        }
        Ok(())
    }

    // ===== deviation =====

    fn apply_deviation(&mut self, stmt: Stmt<'_>, scope: usize) -> Result<()> {
        let path = stmt.argument().unwrap_or_default();
        let target = self.resolve_schema_path(self.tree.root(), path, scope)?;
        for deviate in stmt.find_all("deviate") {
            match deviate.argument().unwrap_or_default() {
                "not-supported" => {
                    debug!(target = path, "deviation: not-supported");
                    self.tree.detach(target);
                    return Ok(());
                }
                "add" | "replace" => self.deviate_properties(target, deviate, scope)?,
                "delete" => self.deviate_delete(target, deviate)?,
                other => {
                    return Err(SchemaBuildError::InvalidTypeRestriction(format!(
                        "unknown deviate argument: {other}"
                    )))
                }
            }
        }
        Ok(())
    }

    fn deviate_properties(&mut self, target: SchemaId, deviate: Stmt<'_>, scope: usize) -> Result<()> {
        let module = self.registry.namespace(scope).clone();
        if let Some(type_stmt) = deviate.find1("type") {
            let data_type = build_type(self.registry, scope, type_stmt)?;
            match &mut self.tree.node_mut(target).kind {
                SchemaKind::Leaf(spec) => spec.data_type = data_type,
                SchemaKind::LeafList(spec) => spec.data_type = data_type,
                _ => {
                    return Err(SchemaBuildError::BadSchemaNodeType {
                        node: self.tree.node(target).name.to_string(),
                        expected: "a leaf or leaf-list for a type deviation",
                    })
                }
            }
        }
        for must in deviate.find_all("must") {
            let expr = self.parse_expr(must.argument().unwrap_or_default(), scope)?;
            self.tree.node_mut(target).musts.push(MustConstraint {
                expr,
                error_tag: must.arg_of("error-app-tag").map(String::from),
                error_message: must.arg_of("error-message").map(String::from),
            });
        }
        if deviate.arg_of("config") == Some("false") {
            self.tree.node_mut(target).content = ContentType::Nonconfig;
        }
        let mandatory = deviate.arg_of("mandatory").map(|m| m == "true");
        let default = deviate.arg_of("default").map(String::from);
        let (min_elements, max_elements) = cardinality(deviate)?;
        let has_min = deviate.find1("min-elements").is_some();
        let has_max = deviate.find1("max-elements").is_some();
        let units = deviate.arg_of("units").map(String::from);

        let node = self.tree.node_mut(target);
        match &mut node.kind {
            SchemaKind::Leaf(spec) => {
                if let Some(mandatory) = mandatory {
                    spec.mandatory = mandatory;
                }
                if let Some(text) = default {
                    let cooked = spec
                        .data_type
                        .parse_value(&text, &module)
                        .map_err(SchemaBuildError::InvalidTypeRestriction)?;
                    spec.default = Some(cooked);
                }
                if units.is_some() {
                    spec.data_type.units = units;
                }
            }
            SchemaKind::List(spec) => {
                if has_min {
                    spec.min_elements = min_elements;
                }
                if has_max {
                    spec.max_elements = max_elements;
                }
            }
            SchemaKind::LeafList(spec) => {
                if has_min {
                    spec.min_elements = min_elements;
                }
                if has_max {
                    spec.max_elements = max_elements;
                }
            }
            SchemaKind::Choice { mandatory: m, .. } => {
                if let Some(mandatory) = mandatory {
                    *m = mandatory;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn deviate_delete(&mut self, target: SchemaId, deviate: Stmt<'_>) -> Result<()> {
        if deviate.find1("units").is_some() {
            if let Some(data_type) = match &mut self.tree.node_mut(target).kind {
                SchemaKind::Leaf(spec) => Some(&mut spec.data_type),
                SchemaKind::LeafList(spec) => Some(&mut spec.data_type),
                _ => None,
            } {
                data_type.units = None;
            }
        }
        if deviate.find1("default").is_some() {
            match &mut self.tree.node_mut(target).kind {
                SchemaKind::Leaf(spec) => spec.default = None,
                SchemaKind::LeafList(spec) => spec.defaults.clear(),
                _ => {}
            }
        }
        if let Some(must) = deviate.find1("must") {
            let source = must.argument().unwrap_or_default();
            self.tree
                .node_mut(target)
                .musts
                .retain(|m| m.expr.source != source);
        }
        if let Some(unique) = deviate.find1("unique") {
            let count = unique.argument().unwrap_or_default().split_whitespace().count();
            if let SchemaKind::List(spec) = &mut self.tree.node_mut(target).kind {
                spec.unique.retain(|group| group.len() != count);
            }
        }
        Ok(())
    }

    // ===== path resolution =====

    /// Absolute schema-node-id: `/pfx:a/pfx:b/...`.
    fn resolve_schema_path(&self, from: SchemaId, path: &str, scope: usize) -> Result<SchemaId> {
        let trimmed = path.strip_prefix('/').ok_or_else(|| {
            SchemaBuildError::NonexistentSchemaNode(format!("{path} (not absolute)"))
        })?;
        self.resolve_segments(from, trimmed, path, scope)
    }

    /// Relative descendant schema-node-id used by refine and uses-augment.
    fn resolve_descendant_path(&self, from: SchemaId, path: &str, scope: usize) -> Result<SchemaId> {
        self.resolve_segments(from, path, path, scope)
    }

    fn resolve_segments(
        &self,
        from: SchemaId,
        segments: &str,
        full_path: &str,
        scope: usize,
    ) -> Result<SchemaId> {
        let mut current = from;
        for segment in segments.split('/') {
            let qn = self.registry.translate_pname(segment, scope)?;
            current = self
                .tree
                .schema_child(current, &qn.name, &qn.module)
                .ok_or_else(|| {
                    SchemaBuildError::NonexistentSchemaNode(full_path.to_string())
                })?;
        }
        Ok(current)
    }

    // ===== leafref resolution =====

    /// Resolve every leafref to its target data node and record the
    /// target's type.
    fn resolve_leafrefs(&mut self) -> Result<()> {
        let mut updates: Vec<(SchemaId, DataType)> = Vec::new();
        for id in self.tree.ids() {
            let node = self.tree.node(id);
            let Some(data_type) = node.data_type() else {
                continue;
            };
            if let Some(patched) = self.patch_leafrefs(id, data_type, 0)? {
                updates.push((id, patched));
            }
        }
        for (id, data_type) in updates {
            match &mut self.tree.node_mut(id).kind {
                SchemaKind::Leaf(spec) => spec.data_type = data_type,
                SchemaKind::LeafList(spec) => spec.data_type = data_type,
                _ => {}
            }
        }
        Ok(())
    }

    fn patch_leafrefs(
        &self,
        at: SchemaId,
        data_type: &DataType,
        depth: usize,
    ) -> Result<Option<DataType>> {
        if depth > 32 {
            return Err(SchemaBuildError::InvalidLeafrefPath(
                "leafref chain too deep".to_string(),
            ));
        }
        match &data_type.spec {
            TypeSpec::Leafref {
                compiled_path,
                target: None,
                path,
                require_instance,
            } => {
                let target_id = self.leafref_target(at, compiled_path, path)?;
                let target_type = self
                    .tree
                    .node(target_id)
                    .data_type()
                    .expect("leafref target is a leaf");
                // A chain of leafrefs resolves to the final scalar type.
                let resolved = match self.patch_leafrefs(target_id, target_type, depth + 1)? {
                    Some(patched) => patched,
                    None => target_type.clone(),
                };
                let mut out = data_type.clone();
                out.spec = TypeSpec::Leafref {
                    path: path.clone(),
                    compiled_path: compiled_path.clone(),
                    require_instance: *require_instance,
                    target: Some(Box::new(resolved)),
                };
                Ok(Some(out))
            }
            TypeSpec::Union { members } => {
                let mut changed = false;
                let mut patched_members = Vec::with_capacity(members.len());
                for member in members {
                    match self.patch_leafrefs(at, member, depth + 1)? {
                        Some(patched) => {
                            changed = true;
                            patched_members.push(patched);
                        }
                        None => patched_members.push(member.clone()),
                    }
                }
                if changed {
                    let mut out = data_type.clone();
                    out.spec = TypeSpec::Union {
                        members: patched_members,
                    };
                    Ok(Some(out))
                } else {
                    Ok(None)
                }
            }
            _ => Ok(None),
        }
    }

    /// Static walk of a leafref path over the schema tree. Predicates
    /// (key expressions) are ignored; only parent and child steps occur in
    /// leafref paths.
    fn leafref_target(
        &self,
        from: SchemaId,
        compiled: &CompiledExpr,
        path: &str,
    ) -> Result<SchemaId> {
        let Expr::Path(location) = &compiled.expr else {
            return Err(SchemaBuildError::InvalidLeafrefPath(path.to_string()));
        };
        let mut current = if location.absolute {
            self.tree.root()
        } else {
            from
        };
        for step in &location.steps {
            match (step.axis, &step.test) {
                (Axis::Parent, NodeTest::Node) => {
                    current = self.tree.data_parent(current).unwrap_or(self.tree.root());
                }
                (Axis::Child, NodeTest::Name(qn)) => {
                    current = self
                        .tree
                        .data_child(current, &qn.name, &qn.module)
                        .ok_or_else(|| SchemaBuildError::InvalidLeafrefPath(path.to_string()))?;
                }
                (Axis::SelfAxis, _) => {}
                _ => return Err(SchemaBuildError::InvalidLeafrefPath(path.to_string())),
            }
        }
        match self.tree.node(current).kind {
            SchemaKind::Leaf(_) | SchemaKind::LeafList(_) => Ok(current),
            _ => Err(SchemaBuildError::InvalidLeafrefPath(path.to_string())),
        }
    }
}

/// Data-definition substatements in source order.
fn data_def_children<'s>(stmt: Stmt<'s>) -> impl Iterator<Item = Stmt<'s>> + 's {
    stmt.children()
        .filter(|c| c.is_builtin() && DATA_DEF_KEYWORDS.contains(&c.keyword()))
}

/// Parse `min-elements`/`max-elements`; `unbounded` (or absence) means no
/// upper bound.
fn cardinality(stmt: Stmt<'_>) -> Result<(u64, Option<u64>)> {
    let min_elements = match stmt.arg_of("min-elements") {
        Some(text) => text.parse().map_err(|_| {
            SchemaBuildError::InvalidTypeRestriction(format!("bad min-elements: {text}"))
        })?,
        None => 0,
    };
    let max_elements = match stmt.arg_of("max-elements") {
        None | Some("unbounded") => None,
        Some(text) => Some(text.parse().map_err(|_| {
            SchemaBuildError::InvalidTypeRestriction(format!("bad max-elements: {text}"))
        })?),
    };
    Ok((min_elements, max_elements))
}
