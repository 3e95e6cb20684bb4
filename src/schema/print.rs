//! Schema tree output: ASCII art and the JSON digest.

use serde_json::{json, Map, Value as Json};

use super::{SchemaId, SchemaKind, SchemaTree};
use crate::base::ContentType;

/// Options for [`ascii_tree`].
#[derive(Debug, Clone, Copy)]
pub struct TreeOptions {
    /// Show `<type>` after leaf and leaf-list names.
    pub types: bool,
    /// Append validation counters.
    pub val_counts: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            types: true,
            val_counts: false,
        }
    }
}

/// Render the schema tree as ASCII art.
///
/// Lines have the form `<indent>+--<flag> <qualname><suffix> [<type>]`:
/// `rw`/`ro` flags, `?` optional leaf, `*` system-ordered (leaf-)list,
/// `#` user-ordered (leaf-)list, `!` presence container. Nodes removed for
/// unsupported features never reach the tree, so they are not shown.
pub fn ascii_tree(tree: &SchemaTree, options: TreeOptions) -> String {
    let mut out = String::new();
    let children = visible_children(tree, tree.root());
    for (position, &child) in children.iter().enumerate() {
        print_node(
            tree,
            child,
            "",
            position + 1 == children.len(),
            options,
            &mut out,
        );
    }
    out
}

/// Children for display, with transparent Group nodes flattened.
fn visible_children(tree: &SchemaTree, id: SchemaId) -> Vec<SchemaId> {
    let mut out = Vec::new();
    for &child in &tree.node(id).children {
        if matches!(tree.node(child).kind, SchemaKind::Group) {
            out.extend(visible_children(tree, child));
        } else {
            out.push(child);
        }
    }
    out
}

fn print_node(
    tree: &SchemaTree,
    id: SchemaId,
    indent: &str,
    last: bool,
    options: TreeOptions,
    out: &mut String,
) {
    let node = tree.node(id);
    let flag = match node.content {
        ContentType::Nonconfig => "ro",
        _ => "rw",
    };
    let name = tree.instance_name(id);

    out.push_str(indent);
    out.push_str("+--");
    match &node.kind {
        SchemaKind::Choice { .. } => {
            out.push_str(&format!("{flag} ({name})"));
        }
        SchemaKind::Case => {
            out.push_str(&format!(":({name})"));
        }
        _ => {
            out.push_str(&format!("{flag} {name}"));
            out.push_str(suffix(tree, id));
            if options.types {
                if let Some(data_type) = node.data_type() {
                    out.push_str(&format!(" <{}>", data_type.display_name()));
                }
            }
        }
    }
    if options.val_counts {
        out.push_str(&format!(" {{{}}}", node.val_count()));
    }
    out.push('\n');

    let children = visible_children(tree, id);
    let child_indent = format!("{indent}{}  ", if last { " " } else { "|" });
    for (position, &child) in children.iter().enumerate() {
        print_node(
            tree,
            child,
            &child_indent,
            position + 1 == children.len(),
            options,
            out,
        );
    }
}

fn suffix(tree: &SchemaTree, id: SchemaId) -> &'static str {
    let node = tree.node(id);
    match &node.kind {
        SchemaKind::Container { presence: true } => "!",
        SchemaKind::List(spec) if spec.user_ordered => "#",
        SchemaKind::List(_) => "*",
        SchemaKind::LeafList(spec) if spec.user_ordered => "#",
        SchemaKind::LeafList(_) => "*",
        SchemaKind::Leaf(spec) => {
            let is_key = tree.data_parent(id).is_some_and(|parent| {
                match &tree.node(parent).kind {
                    SchemaKind::List(list) => list.keys.contains(&node.qual_name()),
                    _ => false,
                }
            });
            if spec.mandatory || is_key {
                ""
            } else {
                "?"
            }
        }
        _ => "",
    }
}

/// A JSON summary of the schema tree for client use, keyed by schema
/// identifier and mirroring the data hierarchy.
pub fn schema_digest(tree: &SchemaTree) -> Json {
    json!({
        "kind": "root",
        "children": digest_children(tree, tree.root()),
    })
}

fn digest_children(tree: &SchemaTree, id: SchemaId) -> Json {
    let mut children = Map::new();
    for &child in &tree.node(id).children {
        let node = tree.node(child);
        if matches!(node.kind, SchemaKind::Group) {
            if let Json::Object(inner) = digest_children(tree, child) {
                children.extend(inner);
            }
            continue;
        }
        children.insert(tree.instance_name(child).to_string(), digest_node(tree, child));
    }
    Json::Object(children)
}

fn digest_node(tree: &SchemaTree, id: SchemaId) -> Json {
    let node = tree.node(id);
    let mut entry = Map::new();
    let kind = match &node.kind {
        SchemaKind::SchemaRoot => "root",
        SchemaKind::Group => "group",
        SchemaKind::Container { .. } => "container",
        SchemaKind::List(_) => "list",
        SchemaKind::LeafList(_) => "leaf-list",
        SchemaKind::Leaf(_) => "leaf",
        SchemaKind::Choice { .. } => "choice",
        SchemaKind::Case => "case",
        SchemaKind::Anydata => "anydata",
        SchemaKind::Anyxml => "anyxml",
        SchemaKind::RpcAction => "rpc",
        SchemaKind::Input => "input",
        SchemaKind::Output => "output",
        SchemaKind::Notification => "notification",
    };
    entry.insert("kind".into(), json!(kind));
    if node.is_data_node() {
        entry.insert(
            "config".into(),
            json!(node.content != ContentType::Nonconfig),
        );
    }
    if let Some(description) = &node.description {
        entry.insert("description".into(), json!(description));
    }
    match &node.kind {
        SchemaKind::Leaf(spec) => {
            entry.insert("type".into(), json!(spec.data_type.display_name()));
            if spec.mandatory {
                entry.insert("mandatory".into(), json!(true));
            }
            if let Some(default) = &spec.default {
                entry.insert(
                    "default".into(),
                    json!(spec.data_type.canonical_string(default)),
                );
            }
            if let Some(units) = &spec.data_type.units {
                entry.insert("units".into(), json!(units));
            }
        }
        SchemaKind::LeafList(spec) => {
            entry.insert("type".into(), json!(spec.data_type.display_name()));
            if let Some(units) = &spec.data_type.units {
                entry.insert("units".into(), json!(units));
            }
        }
        SchemaKind::Container { presence: true } => {
            entry.insert("presence".into(), json!(true));
        }
        SchemaKind::List(spec) => {
            entry.insert(
                "keys".into(),
                json!(spec
                    .keys
                    .iter()
                    .map(|k| k.name.to_string())
                    .collect::<Vec<_>>()),
            );
        }
        SchemaKind::Choice { mandatory: true, .. } => {
            entry.insert("mandatory".into(), json!(true));
        }
        _ => {}
    }
    if !node.children.is_empty() {
        entry.insert("children".into(), digest_children(tree, id));
    }
    Json::Object(entry)
}
