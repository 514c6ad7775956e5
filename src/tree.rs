//! Schema tree building.
//!
//! Trees are materialized level by level: a node's children are only built
//! when its path is in the expanded set.

use std::collections::BTreeSet;

use crate::path::{items_path, join};
use crate::schema::{ObjectNode, SchemaNode};
use crate::types::SchemaTreeNode;

/// Serialized size above which tree and filter computation should be deferred
/// until the caller has had a chance to show a loading state.
pub const LARGE_SCHEMA_THRESHOLD_BYTES: usize = 100 * 1024;

/// Nesting limit for materialized children.
pub const MAX_TREE_DEPTH: usize = 64;

/// Options controlling tree materialization.
#[derive(Debug, Clone)]
pub struct TreeOptions {
    /// Expand the top-level groups when a resource has no saved expansion state.
    pub auto_expand_first_level: bool,
    /// See [`LARGE_SCHEMA_THRESHOLD_BYTES`].
    pub large_schema_threshold: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            auto_expand_first_level: true,
            large_schema_threshold: LARGE_SCHEMA_THRESHOLD_BYTES,
        }
    }
}

impl TreeOptions {
    pub fn auto_expand_first_level(mut self, enabled: bool) -> Self {
        self.auto_expand_first_level = enabled;
        self
    }

    pub fn large_schema_threshold(mut self, bytes: usize) -> Self {
        self.large_schema_threshold = bytes;
        self
    }

    /// Whether computation over `schema` should wait for the next scheduling turn.
    pub fn should_defer(&self, schema: &SchemaNode) -> bool {
        schema.serialized_size() > self.large_schema_threshold
    }
}

/// Build the immediate children of `node` without expanding them.
///
/// For an array, children are the properties of its item object, placed
/// under the synthetic `<path_prefix>[]` segment.
pub fn build_children(node: &SchemaNode, path_prefix: &str, depth: usize) -> Vec<SchemaTreeNode> {
    if depth > MAX_TREE_DEPTH {
        return Vec::new();
    }
    match container_of(node, path_prefix) {
        Some((obj, prefix)) => obj
            .properties
            .iter()
            .map(|prop| leaf_entry(&prop.name, &join(&prefix, &prop.name), &prop.schema, obj))
            .collect(),
        None => Vec::new(),
    }
}

/// Build the tree below `root`, materializing children of every expanded path.
pub fn build_tree(root: &SchemaNode, expanded: &BTreeSet<String>) -> Vec<SchemaTreeNode> {
    expand(root, "", 0, expanded)
}

fn expand(
    node: &SchemaNode,
    path_prefix: &str,
    depth: usize,
    expanded: &BTreeSet<String>,
) -> Vec<SchemaTreeNode> {
    let mut children = build_children(node, path_prefix, depth);
    let Some((obj, _)) = container_of(node, path_prefix) else {
        return children;
    };
    for child in &mut children {
        if !child.has_children || !expanded.contains(&child.path) {
            continue;
        }
        if let Some(schema) = obj.property(&child.name) {
            child.children = expand(schema, &child.path, depth + 1, expanded);
        }
    }
    children
}

/// Paths of the top-level nodes that can be expanded.
pub fn first_level_paths(root: &SchemaNode) -> BTreeSet<String> {
    build_children(root, "", 0)
        .into_iter()
        .filter(|n| n.has_children)
        .map(|n| n.path)
        .collect()
}

/// Every expandable path in the schema, for a fully expanded view.
pub fn all_expandable_paths(root: &SchemaNode) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_expandable(root, "", 0, &mut out);
    out
}

fn collect_expandable(node: &SchemaNode, prefix: &str, depth: usize, out: &mut BTreeSet<String>) {
    let Some((obj, prefix)) = container_of(node, prefix) else {
        return;
    };
    if depth > MAX_TREE_DEPTH {
        return;
    }
    for prop in &obj.properties {
        if prop.schema.has_child_fields() {
            let path = join(&prefix, &prop.name);
            collect_expandable(&prop.schema, &path, depth + 1, out);
            out.insert(path);
        }
    }
}

/// Expansion state for a freshly loaded tree.
///
/// Saved state is restored verbatim. Without it, only the first level is
/// expanded (or nothing, if auto-expansion is disabled).
pub fn initial_expansion(
    root: &SchemaNode,
    saved: Option<&BTreeSet<String>>,
    options: &TreeOptions,
) -> BTreeSet<String> {
    match saved {
        Some(saved) => saved.clone(),
        None if options.auto_expand_first_level => first_level_paths(root),
        None => BTreeSet::new(),
    }
}

/// The object whose properties become children, and the path prefix they live under.
fn container_of<'a>(node: &'a SchemaNode, path_prefix: &str) -> Option<(&'a ObjectNode, String)> {
    match node {
        SchemaNode::Object(obj) => Some((obj, path_prefix.to_string())),
        SchemaNode::Array(arr) => {
            let items = arr.items.as_deref()?.as_object()?;
            Some((items, items_path(path_prefix)))
        }
        _ => None,
    }
}

fn leaf_entry(name: &str, path: &str, schema: &SchemaNode, parent: &ObjectNode) -> SchemaTreeNode {
    let meta = schema.meta();
    SchemaTreeNode {
        name: name.to_string(),
        path: path.to_string(),
        type_name: schema.type_name().unwrap_or("any").to_string(),
        description: meta.description.clone(),
        format: meta.format.clone(),
        required: parent.is_required(name),
        is_reference: schema.is_reference(),
        has_children: schema.has_child_fields(),
        children: Vec::new(),
    }
}
