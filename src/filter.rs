//! Field selection filtering - derives the minimal schema spanning a set of selected paths.

use std::collections::BTreeSet;

use crate::path::{has_items_descendant, has_property_descendant, items_path, join};
use crate::schema::{ArrayNode, ObjectNode, Property, SchemaNode};

/// Keep only the selected fields of `schema` and the structure leading to them.
///
/// `selected` must hold canonical paths (see [`crate::path::normalize`]).
/// A selected field keeps its entire subtree. Unselected siblings are dropped
/// at every level, and `required` lists are trimmed to the retained properties.
pub fn filter(schema: &SchemaNode, selected: &BTreeSet<String>) -> SchemaNode {
    filter_node(schema, "", selected)
}

fn filter_node(node: &SchemaNode, path: &str, selected: &BTreeSet<String>) -> SchemaNode {
    match node {
        SchemaNode::Object(obj) => SchemaNode::Object(filter_object(obj, path, selected)),
        SchemaNode::Array(arr) => SchemaNode::Array(filter_array(arr, path, selected)),
        other => other.clone(),
    }
}

fn filter_object(obj: &ObjectNode, path: &str, selected: &BTreeSet<String>) -> ObjectNode {
    let mut properties = Vec::new();

    for prop in &obj.properties {
        let field_path = join(path, &prop.name);
        let is_selected = selected.contains(&field_path);
        let has_selected_descendant = has_property_descendant(selected, &field_path);
        let has_selected_item = has_items_descendant(selected, &field_path);

        if !(is_selected || has_selected_descendant || has_selected_item) {
            continue;
        }

        // Only descend along the path shape that matches the node; a field
        // reached any other way is kept whole.
        let descend = match &prop.schema {
            SchemaNode::Object(_) => has_selected_descendant,
            SchemaNode::Array(_) => has_selected_item,
            _ => false,
        };
        let schema = if !is_selected && descend {
            filter_node(&prop.schema, &field_path, selected)
        } else {
            prop.schema.clone()
        };
        properties.push(Property {
            name: prop.name.clone(),
            schema,
        });
    }

    let required = obj
        .required
        .iter()
        .filter(|r| properties.iter().any(|p| &p.name == *r))
        .cloned()
        .collect();

    ObjectNode {
        properties,
        required,
        additional_properties: None,
        meta: obj.meta.clone(),
    }
}

fn filter_array(arr: &ArrayNode, path: &str, selected: &BTreeSet<String>) -> ArrayNode {
    let item_path = items_path(path);
    ArrayNode {
        items: arr
            .items
            .as_deref()
            .map(|items| Box::new(filter_node(items, &item_path, selected))),
        meta: arr.meta.clone(),
    }
}
