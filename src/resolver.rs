//! `$ref` resolution - turns raw schema JSON into a [`SchemaNode`] tree.
//!
//! Resolution never fails. References that cannot be found become
//! "unresolved" stubs and references already being expanded on the current
//! path become "circular" stubs, so a partially broken schema still renders.

use std::collections::HashSet;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::index::{SchemaIndex, OBJECT_META_DEFINITION};
use crate::schema::{
    AdditionalProperties, ArrayNode, NodeMeta, ObjectNode, Property, ReferenceStub, ScalarNode,
    SchemaNode, StubReason, REFERENCE_MARKER, STUB_MARKER,
};

/// Pointer to the schema of the first version inside a CRD document.
pub const CRD_SCHEMA_POINTER: &str = "/spec/versions/0/schema/openAPIV3Schema";

/// Reference prefixes naming a top-level definition.
const DEFINITION_PREFIXES: &[&str] = &["#/definitions/", "#/components/schemas/"];

/// Definition names whose target is known to be object metadata.
const OBJECT_META_LOCATIONS: &[&str] = &[
    "/definitions/io.k8s.apimachinery.pkg.apis.meta.v1.ObjectMeta",
    "/components/schemas/io.k8s.apimachinery.pkg.apis.meta.v1.ObjectMeta",
    "/definitions/ObjectMeta",
    "/components/schemas/ObjectMeta",
];

/// Resolve a raw schema node against an index.
///
/// Equivalent to [`resolve_with_visited`] with an empty visited set.
pub fn resolve(node: &Value, index: &SchemaIndex) -> SchemaNode {
    resolve_with_visited(node, index, &HashSet::new())
}

/// Resolve a raw schema node, treating every definition name (or, for
/// references outside the definition sections, full JSON pointer) in
/// `visited` as already being expanded.
///
/// The set is never mutated: a reference extends a copy of it for its own
/// subtree, so sibling properties cannot affect each other's cycle detection.
pub fn resolve_with_visited(
    node: &Value,
    index: &SchemaIndex,
    visited: &HashSet<String>,
) -> SchemaNode {
    let Some(map) = node.as_object() else {
        return SchemaNode::Scalar(ScalarNode::default());
    };

    if let Some(stub) = exported_stub(map) {
        return SchemaNode::Stub(stub);
    }

    if let Some(reference) = reference_of(map) {
        let mut resolved = resolve_reference(reference, index, visited);
        if !matches!(resolved, SchemaNode::Stub(_)) {
            if let Some(description) = map.get("description").and_then(Value::as_str) {
                resolved.meta_mut().description = Some(description.to_string());
            }
        }
        return resolved;
    }

    resolve_shape(map, index, visited)
}

/// Resolve a named definition from the index.
///
/// The definition itself counts as visited, so a self-reference inside it
/// becomes a circular stub at its first occurrence.
pub fn resolve_definition(index: &SchemaIndex, name: &str) -> Option<SchemaNode> {
    let body = index.definition(name)?;
    let visited = HashSet::from([name.to_string()]);
    Some(resolve_with_visited(body, index, &visited))
}

/// Read back a tree exported with [`SchemaNode::to_value`].
///
/// Reference and stub markers are restored; there is nothing left to resolve.
pub fn from_resolved_value(value: &Value) -> SchemaNode {
    resolve(value, &SchemaIndex::from_document(Value::Null))
}

/// Canonical definition name of a reference: its last path segment.
pub fn definition_name(reference: &str) -> &str {
    let trimmed = reference.trim_end_matches('/');
    match trimmed.rsplit('/').next() {
        Some(last) if !last.is_empty() && last != "#" => last,
        _ => reference,
    }
}

/// The structure used for `ObjectMeta` references that cannot be found.
///
/// This is a fixed approximation of `io.k8s.apimachinery.pkg.apis.meta.v1.ObjectMeta`
/// and does not track a particular Kubernetes release.
pub fn fallback_object_meta() -> Value {
    let string_map = json!({
        "type": "object",
        "additionalProperties": { "type": "string" }
    });
    json!({
        "type": "object",
        "description": "ObjectMeta is metadata that all persisted resources must have (built-in approximation).",
        "properties": {
            "name": { "type": "string", "description": "Name must be unique within a namespace." },
            "generateName": { "type": "string", "description": "Optional prefix used by the server to generate a unique name." },
            "namespace": { "type": "string", "description": "Namespace defines the space within which each name must be unique." },
            "uid": { "type": "string", "description": "UID is the unique in time and space value for this object." },
            "resourceVersion": { "type": "string", "description": "An opaque value that represents the internal version of this object." },
            "generation": { "type": "integer", "format": "int64", "description": "A sequence number representing a specific generation of the desired state." },
            "creationTimestamp": { "type": "string", "format": "date-time", "description": "Time at which this object was created." },
            "deletionTimestamp": { "type": "string", "format": "date-time", "description": "Time at which this resource will be deleted." },
            "labels": with_description(&string_map, "Map of string keys and values used to organize and categorize objects."),
            "annotations": with_description(&string_map, "Unstructured key value map stored with a resource."),
            "finalizers": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Must be empty before the object is deleted from the registry."
            },
            "ownerReferences": {
                "type": "array",
                "description": "List of objects depended by this object.",
                "items": {
                    "type": "object",
                    "required": ["apiVersion", "kind", "name", "uid"],
                    "properties": {
                        "apiVersion": { "type": "string" },
                        "kind": { "type": "string" },
                        "name": { "type": "string" },
                        "uid": { "type": "string" },
                        "controller": { "type": "boolean" },
                        "blockOwnerDeletion": { "type": "boolean" }
                    }
                }
            }
        }
    })
}

fn with_description(schema: &Value, description: &str) -> Value {
    let mut schema = schema.clone();
    if let Some(map) = schema.as_object_mut() {
        map.insert(
            "description".to_string(),
            Value::String(description.to_string()),
        );
    }
    schema
}

// --- Internal implementation ---

/// `$ref`, or the Kubernetes OpenAPI v3 `allOf: [{ "$ref": ... }]` wrapper.
fn reference_of(map: &Map<String, Value>) -> Option<&str> {
    if let Some(r) = map.get("$ref").and_then(Value::as_str) {
        return Some(r);
    }
    match map.get("allOf").and_then(Value::as_array) {
        Some(branches) if branches.len() == 1 => branches[0].get("$ref").and_then(Value::as_str),
        _ => None,
    }
}

/// Key a reference is tracked under while its target is being expanded.
///
/// Definition references collapse to the definition name so they match the
/// names seeded by [`resolve_definition`]; any other pointer is keyed by
/// itself, since pointers into a CRD schema often share a last segment.
fn visited_key(reference: &str) -> &str {
    let trimmed = reference.trim_end_matches('/');
    DEFINITION_PREFIXES
        .iter()
        .filter_map(|prefix| trimmed.strip_prefix(prefix))
        .find(|name| !name.is_empty() && !name.contains('/'))
        .unwrap_or(trimmed)
}

fn resolve_reference(reference: &str, index: &SchemaIndex, visited: &HashSet<String>) -> SchemaNode {
    let key = visited_key(reference);
    if visited.contains(key) {
        debug!(reference, "circular schema reference");
        return SchemaNode::Stub(ReferenceStub::circular(reference));
    }

    let fallback;
    let target = match lookup_reference(reference, index) {
        Some(target) => target,
        None if reference.contains("ObjectMeta") => {
            debug!(reference, "using built-in ObjectMeta approximation");
            fallback = fallback_object_meta();
            &fallback
        }
        None => {
            warn!(reference, "unresolved schema reference");
            return SchemaNode::Stub(ReferenceStub::unresolved(reference));
        }
    };

    let mut next = visited.clone();
    next.insert(key.to_string());
    let mut resolved = resolve_with_visited(target, index, &next);
    resolved.meta_mut().is_reference = true;
    resolved
}

/// Search for a reference target, most specific location first.
fn lookup_reference<'a>(reference: &str, index: &'a SchemaIndex) -> Option<&'a Value> {
    let document = index.document();
    let segments: Vec<String> = reference
        .trim_start_matches('#')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect();

    if let Some(found) = traverse(document, &segments) {
        return Some(found);
    }

    if let Some(found) = document
        .pointer(CRD_SCHEMA_POINTER)
        .and_then(|root| traverse(root, &segments))
    {
        debug!(reference, "resolved inside CRD schema");
        return Some(found);
    }

    let name = definition_name(reference);
    if let Some(found) = document
        .get("components")
        .and_then(|c| c.get("schemas"))
        .and_then(|s| s.get(name))
        .or_else(|| index.definition(name))
        .filter(|v| v.is_object())
    {
        debug!(reference, name, "resolved by definition name");
        return Some(found);
    }

    if name.contains("ObjectMeta") {
        let known = OBJECT_META_LOCATIONS
            .iter()
            .find_map(|p| document.pointer(p))
            .or_else(|| {
                index
                    .definition_names()
                    .find(|n| n.ends_with(".ObjectMeta") || *n == OBJECT_META_DEFINITION)
                    .and_then(|n| index.definition(n))
            });
        if known.is_some() {
            debug!(reference, "resolved ObjectMeta from a known location");
        }
        return known;
    }

    None
}

fn traverse<'a>(root: &'a Value, segments: &[String]) -> Option<&'a Value> {
    if segments.is_empty() {
        return None;
    }
    let mut current = root;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(arr) => arr.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    current.is_object().then_some(current)
}

fn resolve_shape(
    map: &Map<String, Value>,
    index: &SchemaIndex,
    visited: &HashSet<String>,
) -> SchemaNode {
    let meta = read_meta(map);
    let type_name = map.get("type").and_then(Value::as_str);
    let properties = map.get("properties").and_then(Value::as_object);

    if type_name == Some("object") || properties.is_some() {
        let properties = properties
            .map(|props| {
                props
                    .iter()
                    .map(|(name, prop)| Property {
                        name: name.clone(),
                        schema: resolve_with_visited(prop, index, visited),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let required = map
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        let additional_properties = match map.get("additionalProperties") {
            Some(Value::Bool(b)) => Some(AdditionalProperties::Allowed(*b)),
            Some(schema @ Value::Object(_)) => Some(AdditionalProperties::Schema(Box::new(
                resolve_with_visited(schema, index, visited),
            ))),
            _ => None,
        };

        return SchemaNode::Object(ObjectNode {
            properties,
            required,
            additional_properties,
            meta,
        });
    }

    if type_name == Some("array") || map.contains_key("items") {
        let items = map
            .get("items")
            .map(|items| Box::new(resolve_with_visited(items, index, visited)));
        return SchemaNode::Array(ArrayNode { items, meta });
    }

    SchemaNode::Scalar(ScalarNode {
        type_name: type_name.map(String::from),
        meta,
    })
}

fn read_meta(map: &Map<String, Value>) -> NodeMeta {
    NodeMeta {
        description: map
            .get("description")
            .and_then(Value::as_str)
            .map(String::from),
        format: map.get("format").and_then(Value::as_str).map(String::from),
        enum_values: map
            .get("enum")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default(),
        is_reference: map
            .get(REFERENCE_MARKER)
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

/// Read back a stub from its exported form.
fn exported_stub(map: &Map<String, Value>) -> Option<ReferenceStub> {
    let marker = map.get(STUB_MARKER)?;
    let reason = StubReason::parse(marker.get("reason")?.as_str()?)?;
    let reference = marker.get("ref")?.as_str()?.to_string();
    let mut meta = read_meta(map);
    meta.is_reference = true;
    Some(ReferenceStub {
        reference,
        reason,
        meta,
    })
}
