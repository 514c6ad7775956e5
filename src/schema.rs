//! Resolved schema model.
//!
//! A resolved schema is a closed set of node shapes. Every `$ref` has been
//! replaced by its target (or by a [`ReferenceStub`] when the target is
//! circular or missing), so consumers can match exhaustively instead of
//! probing loosely-typed JSON.

use serde_json::{Map, Value};

/// JSON key marking that a node was produced by following a `$ref`.
pub const REFERENCE_MARKER: &str = "isReference";

/// JSON key carrying stub details (`reason`, `ref`) in the exported form.
pub const STUB_MARKER: &str = "x-reference-stub";

/// Annotations every node shape carries.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeMeta {
    pub description: Option<String>,
    pub format: Option<String>,
    pub enum_values: Vec<Value>,
    /// True when this node was reached through a `$ref`.
    pub is_reference: bool,
}

/// Discriminant of [`SchemaNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Scalar,
    Object,
    Array,
    Stub,
}

/// A leaf value: string, integer, boolean, number, or an untyped node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScalarNode {
    pub type_name: Option<String>,
    pub meta: NodeMeta,
}

/// A named property of an object node. Order follows the source document.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub schema: SchemaNode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<SchemaNode>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectNode {
    pub properties: Vec<Property>,
    pub required: Vec<String>,
    pub additional_properties: Option<AdditionalProperties>,
    pub meta: NodeMeta,
}

impl ObjectNode {
    pub fn property(&self, name: &str) -> Option<&SchemaNode> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .map(|p| &p.schema)
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.iter().any(|r| r == name)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ArrayNode {
    pub items: Option<Box<SchemaNode>>,
    pub meta: NodeMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubReason {
    /// The reference was already being resolved on the current path.
    Circular,
    /// No definition matched the reference.
    Unresolved,
}

impl StubReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StubReason::Circular => "circular",
            StubReason::Unresolved => "unresolved",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "circular" => Some(StubReason::Circular),
            "unresolved" => Some(StubReason::Unresolved),
            _ => None,
        }
    }
}

/// Placeholder for a reference that could not be expanded.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceStub {
    pub reference: String,
    pub reason: StubReason,
    pub meta: NodeMeta,
}

impl ReferenceStub {
    pub fn circular(reference: &str) -> Self {
        Self::new(
            reference,
            StubReason::Circular,
            format!("Circular reference: {reference}"),
        )
    }

    pub fn unresolved(reference: &str) -> Self {
        Self::new(
            reference,
            StubReason::Unresolved,
            format!("Unresolved reference: {reference}"),
        )
    }

    fn new(reference: &str, reason: StubReason, description: String) -> Self {
        Self {
            reference: reference.to_string(),
            reason,
            meta: NodeMeta {
                description: Some(description),
                is_reference: true,
                ..NodeMeta::default()
            },
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self.reason {
            StubReason::Circular => "object",
            StubReason::Unresolved => "unknown",
        }
    }
}

/// A node of a resolved schema. Never contains a `$ref`.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Scalar(ScalarNode),
    Object(ObjectNode),
    Array(ArrayNode),
    Stub(ReferenceStub),
}

impl SchemaNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            SchemaNode::Scalar(_) => NodeKind::Scalar,
            SchemaNode::Object(_) => NodeKind::Object,
            SchemaNode::Array(_) => NodeKind::Array,
            SchemaNode::Stub(_) => NodeKind::Stub,
        }
    }

    pub fn meta(&self) -> &NodeMeta {
        match self {
            SchemaNode::Scalar(n) => &n.meta,
            SchemaNode::Object(n) => &n.meta,
            SchemaNode::Array(n) => &n.meta,
            SchemaNode::Stub(n) => &n.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut NodeMeta {
        match self {
            SchemaNode::Scalar(n) => &mut n.meta,
            SchemaNode::Object(n) => &mut n.meta,
            SchemaNode::Array(n) => &mut n.meta,
            SchemaNode::Stub(n) => &mut n.meta,
        }
    }

    /// The `type` keyword this node exports with, if any.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            SchemaNode::Scalar(n) => n.type_name.as_deref(),
            SchemaNode::Object(_) => Some("object"),
            SchemaNode::Array(_) => Some("array"),
            SchemaNode::Stub(n) => Some(n.type_name()),
        }
    }

    pub fn is_reference(&self) -> bool {
        self.meta().is_reference
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match self {
            SchemaNode::Object(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayNode> {
        match self {
            SchemaNode::Array(n) => Some(n),
            _ => None,
        }
    }

    /// Look up a nested node by canonical path (`spec.containers[].image`).
    pub fn find(&self, path: &str) -> Option<&SchemaNode> {
        let mut current = self;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            let mut name = segment;
            let mut depth = 0;
            while let Some(stripped) = name.strip_suffix("[]") {
                name = stripped;
                depth += 1;
            }
            current = current.as_object()?.property(name)?;
            for _ in 0..depth {
                current = current.as_array()?.items.as_deref()?;
            }
        }
        Some(current)
    }

    /// Whether a tree node for this schema can be expanded.
    ///
    /// True for objects with properties, and for arrays whose items are such objects.
    pub fn has_child_fields(&self) -> bool {
        match self {
            SchemaNode::Object(o) => !o.properties.is_empty(),
            SchemaNode::Array(a) => a
                .items
                .as_deref()
                .and_then(SchemaNode::as_object)
                .is_some_and(|o| !o.properties.is_empty()),
            _ => false,
        }
    }

    /// Export as JSON Schema-shaped JSON.
    ///
    /// Reference-derived nodes carry `isReference: true`; stubs additionally
    /// carry an `x-reference-stub` object so the export can be read back.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        if let Some(ty) = self.type_name() {
            map.insert("type".to_string(), Value::String(ty.to_string()));
        }

        match self {
            SchemaNode::Scalar(_) => {}
            SchemaNode::Object(o) => {
                if !o.properties.is_empty() || o.additional_properties.is_none() {
                    let props: Map<String, Value> = o
                        .properties
                        .iter()
                        .map(|p| (p.name.clone(), p.schema.to_value()))
                        .collect();
                    map.insert("properties".to_string(), Value::Object(props));
                }
                if !o.required.is_empty() {
                    map.insert(
                        "required".to_string(),
                        Value::Array(o.required.iter().cloned().map(Value::String).collect()),
                    );
                }
                match &o.additional_properties {
                    Some(AdditionalProperties::Allowed(b)) => {
                        map.insert("additionalProperties".to_string(), Value::Bool(*b));
                    }
                    Some(AdditionalProperties::Schema(s)) => {
                        map.insert("additionalProperties".to_string(), s.to_value());
                    }
                    None => {}
                }
            }
            SchemaNode::Array(a) => {
                if let Some(items) = &a.items {
                    map.insert("items".to_string(), items.to_value());
                }
            }
            SchemaNode::Stub(s) => {
                let mut stub = Map::new();
                stub.insert(
                    "reason".to_string(),
                    Value::String(s.reason.as_str().to_string()),
                );
                stub.insert("ref".to_string(), Value::String(s.reference.clone()));
                map.insert(STUB_MARKER.to_string(), Value::Object(stub));
            }
        }

        let meta = self.meta();
        if let Some(description) = &meta.description {
            map.insert(
                "description".to_string(),
                Value::String(description.clone()),
            );
        }
        if let Some(format) = &meta.format {
            map.insert("format".to_string(), Value::String(format.clone()));
        }
        if !meta.enum_values.is_empty() {
            map.insert("enum".to_string(), Value::Array(meta.enum_values.clone()));
        }
        if meta.is_reference {
            map.insert(REFERENCE_MARKER.to_string(), Value::Bool(true));
        }

        Value::Object(map)
    }

    /// Size of the compact JSON export in bytes.
    pub fn serialized_size(&self) -> usize {
        serde_json::to_vec(&self.to_value())
            .map(|v| v.len())
            .unwrap_or(0)
    }
}
