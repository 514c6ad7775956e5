//! Schema definition index for a loaded schema source.
//!
//! A core Kubernetes source is a swagger (`definitions`) or OpenAPI 3
//! (`components.schemas`) document. A CRD source is a single
//! `CustomResourceDefinition` document whose schema lives under
//! `spec.versions[].schema.openAPIV3Schema`.

use std::collections::{BTreeMap, HashMap};

use serde_json::{json, Value};
use tracing::debug;

use crate::error::LoadError;
use crate::types::GroupVersionKind;

/// Canonical name of the Kubernetes object metadata definition.
pub const OBJECT_META_DEFINITION: &str = "io.k8s.apimachinery.pkg.apis.meta.v1.ObjectMeta";

/// Read-only index over a schema document.
///
/// Definitions are stored as JSON pointers into the document, so the index
/// never duplicates the (often very large) definition bodies.
#[derive(Debug, Clone)]
pub struct SchemaIndex {
    document: Value,
    definitions: BTreeMap<String, String>,
    by_gvk: HashMap<GroupVersionKind, String>,
}

impl SchemaIndex {
    /// Index a swagger 2 or OpenAPI 3 document.
    ///
    /// Documents without either section (such as CRDs) produce an empty
    /// definition map but remain usable for direct `$ref` traversal.
    pub fn from_document(document: Value) -> Self {
        let mut definitions = BTreeMap::new();
        let mut by_gvk = HashMap::new();

        for (section, base) in [
            (document.get("definitions"), "/definitions"),
            (
                document.get("components").and_then(|c| c.get("schemas")),
                "/components/schemas",
            ),
        ] {
            let Some(defs) = section.and_then(Value::as_object) else {
                continue;
            };
            for (name, def) in defs {
                definitions
                    .entry(name.clone())
                    .or_insert_with(|| format!("{}/{}", base, escape_pointer(name)));
                for gvk in declared_gvks(def) {
                    by_gvk.entry(gvk).or_insert_with(|| name.clone());
                }
            }
        }

        debug!(
            definitions = definitions.len(),
            resources = by_gvk.len(),
            "indexed schema document"
        );

        Self {
            document,
            definitions,
            by_gvk,
        }
    }

    /// The full source document, used for direct `$ref` traversal.
    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Look up a definition by canonical name.
    pub fn definition(&self, name: &str) -> Option<&Value> {
        let pointer = self.definitions.get(name)?;
        self.document.pointer(pointer)
    }

    pub fn definition_names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    /// Find the definition name describing a resource.
    ///
    /// Prefers the `x-kubernetes-group-version-kind` declaration; otherwise
    /// falls back to a name ending in `.<group>.<version>.<kind>`, where the
    /// core group is spelled `core` and dotted groups use their first label.
    pub fn definition_name_for(&self, gvk: &GroupVersionKind) -> Option<&str> {
        if let Some(name) = self.by_gvk.get(gvk) {
            return Some(name.as_str());
        }

        let group_label = if gvk.group.is_empty() {
            "core"
        } else {
            gvk.group.split('.').next().unwrap_or(&gvk.group)
        };
        let suffix = format!(".{}.{}.{}", group_label, gvk.version, gvk.kind);
        if let Some(name) = self.definitions.keys().find(|n| n.ends_with(&suffix)) {
            return Some(name.as_str());
        }

        let loose = format!(".{}.{}", gvk.version, gvk.kind);
        self.definitions
            .keys()
            .find(|n| n.ends_with(&loose))
            .map(String::as_str)
    }
}

fn declared_gvks(def: &Value) -> Vec<GroupVersionKind> {
    def.get("x-kubernetes-group-version-kind")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| {
                    Some(GroupVersionKind::new(
                        e.get("group").and_then(Value::as_str).unwrap_or(""),
                        e.get("version")?.as_str()?,
                        e.get("kind")?.as_str()?,
                    ))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Escape a key for use as a JSON Pointer segment (RFC 6901).
pub fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// A parsed `CustomResourceDefinition`.
#[derive(Debug, Clone)]
pub struct CrdDocument {
    pub name: String,
    pub group: String,
    pub kind: String,
    pub versions: Vec<String>,
    document: Value,
}

impl CrdDocument {
    /// Validate and wrap a CRD document.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::InvalidCrd` if the document is not a CRD or lacks
    /// `spec.group` / `spec.names.kind`.
    pub fn parse(document: Value) -> Result<Self, LoadError> {
        let kind = document.get("kind").and_then(Value::as_str);
        if kind != Some("CustomResourceDefinition") {
            return Err(LoadError::InvalidCrd {
                message: format!(
                    "expected kind CustomResourceDefinition, got {}",
                    kind.unwrap_or("<none>")
                ),
            });
        }

        let spec = document.get("spec").ok_or_else(|| LoadError::InvalidCrd {
            message: "missing spec".to_string(),
        })?;
        let group = spec
            .get("group")
            .and_then(Value::as_str)
            .ok_or_else(|| LoadError::InvalidCrd {
                message: "missing spec.group".to_string(),
            })?
            .to_string();
        let kind = spec
            .get("names")
            .and_then(|n| n.get("kind"))
            .and_then(Value::as_str)
            .ok_or_else(|| LoadError::InvalidCrd {
                message: "missing spec.names.kind".to_string(),
            })?
            .to_string();
        let name = document
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let mut versions: Vec<String> = spec
            .get("versions")
            .and_then(Value::as_array)
            .map(|vs| {
                vs.iter()
                    .filter_map(|v| v.get("name").and_then(Value::as_str))
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        // apiextensions v1beta1 declares a single top-level version
        if versions.is_empty() {
            if let Some(v) = spec.get("version").and_then(Value::as_str) {
                versions.push(v.to_string());
            }
        }

        Ok(Self {
            name,
            group,
            kind,
            versions,
            document,
        })
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn into_document(self) -> Value {
        self.document
    }

    /// True if this CRD serves the given group/version/kind.
    pub fn matches(&self, gvk: &GroupVersionKind) -> bool {
        self.group == gvk.group
            && self.kind == gvk.kind
            && self.versions.iter().any(|v| v == &gvk.version)
    }

    /// The `openAPIV3Schema` for a version.
    ///
    /// Falls back to the first listed version, then to the legacy
    /// `spec.validation.openAPIV3Schema`.
    pub fn schema_for(&self, version: &str) -> Option<&Value> {
        let spec = self.document.get("spec")?;
        let versions = spec.get("versions").and_then(Value::as_array);

        let listed = versions.and_then(|vs| {
            vs.iter()
                .find(|v| v.get("name").and_then(Value::as_str) == Some(version))
                .or_else(|| vs.first())
        });
        listed
            .and_then(|v| v.get("schema"))
            .and_then(|s| s.get("openAPIV3Schema"))
            .or_else(|| {
                spec.get("validation")
                    .and_then(|v| v.get("openAPIV3Schema"))
            })
    }

    /// Root schema for a custom resource, completed with the object envelope.
    ///
    /// CRD schemas frequently omit `apiVersion`, `kind` and `metadata`; the
    /// missing ones are added so every custom resource tree starts with the
    /// same top-level groups as a core resource.
    pub fn root_schema(&self, version: &str) -> Option<Value> {
        let mut root = self.schema_for(version)?.clone();
        let map = root.as_object_mut()?;
        map.entry("type").or_insert_with(|| json!("object"));

        let props = map
            .entry("properties")
            .or_insert_with(|| Value::Object(Default::default()));
        if let Some(props) = props.as_object_mut() {
            let mut api_version = None;
            let mut kind = None;
            let mut metadata = None;
            let mut rest = serde_json::Map::new();
            for (name, schema) in std::mem::take(props) {
                match name.as_str() {
                    "apiVersion" => api_version = Some(schema),
                    "kind" => kind = Some(schema),
                    "metadata" => metadata = Some(schema),
                    _ => {
                        rest.insert(name, schema);
                    }
                }
            }

            props.insert(
                "apiVersion".to_string(),
                api_version.unwrap_or_else(|| json!({ "type": "string" })),
            );
            props.insert(
                "kind".to_string(),
                kind.unwrap_or_else(|| json!({ "type": "string" })),
            );
            props.insert(
                "metadata".to_string(),
                match metadata {
                    Some(meta) if meta.get("properties").is_some() => meta,
                    _ => json!({ "$ref": format!("#/definitions/{OBJECT_META_DEFINITION}") }),
                },
            );
            props.extend(rest);
        }

        Some(root)
    }
}
