//! Core types shared by the resolver, tree builder and selection state.

use serde::{Deserialize, Serialize};

/// Prefix that marks a resource key as belonging to a CustomResourceDefinition.
pub const CRD_KEY_PREFIX: &str = "crd:";

/// Where a resource's schema comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Core Kubernetes definitions (swagger / OpenAPI document for a cluster version).
    Kubernetes,
    /// A `CustomResourceDefinition` and its `openAPIV3Schema`.
    Crd,
}

/// Kubernetes group/version/kind triple. The core group is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Split an `apiVersion` (`v1`, `apps/v1`) into group and version.
    pub fn from_api_version(api_version: &str, kind: impl Into<String>) -> Self {
        let (group, version) = match api_version.split_once('/') {
            Some((g, v)) => (g, v),
            None => ("", api_version),
        };
        Self::new(group, version, kind)
    }

    /// `apps/v1`, or just `v1` for the core group.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl std::fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.api_version(), self.kind)
    }
}

/// Identity of a resource whose schema is being explored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub source: SourceKind,
    pub gvk: GroupVersionKind,
}

impl ResourceRef {
    /// A core resource addressed by `apiVersion` and `kind`.
    pub fn kubernetes(api_version: &str, kind: impl Into<String>) -> Self {
        Self {
            source: SourceKind::Kubernetes,
            gvk: GroupVersionKind::from_api_version(api_version, kind),
        }
    }

    /// A custom resource addressed by its CRD group, version and kind.
    pub fn crd(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            source: SourceKind::Crd,
            gvk: GroupVersionKind::new(group, version, kind),
        }
    }

    /// Parse a resource key produced by [`ResourceRef::key`].
    ///
    /// Returns `None` when the key has no kind or version segment.
    pub fn parse(key: &str) -> Option<Self> {
        if let Some(rest) = key.strip_prefix(CRD_KEY_PREFIX) {
            let mut parts = rest.splitn(3, '/');
            let group = parts.next()?;
            let version = parts.next()?;
            let kind = parts.next()?;
            if group.is_empty() || version.is_empty() || kind.is_empty() {
                return None;
            }
            return Some(Self::crd(group, version, kind));
        }

        let (api_version, kind) = key.rsplit_once('/')?;
        if api_version.is_empty() || kind.is_empty() || api_version.ends_with('/') {
            return None;
        }
        Some(Self::kubernetes(api_version, kind))
    }

    /// Persistence and cache key: `apiVersion/kind` for core resources,
    /// `crd:group/version/kind` for custom resources.
    pub fn key(&self) -> String {
        match self.source {
            SourceKind::Kubernetes => format!("{}/{}", self.gvk.api_version(), self.gvk.kind),
            SourceKind::Crd => format!(
                "{}{}/{}/{}",
                CRD_KEY_PREFIX, self.gvk.group, self.gvk.version, self.gvk.kind
            ),
        }
    }

    /// Context used when normalizing selected field paths for this resource.
    pub fn context(&self) -> ResourceContext {
        ResourceContext {
            source: self.source,
            kind: self.gvk.kind.clone(),
            resource_key: self.key(),
        }
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// What the path normalizer needs to know about the resource a path was recorded for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceContext {
    pub source: SourceKind,
    pub kind: String,
    pub resource_key: String,
}

/// A field the user selected for a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateField {
    pub path: String,
    pub title: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

impl TemplateField {
    /// A field titled after the last segment of its path.
    pub fn new(path: impl Into<String>, type_name: impl Into<String>) -> Self {
        let path = path.into();
        let title = path
            .rsplit('.')
            .next()
            .unwrap_or(&path)
            .trim_end_matches("[]")
            .to_string();
        Self {
            path,
            title,
            type_name: type_name.into(),
            required: false,
            description: None,
            format: None,
        }
    }
}

impl From<&SchemaTreeNode> for TemplateField {
    fn from(node: &SchemaTreeNode) -> Self {
        Self {
            path: node.path.clone(),
            title: node.name.clone(),
            type_name: node.type_name.clone(),
            required: node.required,
            description: node.description.clone(),
            format: node.format.clone(),
        }
    }
}

/// One node of the navigable schema tree.
///
/// `children` is only populated when the node has been expanded; use
/// `has_children` to decide whether an expander should be shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTreeNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub required: bool,
    pub is_reference: bool,
    pub has_children: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SchemaTreeNode>,
}
