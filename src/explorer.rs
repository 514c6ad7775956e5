//! Explorer entry points: schema trees and filtered schemas per resource.
//!
//! A resource must have its tree requested (which resolves and caches its
//! schema) before a filtered schema can be produced for it. Resolutions are
//! cached per schema source; children and filtered schemas are served from
//! the source a resource was most recently resolved from.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::SchemaCache;
use crate::error::{ExplorerError, LoadError};
use crate::filter::filter;
use crate::loader::SchemaLoader;
use crate::path::normalize;
use crate::resolver::{resolve, resolve_definition};
use crate::schema::SchemaNode;
use crate::tree::build_children;
use crate::types::{ResourceRef, SchemaTreeNode, SourceKind, TemplateField};

/// Source id under which custom resources are cached; CRDs are not tied to a
/// Kubernetes version.
const CRD_SOURCE_ID: &str = "";

/// Resolves resource schemas from a [`SchemaLoader`] and serves trees and
/// filtered schemas from them.
#[derive(Debug)]
pub struct SchemaExplorer<L> {
    loader: L,
    cache: SchemaCache,
    resolved: HashMap<(String, String), Arc<SchemaNode>>,
    /// Resource key -> source id it was last resolved from.
    current: HashMap<String, String>,
}

impl<L: SchemaLoader> SchemaExplorer<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            cache: SchemaCache::new(),
            resolved: HashMap::new(),
            current: HashMap::new(),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Top-level tree of a core resource from source `source_id`.
    ///
    /// # Errors
    ///
    /// Fails if the key is malformed, the source cannot be loaded, or the
    /// source has no definition for the resource.
    pub fn get_resource_schema_tree(
        &mut self,
        source_id: &str,
        resource_key: &str,
    ) -> Result<Vec<SchemaTreeNode>, ExplorerError> {
        let schema = self.resolve_resource(source_id, resource_key)?;
        Ok(build_children(&schema, "", 0))
    }

    /// Top-level tree of a custom resource.
    pub fn get_crd_schema_tree(
        &mut self,
        group: &str,
        version: &str,
        kind: &str,
    ) -> Result<Vec<SchemaTreeNode>, ExplorerError> {
        let schema = self.resolve_crd(group, version, kind)?;
        Ok(build_children(&schema, "", 0))
    }

    /// Children of the node at `path` in an already loaded resource.
    ///
    /// Unknown paths yield no children.
    pub fn get_children(
        &self,
        resource_key: &str,
        path: &str,
    ) -> Result<Vec<SchemaTreeNode>, ExplorerError> {
        let schema = self.loaded(resource_key)?;
        Ok(schema
            .find(path)
            .map(|node| build_children(node, path, path.split('.').count()))
            .unwrap_or_default())
    }

    /// Minimal schema containing exactly the selected fields of a loaded resource.
    ///
    /// Field paths are normalized first, so paths captured in the CRD
    /// document layout or with a resource prefix still match. The schema is
    /// taken from the source the resource was last resolved from.
    pub fn get_filtered_schema(
        &self,
        resource_key: &str,
        fields: &[TemplateField],
    ) -> Result<SchemaNode, ExplorerError> {
        let schema = self.loaded(resource_key)?;
        let context = parse_key(resource_key)?.context();
        let selected: BTreeSet<String> = fields
            .iter()
            .map(|f| normalize(&f.path, &context))
            .filter(|p| !p.is_empty())
            .collect();
        debug!(resource_key, fields = selected.len(), "filtering schema");
        Ok(filter(&schema, &selected))
    }

    /// Resolve (or return the cached resolution of) a core resource.
    ///
    /// Makes `source_id` the source that later children and filtered
    /// schemas for `resource_key` are served from.
    pub fn resolve_resource(
        &mut self,
        source_id: &str,
        resource_key: &str,
    ) -> Result<Arc<SchemaNode>, ExplorerError> {
        let resource = parse_key(resource_key)?;
        if resource.source == SourceKind::Crd {
            let gvk = resource.gvk;
            return self.resolve_crd(&gvk.group, &gvk.version, &gvk.kind);
        }
        let key = resource.key();
        if let Some(schema) = self.cached(source_id, &key) {
            return Ok(schema);
        }

        let index = self.cache.load_kubernetes(source_id, &self.loader)?;
        let name = index
            .definition_name_for(&resource.gvk)
            .ok_or_else(|| LoadError::DefinitionNotFound {
                resource_key: resource_key.to_string(),
            })?
            .to_string();
        let schema = resolve_definition(&index, &name).ok_or_else(|| {
            LoadError::DefinitionNotFound {
                resource_key: resource_key.to_string(),
            }
        })?;
        info!(source_id, resource_key, definition = %name, "resolved resource schema");
        Ok(self.remember(source_id, key, schema))
    }

    /// Resolve (or return the cached resolution of) a custom resource.
    pub fn resolve_crd(
        &mut self,
        group: &str,
        version: &str,
        kind: &str,
    ) -> Result<Arc<SchemaNode>, ExplorerError> {
        let resource = ResourceRef::crd(group, version, kind);
        let key = resource.key();
        if let Some(schema) = self.cached(CRD_SOURCE_ID, &key) {
            return Ok(schema);
        }

        let source = self.cache.load_crd(&resource.gvk, &self.loader)?;
        let root = source
            .crd
            .root_schema(version)
            .ok_or_else(|| LoadError::InvalidCrd {
                message: format!("{} has no openAPIV3Schema for {version}", source.crd.name),
            })?;
        let schema = resolve(&root, &source.index);
        info!(resource_key = %key, crd = %source.crd.name, "resolved CRD schema");
        Ok(self.remember(CRD_SOURCE_ID, key, schema))
    }

    /// Forget the resolved schemas of a resource, from every source.
    pub fn invalidate(&mut self, resource_key: &str) -> bool {
        let before = self.resolved.len();
        self.resolved.retain(|(_, key), _| key != resource_key);
        self.current.remove(resource_key);
        self.resolved.len() != before
    }

    /// Forget a Kubernetes source: its loaded index and every schema
    /// resolved from it.
    pub fn invalidate_source(&mut self, source_id: &str) -> bool {
        let before = self.resolved.len();
        self.resolved.retain(|(source, _), _| source != source_id);
        self.current.retain(|_, source| source != source_id);
        let dropped_index = self.cache.invalidate_kubernetes(source_id);
        dropped_index || self.resolved.len() != before
    }

    /// Forget every resolved schema and every loaded source.
    pub fn reset(&mut self) {
        self.resolved.clear();
        self.current.clear();
        self.cache.clear();
    }

    fn cached(&mut self, source_id: &str, key: &str) -> Option<Arc<SchemaNode>> {
        let schema = self
            .resolved
            .get(&(source_id.to_string(), key.to_string()))
            .cloned()?;
        self.current.insert(key.to_string(), source_id.to_string());
        Some(schema)
    }

    fn remember(&mut self, source_id: &str, key: String, schema: SchemaNode) -> Arc<SchemaNode> {
        let schema = Arc::new(schema);
        self.current.insert(key.clone(), source_id.to_string());
        self.resolved
            .insert((source_id.to_string(), key), Arc::clone(&schema));
        schema
    }

    fn loaded(&self, resource_key: &str) -> Result<Arc<SchemaNode>, ExplorerError> {
        self.current
            .get(resource_key)
            .and_then(|source| {
                self.resolved
                    .get(&(source.clone(), resource_key.to_string()))
                    .cloned()
            })
            .ok_or_else(|| ExplorerError::ResourceNotLoaded {
                resource_key: resource_key.to_string(),
            })
    }
}

fn parse_key(resource_key: &str) -> Result<ResourceRef, ExplorerError> {
    ResourceRef::parse(resource_key).ok_or_else(|| ExplorerError::InvalidResourceKey {
        key: resource_key.to_string(),
    })
}
