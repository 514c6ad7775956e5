//! Cache of loaded schema sources.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::LoadError;
use crate::index::{CrdDocument, SchemaIndex};
use crate::loader::SchemaLoader;
use crate::types::GroupVersionKind;

/// A loaded CRD together with its definition index.
#[derive(Debug)]
pub struct CrdSource {
    pub crd: CrdDocument,
    pub index: SchemaIndex,
}

impl CrdSource {
    pub fn new(crd: CrdDocument) -> Self {
        let index = SchemaIndex::from_document(crd.document().clone());
        Self { crd, index }
    }
}

/// Loaded definition indexes keyed by source id, and CRDs keyed by the
/// group/version/kinds they serve.
#[derive(Debug, Default)]
pub struct SchemaCache {
    kubernetes: HashMap<String, Arc<SchemaIndex>>,
    crds: HashMap<GroupVersionKind, Arc<CrdSource>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached index for `source_id`, loading it on first use.
    pub fn load_kubernetes(
        &mut self,
        source_id: &str,
        loader: &dyn SchemaLoader,
    ) -> Result<Arc<SchemaIndex>, LoadError> {
        if let Some(index) = self.kubernetes.get(source_id) {
            return Ok(Arc::clone(index));
        }
        debug!(source_id, "definition cache miss");
        let index = Arc::new(loader.load_kubernetes(source_id)?);
        self.kubernetes
            .insert(source_id.to_string(), Arc::clone(&index));
        Ok(index)
    }

    /// Cached CRD serving `gvk`, loading it on first use.
    pub fn load_crd(
        &mut self,
        gvk: &GroupVersionKind,
        loader: &dyn SchemaLoader,
    ) -> Result<Arc<CrdSource>, LoadError> {
        if let Some(source) = self.crds.get(gvk) {
            return Ok(Arc::clone(source));
        }
        debug!(%gvk, "CRD cache miss");
        let crd = loader.load_crd(gvk)?;
        Ok(self.insert_crd(crd))
    }

    pub fn insert_kubernetes(&mut self, source_id: impl Into<String>, index: SchemaIndex) {
        self.kubernetes.insert(source_id.into(), Arc::new(index));
    }

    /// Register a CRD under every version it serves.
    pub fn insert_crd(&mut self, crd: CrdDocument) -> Arc<CrdSource> {
        let source = Arc::new(CrdSource::new(crd));
        for version in &source.crd.versions {
            let gvk = GroupVersionKind::new(&source.crd.group, version, &source.crd.kind);
            self.crds.insert(gvk, Arc::clone(&source));
        }
        source
    }

    pub fn kubernetes(&self, source_id: &str) -> Option<&SchemaIndex> {
        self.kubernetes.get(source_id).map(Arc::as_ref)
    }

    pub fn crd(&self, gvk: &GroupVersionKind) -> Option<&CrdSource> {
        self.crds.get(gvk).map(Arc::as_ref)
    }

    pub fn invalidate_kubernetes(&mut self, source_id: &str) -> bool {
        self.kubernetes.remove(source_id).is_some()
    }

    /// Drop the CRD serving `gvk`, including its other versions.
    pub fn invalidate_crd(&mut self, gvk: &GroupVersionKind) -> bool {
        let Some(source) = self.crds.remove(gvk) else {
            return false;
        };
        self.crds.retain(|_, s| !Arc::ptr_eq(s, &source));
        true
    }

    pub fn clear(&mut self) {
        self.kubernetes.clear();
        self.crds.clear();
    }
}
