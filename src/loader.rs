//! Schema loading from files, strings and HTTP URLs.
//!
//! Documents may be JSON or YAML. Schema sources are exposed through the
//! [`SchemaLoader`] trait: one method for a Kubernetes version's definitions,
//! one for a CRD by group/version/kind.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::LoadError;
use crate::index::{CrdDocument, SchemaIndex};
use crate::types::GroupVersionKind;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// File extensions considered when scanning for documents.
const DOCUMENT_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// Source of schema documents.
pub trait SchemaLoader {
    /// Load and index the core definitions for a Kubernetes version (or other source id).
    fn load_kubernetes(&self, source_id: &str) -> Result<SchemaIndex, LoadError>;

    /// Load the CRD serving `gvk`.
    fn load_crd(&self, gvk: &GroupVersionKind) -> Result<CrdDocument, LoadError>;
}

/// Load a schema document from a file path.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist, or a parse
/// error if it is neither valid JSON nor a YAML mapping.
pub fn load_schema(path: &Path) -> Result<Value, LoadError> {
    let content = read_file(path)?;
    load_schema_str(&content)
}

/// Load a schema document from a JSON or YAML string.
///
/// Content starting with `{` or `[` is parsed as JSON, anything else as YAML.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` / `LoadError::InvalidYaml` on parse
/// failure, and `LoadError::InvalidYaml` if a YAML document is not a mapping.
pub fn load_schema_str(content: &str) -> Result<Value, LoadError> {
    if looks_like_json(content) {
        return serde_json::from_str(content).map_err(|source| LoadError::InvalidJson { source });
    }
    let value: Value =
        serde_yaml::from_str(content).map_err(|source| LoadError::InvalidYaml { source })?;
    if !value.is_object() {
        return Err(LoadError::InvalidYaml {
            source: <serde_yaml::Error as serde::de::Error>::custom(
                "expected a mapping at the document root",
            ),
        });
    }
    Ok(value)
}

/// Load every document from a possibly multi-document YAML (or single JSON) string.
///
/// Empty YAML documents are skipped.
pub fn load_documents_str(content: &str) -> Result<Vec<Value>, LoadError> {
    if looks_like_json(content) {
        return Ok(vec![load_schema_str(content)?]);
    }
    let mut docs = Vec::new();
    for de in serde_yaml::Deserializer::from_str(content) {
        let value = Value::deserialize(de).map_err(|source| LoadError::InvalidYaml { source })?;
        if !value.is_null() {
            docs.push(value);
        }
    }
    Ok(docs)
}

/// Load a schema from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::NetworkError` if the request fails, or a parse error
/// if the body is not a JSON or YAML document.
#[cfg(feature = "remote")]
pub fn load_schema_url(url: &str) -> Result<Value, LoadError> {
    let network = |source| LoadError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    let response = client
        .get(url)
        .send()
        .map_err(network)?
        .error_for_status()
        .map_err(network)?;

    let body = response.text().map_err(network)?;
    info!(url, bytes = body.len(), "fetched schema document");
    load_schema_str(&body)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a schema from a file path or URL.
///
/// URL loading requires the `remote` feature.
pub fn load_schema_auto(source: &str) -> Result<Value, LoadError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_schema_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(LoadError::FileNotFound {
                path: PathBuf::from(source),
            })
        }
    } else {
        load_schema(Path::new(source))
    }
}

/// Filesystem layout of schema sources.
///
/// Kubernetes definitions are looked up as `<kubernetes_dir>/<id>.json`,
/// `<id>.yaml`, `<id>/swagger.json` or `<id>/openapi.json`. CRDs are found by
/// scanning `crd_dir` recursively for documents of kind
/// `CustomResourceDefinition`.
#[derive(Debug, Clone)]
pub struct FsSchemaLoader {
    pub kubernetes_dir: PathBuf,
    pub crd_dir: PathBuf,
}

impl FsSchemaLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            kubernetes_dir: root.join("kubernetes"),
            crd_dir: root.join("crds"),
        }
    }

    pub fn with_kubernetes_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.kubernetes_dir = dir.into();
        self
    }

    pub fn with_crd_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.crd_dir = dir.into();
        self
    }

    fn kubernetes_candidates(&self, source_id: &str) -> Vec<PathBuf> {
        vec![
            self.kubernetes_dir.join(format!("{source_id}.json")),
            self.kubernetes_dir.join(format!("{source_id}.yaml")),
            self.kubernetes_dir.join(source_id).join("swagger.json"),
            self.kubernetes_dir.join(source_id).join("openapi.json"),
        ]
    }
}

impl SchemaLoader for FsSchemaLoader {
    fn load_kubernetes(&self, source_id: &str) -> Result<SchemaIndex, LoadError> {
        let candidates = self.kubernetes_candidates(source_id);
        let path = candidates
            .iter()
            .find(|p| p.is_file())
            .ok_or_else(|| LoadError::FileNotFound {
                path: candidates[0].clone(),
            })?;
        info!(source_id, path = %path.display(), "loading Kubernetes definitions");
        Ok(SchemaIndex::from_document(load_schema(path)?))
    }

    fn load_crd(&self, gvk: &GroupVersionKind) -> Result<CrdDocument, LoadError> {
        info!(crd_dir = %self.crd_dir.display(), %gvk, "scanning for CRD");
        for entry in WalkDir::new(&self.crd_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.path();
            let is_document = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| DOCUMENT_EXTENSIONS.contains(&e));
            if !is_document {
                continue;
            }

            let docs = match read_file(path).and_then(|c| load_documents_str(&c)) {
                Ok(docs) => docs,
                Err(e) => {
                    debug!("skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            if let Some(crd) = find_crd(docs, gvk) {
                debug!(path = %path.display(), name = %crd.name, "found CRD");
                return Ok(crd);
            }
        }

        Err(LoadError::CrdNotFound {
            group: gvk.group.clone(),
            version: gvk.version.clone(),
            kind: gvk.kind.clone(),
        })
    }
}

/// Loader over a single in-memory document.
///
/// The document serves as the definitions for every source id and, if it is
/// a CRD, as the CRD for the group/version/kinds it declares.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    document: Value,
}

impl DocumentLoader {
    pub fn new(document: Value) -> Self {
        Self { document }
    }

    pub fn is_crd(&self) -> bool {
        self.document.get("kind").and_then(Value::as_str) == Some("CustomResourceDefinition")
    }

    pub fn document(&self) -> &Value {
        &self.document
    }
}

impl SchemaLoader for DocumentLoader {
    fn load_kubernetes(&self, _source_id: &str) -> Result<SchemaIndex, LoadError> {
        Ok(SchemaIndex::from_document(self.document.clone()))
    }

    fn load_crd(&self, gvk: &GroupVersionKind) -> Result<CrdDocument, LoadError> {
        let crd = CrdDocument::parse(self.document.clone())?;
        if crd.matches(gvk) {
            Ok(crd)
        } else {
            Err(LoadError::CrdNotFound {
                group: gvk.group.clone(),
                version: gvk.version.clone(),
                kind: gvk.kind.clone(),
            })
        }
    }
}

fn find_crd(docs: Vec<Value>, gvk: &GroupVersionKind) -> Option<CrdDocument> {
    docs.into_iter()
        .filter_map(|doc| CrdDocument::parse(doc).ok())
        .find(|crd| crd.matches(gvk))
}

fn read_file(path: &Path) -> Result<String, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

fn looks_like_json(content: &str) -> bool {
    let trimmed = content.trim_start();
    trimmed.starts_with('{') || trimmed.starts_with('[')
}
