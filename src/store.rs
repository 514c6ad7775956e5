//! Selection state persistence.
//!
//! State lives behind the minimal [`KeyValueStore`] contract. Selected fields
//! and expansion state use separate stores so they can have different
//! lifetimes (for example, fields on disk and expansion in memory for the
//! current session).

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StoreError;
use crate::types::TemplateField;

/// Key namespace for persisted selected fields.
pub const FIELDS_NAMESPACE: &str = "template-fields";

/// Key namespace for expansion state.
pub const EXPANSION_NAMESPACE: &str = "expanded-paths";

/// String key-value storage.
pub trait KeyValueStore: std::fmt::Debug {
    /// Read a value. `Ok(None)` means the key was never written.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// In-memory store, used for session-scoped state and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Directory-backed store: one file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding `key`. Keys are encoded so distinct keys never share a file.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", encode_key(key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StoreError::Io { path, source })
    }
}

fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for b in key.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'.' {
            out.push(b as char);
        } else {
            out.push_str(&format!("_{b:02x}"));
        }
    }
    out
}

/// Persisted state for one resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    pub selected_fields: Vec<TemplateField>,
    pub expanded_paths: BTreeSet<String>,
}

/// Per-resource selection and expansion persistence.
///
/// Reads never fail: missing, unreadable or corrupt entries load as empty
/// state and are logged as warnings.
#[derive(Debug)]
pub struct SelectionStateStore {
    fields: Box<dyn KeyValueStore>,
    expansion: Box<dyn KeyValueStore>,
}

impl SelectionStateStore {
    pub fn new(
        fields: impl KeyValueStore + 'static,
        expansion: impl KeyValueStore + 'static,
    ) -> Self {
        Self {
            fields: Box::new(fields),
            expansion: Box::new(expansion),
        }
    }

    /// Both namespaces in memory.
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new(), MemoryStore::new())
    }

    pub fn load(&self, resource_key: &str) -> SelectionState {
        SelectionState {
            selected_fields: self.load_fields(resource_key),
            expanded_paths: self.load_expansion(resource_key).unwrap_or_default(),
        }
    }

    pub fn load_fields(&self, resource_key: &str) -> Vec<TemplateField> {
        read_json(self.fields.as_ref(), &fields_key(resource_key)).unwrap_or_default()
    }

    /// Saved expansion state, or `None` if the resource was never expanded.
    pub fn load_expansion(&self, resource_key: &str) -> Option<BTreeSet<String>> {
        read_json(self.expansion.as_ref(), &expansion_key(resource_key))
    }

    pub fn save(&mut self, resource_key: &str, state: &SelectionState) -> Result<(), StoreError> {
        self.save_fields(resource_key, &state.selected_fields)?;
        self.save_expansion(resource_key, &state.expanded_paths)
    }

    pub fn save_fields(
        &mut self,
        resource_key: &str,
        fields: &[TemplateField],
    ) -> Result<(), StoreError> {
        write_json(self.fields.as_mut(), &fields_key(resource_key), &fields)
    }

    pub fn save_expansion(
        &mut self,
        resource_key: &str,
        expanded: &BTreeSet<String>,
    ) -> Result<(), StoreError> {
        write_json(self.expansion.as_mut(), &expansion_key(resource_key), expanded)
    }

    /// Persist an empty selection. Expansion state is kept.
    pub fn clear_selection(&mut self, resource_key: &str) -> Result<(), StoreError> {
        self.save_fields(resource_key, &[])
    }
}

fn fields_key(resource_key: &str) -> String {
    format!("{FIELDS_NAMESPACE}:{resource_key}")
}

fn expansion_key(resource_key: &str) -> String {
    format!("{EXPANSION_NAMESPACE}:{resource_key}")
}

fn read_json<T: serde::de::DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = match store.get(key) {
        Ok(raw) => raw?,
        Err(e) => {
            warn!(key, error = %e, "failed to read selection state, using empty state");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "corrupt selection state, using empty state");
            None
        }
    }
}

fn write_json<T: Serialize + ?Sized>(
    store: &mut dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value).map_err(|source| StoreError::Serialize {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &raw)
}
