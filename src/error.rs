//! Error types for schema loading, state persistence and exploration.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading a schema source (core definitions or a CRD document).
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid YAML: {source}")]
    InvalidYaml {
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid CustomResourceDefinition: {message}")]
    InvalidCrd { message: String },

    // Lookup errors (exit code 2)
    #[error("no CustomResourceDefinition found for {group}/{version}/{kind}")]
    CrdNotFound {
        group: String,
        version: String,
        kind: String,
    },

    #[error("no schema definition found for resource {resource_key}")]
    DefinitionNotFound { resource_key: String },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Errors raised by a key-value store backend.
///
/// Reads that fail are never surfaced to callers of the selection store; they
/// degrade to empty state. Writes report these so the caller can decide.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot serialize state for {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            StoreError::Io { .. } => 3,
            StoreError::Serialize { .. } => 2,
        }
    }
}

/// Errors from selection session mutations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no active resource; switch to a resource first")]
    NoActiveResource,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SessionError::NoActiveResource => 2,
            SessionError::Store(e) => e.exit_code(),
        }
    }
}

/// Errors surfaced by the explorer entry points.
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("resource {resource_key} has not been loaded; request its schema tree first")]
    ResourceNotLoaded { resource_key: String },

    #[error("invalid resource key \"{key}\": expected apiVersion/kind or crd:group/version/kind")]
    InvalidResourceKey { key: String },
}

impl ExplorerError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ExplorerError::Load(e) => e.exit_code(),
            _ => 2,
        }
    }
}
