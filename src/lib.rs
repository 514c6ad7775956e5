//! Kubernetes Field Selection
//!
//! Resolves Kubernetes and CustomResourceDefinition OpenAPI schemas into
//! navigable trees and derives minimal sub-schemas from a set of selected
//! field paths.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeSet;
//! use kube_field_select::{filter, resolve, SchemaIndex};
//! use serde_json::json;
//!
//! let document = json!({
//!     "definitions": {
//!         "io.k8s.api.core.v1.Container": {
//!             "type": "object",
//!             "properties": {
//!                 "name": { "type": "string" },
//!                 "image": { "type": "string" }
//!             }
//!         }
//!     }
//! });
//! let index = SchemaIndex::from_document(document);
//!
//! let pod_spec = json!({
//!     "type": "object",
//!     "properties": {
//!         "containers": {
//!             "type": "array",
//!             "items": { "$ref": "#/definitions/io.k8s.api.core.v1.Container" }
//!         },
//!         "hostname": { "type": "string" }
//!     }
//! });
//! let resolved = resolve(&pod_spec, &index);
//!
//! let selected: BTreeSet<String> = ["containers[].image".to_string()].into();
//! let minimal = filter(&resolved, &selected).to_value();
//!
//! // Only the path to the selected field survives
//! assert!(minimal["properties"].get("hostname").is_none());
//! assert!(minimal["properties"]["containers"]["items"]["properties"]
//!     .get("name")
//!     .is_none());
//! assert_eq!(
//!     minimal["properties"]["containers"]["items"]["properties"]["image"]["type"],
//!     "string"
//! );
//! ```
//!
//! # Field paths
//!
//! | Path | Meaning |
//! |------|---------|
//! | `spec.replicas` | Property `replicas` of object `spec` |
//! | `spec.containers[]` | Items of array `containers` |
//! | `spec.containers[].image` | Property `image` of every container |
//!
//! Paths captured in other layouts (`properties.spec...`, a leading resource
//! kind, the CRD document layout) are normalized to this form before
//! filtering.

mod cache;
mod error;
mod explorer;
mod filter;
mod index;
mod loader;
pub mod logging;
mod path;
mod resolver;
mod schema;
mod session;
mod store;
mod tree;
mod types;

pub use cache::{CrdSource, SchemaCache};
pub use error::{ExplorerError, LoadError, SessionError, StoreError};
pub use explorer::SchemaExplorer;
pub use filter::filter;
pub use index::{CrdDocument, SchemaIndex, OBJECT_META_DEFINITION};
pub use loader::{
    is_url, load_documents_str, load_schema, load_schema_auto, load_schema_str, DocumentLoader,
    FsSchemaLoader, SchemaLoader,
};
pub use path::{is_descendant, normalize as normalize_path};
pub use resolver::{
    fallback_object_meta, from_resolved_value, resolve, resolve_definition, resolve_with_visited,
};
pub use schema::{
    AdditionalProperties, ArrayNode, NodeKind, NodeMeta, ObjectNode, Property, ReferenceStub,
    ScalarNode, SchemaNode, StubReason,
};
pub use session::{SelectOutcome, SelectionSession, TreeLoadTicket};
pub use store::{FileStore, KeyValueStore, MemoryStore, SelectionState, SelectionStateStore};
pub use tree::{
    all_expandable_paths, build_children, build_tree, first_level_paths, initial_expansion,
    TreeOptions, LARGE_SCHEMA_THRESHOLD_BYTES,
};
pub use types::{
    GroupVersionKind, ResourceContext, ResourceRef, SchemaTreeNode, SourceKind, TemplateField,
};

#[cfg(feature = "remote")]
pub use loader::load_schema_url;
