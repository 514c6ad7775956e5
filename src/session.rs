//! Selection session for the active resource.
//!
//! Holds the in-memory selection and expansion state of whichever resource
//! is being explored, and persists every mutation through a
//! [`SelectionStateStore`].

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::SessionError;
use crate::path::is_descendant;
use crate::schema::SchemaNode;
use crate::store::SelectionStateStore;
use crate::tree::{all_expandable_paths, build_tree, initial_expansion, TreeOptions};
use crate::types::{SchemaTreeNode, TemplateField};

/// Result of selecting a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// The field was added; `replaced` lists descendant selections it superseded.
    Selected { replaced: Vec<String> },
    /// An ancestor is already selected and covers this field.
    Absorbed { ancestor: String },
    AlreadySelected,
}

/// Captures which resource a tree computation was started for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLoadTicket {
    resource_key: String,
    generation: u64,
    /// The schema is large enough that the caller should yield (and show a
    /// loading state) before building the tree.
    pub defer: bool,
}

impl TreeLoadTicket {
    pub fn resource_key(&self) -> &str {
        &self.resource_key
    }
}

#[derive(Debug)]
pub struct SelectionSession {
    store: SelectionStateStore,
    options: TreeOptions,
    active: Option<String>,
    generation: u64,
    selected: Vec<TemplateField>,
    expanded: BTreeSet<String>,
    tree_loaded: bool,
}

impl SelectionSession {
    pub fn new(store: SelectionStateStore, options: TreeOptions) -> Self {
        Self {
            store,
            options,
            active: None,
            generation: 0,
            selected: Vec::new(),
            expanded: BTreeSet::new(),
            tree_loaded: false,
        }
    }

    pub fn active_resource(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn selected_fields(&self) -> &[TemplateField] {
        &self.selected
    }

    pub fn expanded_paths(&self) -> &BTreeSet<String> {
        &self.expanded
    }

    /// Whether the active resource's tree has been loaded and its expansion applied.
    pub fn is_tree_loaded(&self) -> bool {
        self.tree_loaded
    }

    pub fn is_selected(&self, path: &str) -> bool {
        self.selected.iter().any(|f| f.path == path)
    }

    pub fn store(&self) -> &SelectionStateStore {
        &self.store
    }

    /// Make `resource_key` the active resource.
    ///
    /// The previous selection is dropped immediately and the saved selection
    /// for the new resource is loaded. Expansion state is left alone until
    /// [`complete_tree_load`](Self::complete_tree_load) runs for the new tree.
    pub fn switch_resource(&mut self, resource_key: &str) {
        if self.active.as_deref() == Some(resource_key) {
            return;
        }
        self.generation += 1;
        self.tree_loaded = false;
        self.active = Some(resource_key.to_string());
        self.selected = self.store.load_fields(resource_key);
        debug!(
            resource_key,
            selected = self.selected.len(),
            "switched active resource"
        );
    }

    /// Start building the tree for the active resource.
    pub fn begin_tree_load(&self, schema: &SchemaNode) -> Result<TreeLoadTicket, SessionError> {
        let resource_key = self.active_key()?.to_string();
        Ok(TreeLoadTicket {
            resource_key,
            generation: self.generation,
            defer: self.options.should_defer(schema),
        })
    }

    /// True if no resource switch happened since `ticket` was issued.
    pub fn is_current(&self, ticket: &TreeLoadTicket) -> bool {
        ticket.generation == self.generation
            && self.active.as_deref() == Some(ticket.resource_key.as_str())
    }

    /// Apply expansion state for a finished tree load.
    ///
    /// Returns `Ok(false)` and changes nothing when the ticket is stale.
    pub fn complete_tree_load(
        &mut self,
        ticket: &TreeLoadTicket,
        root: &SchemaNode,
    ) -> Result<bool, SessionError> {
        if !self.is_current(ticket) {
            debug!(
                resource_key = ticket.resource_key(),
                "discarding stale tree load"
            );
            return Ok(false);
        }

        let saved = self.store.load_expansion(&ticket.resource_key);
        self.expanded = initial_expansion(root, saved.as_ref(), &self.options);
        self.tree_loaded = true;
        if saved.is_none() {
            self.store
                .save_expansion(&ticket.resource_key, &self.expanded)?;
        }
        Ok(true)
    }

    /// The tree for `root` under the current expansion state.
    pub fn tree(&self, root: &SchemaNode) -> Vec<SchemaTreeNode> {
        build_tree(root, &self.expanded)
    }

    /// Select a field, enforcing that no selected path is an ancestor of another.
    pub fn select_field(&mut self, field: TemplateField) -> Result<SelectOutcome, SessionError> {
        let key = self.active_key()?.to_string();

        if self.is_selected(&field.path) {
            return Ok(SelectOutcome::AlreadySelected);
        }
        if let Some(ancestor) = self
            .selected
            .iter()
            .find(|f| is_descendant(&field.path, &f.path))
        {
            return Ok(SelectOutcome::Absorbed {
                ancestor: ancestor.path.clone(),
            });
        }

        let replaced: Vec<String> = self
            .selected
            .iter()
            .filter(|f| is_descendant(&f.path, &field.path))
            .map(|f| f.path.clone())
            .collect();
        self.selected
            .retain(|f| !is_descendant(&f.path, &field.path));
        self.selected.push(field);

        self.store.save_fields(&key, &self.selected)?;
        Ok(SelectOutcome::Selected { replaced })
    }

    /// Remove a selected field. Returns whether it was selected.
    pub fn deselect_field(&mut self, path: &str) -> Result<bool, SessionError> {
        let key = self.active_key()?.to_string();
        let before = self.selected.len();
        self.selected.retain(|f| f.path != path);
        if self.selected.len() == before {
            return Ok(false);
        }
        self.store.save_fields(&key, &self.selected)?;
        Ok(true)
    }

    pub fn clear_selection(&mut self) -> Result<(), SessionError> {
        let key = self.active_key()?.to_string();
        self.selected.clear();
        self.store.clear_selection(&key)?;
        Ok(())
    }

    /// Flip the expansion of `path`. Returns whether it is now expanded.
    pub fn toggle_expanded(&mut self, path: &str) -> Result<bool, SessionError> {
        let key = self.active_key()?.to_string();
        let expanded = if self.expanded.remove(path) {
            false
        } else {
            self.expanded.insert(path.to_string());
            true
        };
        self.store.save_expansion(&key, &self.expanded)?;
        Ok(expanded)
    }

    /// Expand every expandable node of `root`.
    pub fn expand_all(&mut self, root: &SchemaNode) -> Result<(), SessionError> {
        let key = self.active_key()?.to_string();
        self.expanded = all_expandable_paths(root);
        self.store.save_expansion(&key, &self.expanded)?;
        Ok(())
    }

    fn active_key(&self) -> Result<&str, SessionError> {
        self.active.as_deref().ok_or(SessionError::NoActiveResource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SchemaIndex;
    use crate::resolver::resolve;
    use serde_json::json;

    fn session() -> SelectionSession {
        SelectionSession::new(SelectionStateStore::in_memory(), TreeOptions::default())
    }

    fn schema() -> SchemaNode {
        resolve(
            &json!({
                "type": "object",
                "properties": {
                    "metadata": { "type": "object", "properties": { "name": { "type": "string" } } },
                    "spec": {
                        "type": "object",
                        "properties": {
                            "replicas": { "type": "integer" },
                            "template": {
                                "type": "object",
                                "properties": { "labels": { "type": "object" } }
                            }
                        }
                    }
                }
            }),
            &SchemaIndex::from_document(json!({})),
        )
    }

    fn field(path: &str) -> TemplateField {
        TemplateField::new(path, "string")
    }

    #[test]
    fn mutations_require_active_resource() {
        let mut s = session();
        assert!(matches!(
            s.select_field(field("spec")),
            Err(SessionError::NoActiveResource)
        ));
    }

    #[test]
    fn selecting_parent_replaces_descendants() {
        let mut s = session();
        s.switch_resource("apps/v1/Deployment");
        s.select_field(field("spec.replicas")).unwrap();
        s.select_field(field("spec.template.labels")).unwrap();
        s.select_field(field("metadata.name")).unwrap();

        let outcome = s.select_field(field("spec")).unwrap();
        assert_eq!(
            outcome,
            SelectOutcome::Selected {
                replaced: vec!["spec.replicas".into(), "spec.template.labels".into()]
            }
        );
        let paths: Vec<&str> = s.selected_fields().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["metadata.name", "spec"]);
    }

    #[test]
    fn selecting_descendant_of_selected_parent_is_absorbed() {
        let mut s = session();
        s.switch_resource("apps/v1/Deployment");
        s.select_field(field("spec")).unwrap();
        assert_eq!(
            s.select_field(field("spec.replicas")).unwrap(),
            SelectOutcome::Absorbed {
                ancestor: "spec".into()
            }
        );
        assert_eq!(
            s.select_field(field("spec")).unwrap(),
            SelectOutcome::AlreadySelected
        );
        assert_eq!(s.selected_fields().len(), 1);
    }

    #[test]
    fn switching_resources_reloads_selection() {
        let mut s = session();
        s.switch_resource("apps/v1/Deployment");
        s.select_field(field("spec.replicas")).unwrap();

        s.switch_resource("v1/Pod");
        assert!(s.selected_fields().is_empty());

        s.switch_resource("apps/v1/Deployment");
        assert!(s.is_selected("spec.replicas"));
    }

    #[test]
    fn expansion_is_untouched_until_tree_loads() {
        let root = schema();
        let mut s = session();
        s.switch_resource("apps/v1/Deployment");
        let ticket = s.begin_tree_load(&root).unwrap();
        assert!(s.complete_tree_load(&ticket, &root).unwrap());
        s.toggle_expanded("spec.template").unwrap();
        let deployment_expansion = s.expanded_paths().clone();

        s.switch_resource("v1/Pod");
        assert!(!s.is_tree_loaded());
        assert_eq!(s.expanded_paths(), &deployment_expansion);

        let ticket = s.begin_tree_load(&root).unwrap();
        s.complete_tree_load(&ticket, &root).unwrap();
        let expected: BTreeSet<String> =
            ["metadata", "spec"].iter().map(|p| p.to_string()).collect();
        assert_eq!(s.expanded_paths(), &expected);
    }

    #[test]
    fn saved_expansion_restored_on_return() {
        let root = schema();
        let mut s = session();
        s.switch_resource("apps/v1/Deployment");
        let ticket = s.begin_tree_load(&root).unwrap();
        s.complete_tree_load(&ticket, &root).unwrap();
        assert!(!s.toggle_expanded("metadata").unwrap());
        assert!(s.toggle_expanded("spec.template").unwrap());

        s.switch_resource("v1/Pod");
        s.switch_resource("apps/v1/Deployment");
        let ticket = s.begin_tree_load(&root).unwrap();
        s.complete_tree_load(&ticket, &root).unwrap();
        let expected: BTreeSet<String> =
            ["spec", "spec.template"].iter().map(|p| p.to_string()).collect();
        assert_eq!(s.expanded_paths(), &expected);
    }

    #[test]
    fn stale_ticket_is_discarded() {
        let root = schema();
        let mut s = session();
        s.switch_resource("apps/v1/Deployment");
        let ticket = s.begin_tree_load(&root).unwrap();
        s.switch_resource("v1/Pod");
        assert!(!s.is_current(&ticket));
        assert!(!s.complete_tree_load(&ticket, &root).unwrap());
        assert!(!s.is_tree_loaded());
    }

    #[test]
    fn deselect_and_clear() {
        let mut s = session();
        s.switch_resource("v1/Pod");
        s.select_field(field("metadata.name")).unwrap();
        s.select_field(field("spec.replicas")).unwrap();
        assert!(s.deselect_field("metadata.name").unwrap());
        assert!(!s.deselect_field("metadata.name").unwrap());
        s.clear_selection().unwrap();
        assert!(s.selected_fields().is_empty());
        assert!(s.store().load_fields("v1/Pod").is_empty());
    }

    #[test]
    fn tree_reflects_expansion() {
        let root = schema();
        let mut s = session();
        s.switch_resource("apps/v1/Deployment");
        let ticket = s.begin_tree_load(&root).unwrap();
        assert!(!ticket.defer);
        s.complete_tree_load(&ticket, &root).unwrap();
        let tree = s.tree(&root);
        let spec = tree.iter().find(|n| n.name == "spec").unwrap();
        assert_eq!(spec.children.len(), 2);
    }
}
