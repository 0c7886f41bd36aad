//! Task registry and discovery
//!
//! The registry is the single source of truth for which tasks exist and what
//! state they are in. Ids are minted monotonically, so iterating the map in
//! key order is iterating in discovery order.
//!
//! Every node carrying the task-id marker has exactly one entry here and
//! every entry's node carries its id. The marker is set in the same
//! synchronous step that inserts the entry.

use std::collections::BTreeMap;

use crate::domain::{Task, TaskId, TaskStatus, TASK_ID_ATTR};
use crate::error::{GlosserError, Result};
use crate::host::{Document, NodeId};
use crate::scheduler::eligibility::{EligibilityFilter, CANDIDATE_TAGS};

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<TaskId, Task>,
    next_id: u64,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `node` as a new pending task if it is eligible and not already marked.
    ///
    /// Returns the minted id, or `None` when nothing changed.
    pub fn register_if_eligible(
        &mut self,
        doc: &mut Document,
        filter: &EligibilityFilter,
        node: NodeId,
    ) -> Option<TaskId> {
        if doc.has_attr(node, TASK_ID_ATTR) || !filter.is_eligible(doc, node) {
            return None;
        }
        let id = TaskId::new(self.next_id);
        if let Err(e) = doc.set_attr(node, TASK_ID_ATTR, id.to_string()) {
            tracing::warn!(node = %node, error = %e, "Could not mark node");
            return None;
        }
        self.next_id += 1;
        self.tasks.insert(id, Task::new(id, node, id.get()));
        tracing::trace!(task_id = %id, node = %node, "Registered task");
        Some(id)
    }

    /// Register every eligible candidate below `root` (exclusive).
    /// Returns the nodes that became tasks.
    pub fn initial_scan(&mut self, doc: &mut Document, filter: &EligibilityFilter, root: NodeId) -> Vec<NodeId> {
        self.scan(doc, filter, root, false)
    }

    /// Register every eligible candidate in an inserted subtree, root included
    pub fn scan_subtree(&mut self, doc: &mut Document, filter: &EligibilityFilter, root: NodeId) -> Vec<NodeId> {
        if !doc.is_attached(root) {
            return Vec::new();
        }
        self.scan(doc, filter, root, true)
    }

    fn scan(&mut self, doc: &mut Document, filter: &EligibilityFilter, root: NodeId, include_root: bool) -> Vec<NodeId> {
        doc.elements_by_tag(root, CANDIDATE_TAGS, include_root)
            .into_iter()
            .filter(|&node| self.register_if_eligible(doc, filter, node).is_some())
            .collect()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Follow a node's task-id marker back to its entry
    pub fn task_for_node(&self, doc: &Document, node: NodeId) -> Option<&Task> {
        let id = doc.attr(node, TASK_ID_ATTR).and_then(TaskId::parse)?;
        self.tasks.get(&id).filter(|task| task.node == node)
    }

    /// Pending -> InFlight
    pub fn claim(&mut self, id: TaskId) -> Result<&Task> {
        self.transition(id, TaskStatus::InFlight)
    }

    /// InFlight -> Done
    pub fn complete(&mut self, id: TaskId) -> Result<&Task> {
        self.transition(id, TaskStatus::Done)
    }

    fn transition(&mut self, id: TaskId, to: TaskStatus) -> Result<&Task> {
        let task = self
            .tasks
            .get_mut(&id)
            .ok_or_else(|| GlosserError::InvalidState(format!("unknown task {}", id)))?;
        task.advance(to)?;
        Ok(task)
    }

    /// Tasks in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Task> {
        self.iter().filter(|t| t.is_pending())
    }

    pub fn has_pending(&self) -> bool {
        self.pending().next().is_some()
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.iter().filter(|t| t.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drop every entry and restart ids at zero
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.next_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PROCESSED_ATTR;
    use crate::host::{FragmentSpec, Rect};

    fn doc_with(specs: Vec<FragmentSpec>) -> (Document, Vec<NodeId>) {
        let mut doc = Document::new();
        let body = doc.body();
        let nodes = specs
            .into_iter()
            .map(|spec| {
                let node = spec.build(&mut doc, Rect::default());
                doc.append_child(body, node).unwrap();
                node
            })
            .collect();
        (doc, nodes)
    }

    #[test]
    fn test_register_marks_node() {
        let (mut doc, nodes) = doc_with(vec![FragmentSpec::new("p").with_text("Hello world")]);
        let mut registry = TaskRegistry::new();
        let filter = EligibilityFilter::default();

        let id = registry.register_if_eligible(&mut doc, &filter, nodes[0]).unwrap();
        assert_eq!(id, TaskId::new(0));
        assert_eq!(doc.attr(nodes[0], TASK_ID_ATTR), Some("0"));
        assert_eq!(registry.get(id).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn test_register_is_idempotent() {
        let (mut doc, nodes) = doc_with(vec![FragmentSpec::new("p").with_text("Hello world")]);
        let mut registry = TaskRegistry::new();
        let filter = EligibilityFilter::default();

        assert!(registry.register_if_eligible(&mut doc, &filter, nodes[0]).is_some());
        assert!(registry.register_if_eligible(&mut doc, &filter, nodes[0]).is_none());
        assert_eq!(registry.len(), 1);
        assert_eq!(doc.attributes(nodes[0]).filter(|(k, _)| *k == TASK_ID_ATTR).count(), 1);
    }

    #[test]
    fn test_ineligible_node_untouched() {
        let (mut doc, nodes) = doc_with(vec![FragmentSpec::new("code").with_text("let x = 1;")]);
        let mut registry = TaskRegistry::new();
        assert!(
            registry
                .register_if_eligible(&mut doc, &EligibilityFilter::default(), nodes[0])
                .is_none()
        );
        assert!(!doc.has_attr(nodes[0], TASK_ID_ATTR));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_initial_scan_discovery_order() {
        let (mut doc, nodes) = doc_with(vec![
            FragmentSpec::new("h1").with_text("Title text"),
            FragmentSpec::new("pre").with_child(FragmentSpec::new("span").with_text("not me")),
            FragmentSpec::new("ul")
                .with_child(FragmentSpec::new("li").with_text("First item"))
                .with_child(FragmentSpec::new("li").with_text("Second item")),
        ]);
        let mut registry = TaskRegistry::new();
        let body = doc.body();
        let found = registry.initial_scan(&mut doc, &EligibilityFilter::default(), body);

        assert_eq!(found.len(), 3);
        assert_eq!(found[0], nodes[0]);
        let orders: Vec<u64> = registry.iter().map(|t| t.discovery_order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_scan_subtree_includes_root() {
        let (mut doc, nodes) = doc_with(vec![
            FragmentSpec::new("div")
                .with_text("Root has text")
                .with_child(FragmentSpec::new("p").with_text("Child text")),
        ]);
        let mut registry = TaskRegistry::new();
        let found = registry.scan_subtree(&mut doc, &EligibilityFilter::default(), nodes[0]);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0], nodes[0]);
    }

    #[test]
    fn test_scan_subtree_skips_detached() {
        let mut doc = Document::new();
        let orphan = FragmentSpec::new("p").with_text("Floating").build(&mut doc, Rect::default());
        let mut registry = TaskRegistry::new();
        assert!(
            registry
                .scan_subtree(&mut doc, &EligibilityFilter::default(), orphan)
                .is_empty()
        );
    }

    #[test]
    fn test_task_for_node_requires_matching_marker() {
        let (mut doc, nodes) = doc_with(vec![
            FragmentSpec::new("p").with_text("First one"),
            FragmentSpec::new("p").with_text("Second one"),
        ]);
        let mut registry = TaskRegistry::new();
        let body = doc.body();
        registry.initial_scan(&mut doc, &EligibilityFilter::default(), body);

        assert_eq!(registry.task_for_node(&doc, nodes[1]).unwrap().id, TaskId::new(1));

        // A copied marker does not alias another node's task
        doc.set_attr(nodes[1], TASK_ID_ATTR, "0").unwrap();
        assert!(registry.task_for_node(&doc, nodes[1]).is_none());
    }

    #[test]
    fn test_claim_and_complete() {
        let (mut doc, nodes) = doc_with(vec![FragmentSpec::new("p").with_text("Hello world")]);
        let mut registry = TaskRegistry::new();
        let id = registry
            .register_if_eligible(&mut doc, &EligibilityFilter::default(), nodes[0])
            .unwrap();

        assert!(registry.complete(id).is_err());
        registry.claim(id).unwrap();
        assert!(registry.claim(id).is_err());
        assert_eq!(registry.count(TaskStatus::InFlight), 1);
        registry.complete(id).unwrap();
        assert_eq!(registry.count(TaskStatus::Done), 1);
        assert!(!registry.has_pending());
    }

    #[test]
    fn test_unknown_task() {
        let mut registry = TaskRegistry::new();
        let err = registry.claim(TaskId::new(9)).unwrap_err();
        assert!(err.to_string().contains("unknown task 9"));
    }

    #[test]
    fn test_clear_restarts_ids() {
        let (mut doc, nodes) = doc_with(vec![
            FragmentSpec::new("p").with_text("First one"),
            FragmentSpec::new("p").with_text("Second one"),
        ]);
        let mut registry = TaskRegistry::new();
        let filter = EligibilityFilter::default();
        registry.register_if_eligible(&mut doc, &filter, nodes[0]);
        registry.clear();
        assert!(registry.is_empty());

        let id = registry.register_if_eligible(&mut doc, &filter, nodes[1]).unwrap();
        assert_eq!(id, TaskId::new(0));
    }

    #[test]
    fn test_processed_node_not_registered() {
        let (mut doc, nodes) = doc_with(vec![FragmentSpec::new("p").with_text("Hello world")]);
        doc.set_attr(nodes[0], PROCESSED_ATTR, "true").unwrap();
        let mut registry = TaskRegistry::new();
        assert!(
            registry
                .register_if_eligible(&mut doc, &EligibilityFilter::default(), nodes[0])
                .is_none()
        );
    }
}
