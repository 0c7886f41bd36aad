//! Selection policy and concurrency budget
//!
//! One selection pass:
//! 1. the first pending task, in discovery order, whose node is in the visibility set
//! 2. otherwise the first pending task in discovery order
//! 3. otherwise nothing: the queue is drained
//!
//! Visibility biases the choice; it never gates it.

use std::collections::HashSet;

use crate::domain::TaskId;
use crate::host::NodeId;
use crate::scheduler::registry::TaskRegistry;

/// The outcome of one selection pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    /// A pending task currently inside the pre-fetch region
    Visible(TaskId),
    /// No visible task was pending; first pending in discovery order
    Fallback(TaskId),
}

impl Pick {
    pub fn task_id(&self) -> TaskId {
        match self {
            Pick::Visible(id) | Pick::Fallback(id) => *id,
        }
    }

    pub fn is_visible(&self) -> bool {
        matches!(self, Pick::Visible(_))
    }
}

/// Choose the next task to claim
pub fn select_next(registry: &TaskRegistry, visible: &HashSet<NodeId>) -> Option<Pick> {
    let mut fallback = None;
    for task in registry.pending() {
        if visible.contains(&task.node) {
            return Some(Pick::Visible(task.id));
        }
        fallback.get_or_insert(task.id);
    }
    fallback.map(Pick::Fallback)
}

/// Count of in-flight tasks bounded by `max`. A zero bound is raised to one.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    active: usize,
    max: usize,
}

impl Budget {
    pub fn new(max: usize) -> Self {
        Self { active: 0, max: max.max(1) }
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn has_capacity(&self) -> bool {
        self.active < self.max
    }

    /// Take a slot. Returns false when the budget is full.
    pub fn acquire(&mut self) -> bool {
        if !self.has_capacity() {
            return false;
        }
        self.active += 1;
        true
    }

    pub fn release(&mut self) {
        if self.active == 0 {
            tracing::warn!("Budget released with no active tasks");
            return;
        }
        self.active -= 1;
    }

    pub fn reset(&mut self) {
        self.active = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Document, FragmentSpec, Rect};
    use crate::scheduler::eligibility::EligibilityFilter;

    fn registry_with(n: usize) -> (TaskRegistry, Vec<NodeId>) {
        let mut doc = Document::new();
        let body = doc.body();
        for i in 0..n {
            let node = FragmentSpec::new("p")
                .with_text(&format!("Paragraph number {}", i))
                .build(&mut doc, Rect::default());
            doc.append_child(body, node).unwrap();
        }
        let mut registry = TaskRegistry::new();
        let nodes = registry.initial_scan(&mut doc, &EligibilityFilter::default(), body);
        (registry, nodes)
    }

    #[test]
    fn test_empty_registry() {
        let registry = TaskRegistry::new();
        assert_eq!(select_next(&registry, &HashSet::new()), None);
    }

    #[test]
    fn test_fallback_is_first_pending() {
        let (registry, _) = registry_with(3);
        assert_eq!(
            select_next(&registry, &HashSet::new()),
            Some(Pick::Fallback(TaskId::new(0)))
        );
    }

    #[test]
    fn test_visible_preferred() {
        let (registry, nodes) = registry_with(5);
        let visible: HashSet<NodeId> = [nodes[3], nodes[4]].into_iter().collect();
        let pick = select_next(&registry, &visible).unwrap();
        assert_eq!(pick, Pick::Visible(TaskId::new(3)));
        assert!(pick.is_visible());
    }

    #[test]
    fn test_claimed_tasks_skipped() {
        let (mut registry, nodes) = registry_with(3);
        registry.claim(TaskId::new(0)).unwrap();
        let visible: HashSet<NodeId> = [nodes[0]].into_iter().collect();
        assert_eq!(select_next(&registry, &visible), Some(Pick::Fallback(TaskId::new(1))));
    }

    #[test]
    fn test_drained_queue() {
        let (mut registry, _) = registry_with(2);
        for raw in 0..2 {
            registry.claim(TaskId::new(raw)).unwrap();
        }
        assert_eq!(select_next(&registry, &HashSet::new()), None);
    }

    #[test]
    fn test_budget_bounds() {
        let mut budget = Budget::new(2);
        assert!(budget.acquire());
        assert!(budget.acquire());
        assert!(!budget.acquire());
        assert_eq!(budget.active(), 2);
        budget.release();
        assert!(budget.has_capacity());
        budget.reset();
        assert_eq!(budget.active(), 0);
        budget.release();
        assert_eq!(budget.active(), 0);
    }

    #[test]
    fn test_zero_budget_raised_to_one() {
        let mut budget = Budget::new(0);
        assert_eq!(budget.max(), 1);
        assert!(budget.acquire());
        assert!(!budget.acquire());
    }
}
