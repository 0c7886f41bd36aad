//! Visibility tracker
//!
//! Wraps the page's intersection primitive with the pre-fetch margin and
//! folds entry batches into the visibility set. Exits only shrink the set;
//! a task that was claimed is never cancelled for scrolling away.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::host::{Document, EntryBatch, IntersectionEntry, IntersectionObserver, NodeId, ObserveError, Page};
use crate::scheduler::registry::TaskRegistry;

/// Node handles currently inside the pre-fetch region
pub type VisibilitySet = HashSet<NodeId>;

pub struct VisibilityTracker {
    observer: IntersectionObserver,
    margin: f64,
}

impl VisibilityTracker {
    pub fn attach(page: &Arc<Page>, margin: f64) -> Result<(Self, mpsc::UnboundedReceiver<EntryBatch>), ObserveError> {
        let (observer, rx) = page.intersection_observer(margin)?;
        tracing::debug!(margin, "Visibility tracker attached");
        Ok((Self { observer, margin }, rx))
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Start tracking newly registered nodes
    pub fn observe(&self, nodes: &[NodeId]) {
        if nodes.is_empty() {
            return;
        }
        if let Err(e) = self.observer.observe(nodes) {
            tracing::warn!(error = %e, count = nodes.len(), "Could not observe nodes");
        }
    }

    pub fn disconnect(&self) {
        self.observer.disconnect();
    }
}

/// Fold one batch into `visible`. Returns true when some entering node maps
/// to a pending task, i.e. the scheduler should run once for this batch.
pub fn apply_visibility_batch(
    visible: &mut VisibilitySet,
    registry: &TaskRegistry,
    doc: &Document,
    batch: &[IntersectionEntry],
) -> bool {
    let mut signal = false;
    for entry in batch {
        if !entry.is_intersecting {
            visible.remove(&entry.node);
            continue;
        }
        visible.insert(entry.node);
        if registry
            .task_for_node(doc, entry.node)
            .is_some_and(|task| task.is_pending())
        {
            signal = true;
        }
    }
    signal
}
