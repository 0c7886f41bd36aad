//! Mutation tracker
//!
//! Wraps the page's child-list primitive for the whole body and re-runs
//! discovery over every inserted subtree.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::host::{Document, MutationBatch, MutationObserver, MutationRecord, NodeId, ObserveError, Page};
use crate::scheduler::eligibility::EligibilityFilter;
use crate::scheduler::registry::TaskRegistry;

pub struct MutationTracker {
    observer: MutationObserver,
}

impl MutationTracker {
    pub fn attach(page: &Arc<Page>) -> Result<(Self, mpsc::UnboundedReceiver<MutationBatch>), ObserveError> {
        let (observer, rx) = page.observe_mutations()?;
        tracing::debug!("Mutation tracker attached");
        Ok((Self { observer }, rx))
    }

    pub fn disconnect(&self) {
        self.observer.disconnect();
    }
}

/// Register eligible nodes from every inserted subtree in `batch`.
/// Returns the newly registered nodes, for the visibility tracker.
pub fn discover_inserted(
    registry: &mut TaskRegistry,
    doc: &mut Document,
    filter: &EligibilityFilter,
    batch: &[MutationRecord],
) -> Vec<NodeId> {
    batch
        .iter()
        .flat_map(|record| record.added.iter().copied())
        .flat_map(|root| registry.scan_subtree(doc, filter, root))
        .collect()
}
