//! Mutable scheduler state, owned by one scheduler instance

use std::collections::HashSet;

use serde::Serialize;

use crate::domain::TaskStatus;
use crate::host::NodeId;
use crate::scheduler::registry::TaskRegistry;
use crate::scheduler::select::{select_next, Budget, Pick};

/// Snapshot of scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub total: usize,
    pub pending: usize,
    pub in_flight: usize,
    pub done: usize,
    pub active: usize,
    pub enabled: bool,
}

#[derive(Debug)]
pub struct SchedulerState {
    pub enabled: bool,
    /// Initial scan finished and trackers attached for the current session
    pub started: bool,
    pub registry: TaskRegistry,
    pub budget: Budget,
    /// Nodes currently inside the pre-fetch region
    pub visible: HashSet<NodeId>,
}

impl SchedulerState {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            enabled: false,
            started: false,
            registry: TaskRegistry::new(),
            budget: Budget::new(max_concurrent),
            visible: HashSet::new(),
        }
    }

    /// Select and claim one task. Claiming and taking a budget slot happen together.
    pub fn claim_next(&mut self) -> Option<Pick> {
        if !self.enabled || !self.budget.has_capacity() {
            return None;
        }
        let pick = select_next(&self.registry, &self.visible)?;
        if let Err(e) = self.registry.claim(pick.task_id()) {
            tracing::error!(task_id = %pick.task_id(), error = %e, "Selected task could not be claimed");
            return None;
        }
        let acquired = self.budget.acquire();
        debug_assert!(acquired, "capacity is checked before selection");
        Some(pick)
    }

    /// Nothing pending and nothing in flight
    pub fn is_idle(&self) -> bool {
        self.budget.active() == 0 && !self.registry.has_pending()
    }

    /// Drop all tasks, visibility and budget. Ids restart at zero.
    pub fn reset(&mut self) {
        self.enabled = false;
        self.started = false;
        self.registry.clear();
        self.budget.reset();
        self.visible.clear();
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            total: self.registry.len(),
            pending: self.registry.count(TaskStatus::Pending),
            in_flight: self.registry.count(TaskStatus::InFlight),
            done: self.registry.count(TaskStatus::Done),
            active: self.budget.active(),
            enabled: self.enabled,
        }
    }
}
