//! Task record and status
//!
//! A Task is the scheduling record for one eligible node. Its status only
//! moves forward: Pending -> InFlight -> Done.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GlosserError, Result};
use crate::host::NodeId;

/// Identifier minted at discovery time, unique within a scheduler session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }

    /// Parse the value of a task-id marker attribute
    pub fn parse(raw: &str) -> Option<Self> {
        raw.trim().parse().ok().map(Self)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scheduling state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Discovered, waiting for a slot
    Pending,
    /// Claimed by a worker, annotation request outstanding
    InFlight,
    /// Finished, whether or not an annotation was applied
    Done,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }

    /// The only legal successor of this status
    pub fn next(&self) -> Option<TaskStatus> {
        match self {
            TaskStatus::Pending => Some(TaskStatus::InFlight),
            TaskStatus::InFlight => Some(TaskStatus::Done),
            TaskStatus::Done => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InFlight => "in_flight",
            TaskStatus::Done => "done",
        };
        write!(f, "{}", s)
    }
}

/// The unit of scheduling work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Non-owning handle to the node; the node carries the id back as a marker
    pub node: NodeId,
    pub status: TaskStatus,
    /// Stable tie-break between tasks
    pub discovery_order: u64,
}

impl Task {
    pub fn new(id: TaskId, node: NodeId, discovery_order: u64) -> Self {
        Self {
            id,
            node,
            status: TaskStatus::Pending,
            discovery_order,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    /// Move to `to`, which must be the immediate successor of the current status
    pub fn advance(&mut self, to: TaskStatus) -> Result<()> {
        if self.status.next() != Some(to) {
            return Err(GlosserError::InvalidState(format!(
                "task {} cannot move from {} to {}",
                self.id, self.status, to
            )));
        }
        self.status = to;
        Ok(())
    }
}
