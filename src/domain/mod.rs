//! Domain types for Glosser
//!
//! Contains the task record, its status machine, and the marker attributes
//! that tie document nodes to tasks.

pub mod markers;
pub mod task;

pub use markers::*;
pub use task::{Task, TaskId, TaskStatus};
