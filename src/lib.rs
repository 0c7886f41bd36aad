//! Glosser - viewport-driven incremental annotation of live document trees
//!
//! Glosser discovers text-bearing nodes in a page, annotates them through a
//! slow, fallible service under a small concurrency budget, and prefers the
//! nodes the reader can currently see.

pub mod annotate;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod host;
pub mod ipc;
pub mod observe;
pub mod scheduler;

pub use error::{GlosserError, Result};
