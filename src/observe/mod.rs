//! Adapters over the page's notification primitives

pub mod mutation;
pub mod visibility;

pub use mutation::{discover_inserted, MutationTracker};
pub use visibility::{apply_visibility_batch, VisibilitySet, VisibilityTracker};
