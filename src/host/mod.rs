//! In-memory host environment
//!
//! The scheduler never owns the tree it annotates. This module provides the
//! host side: an arena document, a page with visibility and child-list
//! notification primitives, and YAML fixtures for building pages.

pub mod document;
pub mod fixture;
pub mod page;

pub use document::{Document, DomError, NodeId, Rect};
pub use fixture::{FragmentSpec, NodeSpec, PageFixture};
pub use page::{
    EntryBatch, IntersectionEntry, IntersectionObserver, MutationBatch, MutationObserver, MutationRecord,
    ObserveError, Page, Viewport,
};
