//! Viewport-driven incremental annotation scheduler
//!
//! This module provides:
//! - **Eligibility**: which nodes are candidates for annotation
//! - **Registry**: the task per eligible node, keyed by a marker attribute
//! - **Selection**: visible-first choice under a concurrency budget
//! - **Worker and mutator**: one annotation request per task, applied to the tree
//! - **AnnotationScheduler**: ties the pieces to a page's notification primitives
//!
//! # Example
//!
//! ```ignore
//! use glosser::annotate::MockAnnotator;
//! use glosser::host::PageFixture;
//! use glosser::scheduler::{AnnotationScheduler, SchedulerConfig};
//!
//! let page = PageFixture::load("page.yml")?.into_page();
//! let scheduler = AnnotationScheduler::new(page, Arc::new(MockAnnotator::new()), SchedulerConfig::default());
//! scheduler.enable();
//! scheduler.drained().await;
//! ```

pub mod eligibility;
pub mod manager;
pub mod mutator;
pub mod registry;
pub mod select;
pub mod state;
pub mod worker;

pub use eligibility::{
    source_text, EligibilityFilter, SourceScript, CANDIDATE_TAGS, DEFAULT_MIN_TEXT_LEN, EXCLUDED_CLASS_FRAGMENTS,
    EXCLUDED_TAGS,
};
pub use manager::{
    AnnotationScheduler, SchedulerConfig, DEFAULT_MAX_CONCURRENT, DEFAULT_OBSERVER_RETRY, DEFAULT_PREFETCH_MARGIN,
};
pub use mutator::{ApplyOutcome, Placement, Presentation};
pub use registry::TaskRegistry;
pub use select::{select_next, Budget, Pick};
pub use state::{SchedulerState, SchedulerStats};
pub use worker::{Claim, SkipReason, WorkOutcome};
