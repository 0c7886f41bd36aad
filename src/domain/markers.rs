//! Marker attributes: the only state the scheduler persists on nodes

/// The node's annotation is final; excluded from all future discovery
pub const PROCESSED_ATTR: &str = "data-glosser-processed";

/// Back-reference from a node to its registry entry
pub const TASK_ID_ATTR: &str = "data-glosser-task-id";

/// Pre-annotation text, kept for rollback or inspection
pub const ORIGINAL_TEXT_ATTR: &str = "data-glosser-original";

/// Class carried by every inserted annotation element
pub const ANNOTATION_CLASS: &str = "glosser-annotation";

/// All node attributes removed on teardown
pub const ALL_MARKERS: [&str; 3] = [PROCESSED_ATTR, TASK_ID_ATTR, ORIGINAL_TEXT_ATTR];
