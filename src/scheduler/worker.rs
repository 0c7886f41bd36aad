//! Annotation worker: drives one claimed task to its end
//!
//! The worker reads the node's direct text, calls the annotation service and
//! hands a non-empty result to the tree mutator. Every failure ends the task
//! without an annotation. Releasing the budget is the caller's job and
//! happens whatever this function returns.

use std::fmt;

use crate::annotate::Annotator;
use crate::domain::{TaskId, PROCESSED_ATTR, TASK_ID_ATTR};
use crate::host::{NodeId, Page};
use crate::scheduler::eligibility::source_text;
use crate::scheduler::mutator::{self, ApplyOutcome, Placement};

/// A task taken off the queue by one selection pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub task_id: TaskId,
    pub node: NodeId,
    /// Scheduler session the claim belongs to
    pub session: u64,
    pub visible: bool,
}

/// Why a task ended without an annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The node no longer carries this claim's task id
    Unmarked,
    TooShort,
    ServiceFailed,
    EmptyAnnotation,
    AlreadyProcessed,
    /// The node or one of its ancestors was removed from the tree
    Detached,
    /// Scheduler was torn down while the request was outstanding
    Stale,
    NotInserted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::Unmarked => "unmarked",
            SkipReason::TooShort => "too short",
            SkipReason::ServiceFailed => "service failed",
            SkipReason::EmptyAnnotation => "empty annotation",
            SkipReason::AlreadyProcessed => "already processed",
            SkipReason::Detached => "detached",
            SkipReason::Stale => "stale session",
            SkipReason::NotInserted => "not inserted",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    Applied(Placement),
    Skipped(SkipReason),
}

/// Settings the worker needs from the scheduler
#[derive(Debug, Clone, Copy)]
pub struct WorkerContext<'a> {
    pub target_language: &'a str,
    pub min_text_len: usize,
}

/// Run one claimed task. `is_current` is checked under the page lock right
/// before the tree is touched.
pub async fn run<A, F>(claim: &Claim, page: &Page, annotator: &A, ctx: WorkerContext<'_>, is_current: F) -> WorkOutcome
where
    A: Annotator + ?Sized,
    F: Fn() -> bool,
{
    let marker = claim.task_id.to_string();
    let read = page.with_document(|doc| {
        if doc.attr(claim.node, TASK_ID_ATTR) != Some(marker.as_str()) {
            return Err(SkipReason::Unmarked);
        }
        if doc.has_attr(claim.node, PROCESSED_ATTR) {
            return Err(SkipReason::AlreadyProcessed);
        }
        if !doc.is_attached(claim.node) {
            return Err(SkipReason::Detached);
        }
        Ok(source_text(doc, claim.node))
    });
    let text = match read {
        Ok(text) => text,
        Err(reason) => return WorkOutcome::Skipped(reason),
    };
    if text.chars().count() < ctx.min_text_len {
        return WorkOutcome::Skipped(SkipReason::TooShort);
    }

    let annotation = match annotator.annotate(&text, ctx.target_language).await {
        Ok(annotation) => annotation,
        Err(e) => {
            tracing::warn!(
                task_id = %claim.task_id,
                annotator = annotator.name(),
                retryable = e.is_retryable(),
                error = %e,
                "Annotation failed"
            );
            return WorkOutcome::Skipped(SkipReason::ServiceFailed);
        }
    };
    let annotation = annotation.trim();
    if annotation.is_empty() {
        return WorkOutcome::Skipped(SkipReason::EmptyAnnotation);
    }

    page.mutate(|doc, record| {
        if !is_current() || doc.attr(claim.node, TASK_ID_ATTR) != Some(marker.as_str()) {
            return WorkOutcome::Skipped(SkipReason::Stale);
        }
        match mutator::apply(doc, record, claim.node, annotation) {
            ApplyOutcome::Inserted { placement, .. } => WorkOutcome::Applied(placement),
            ApplyOutcome::AlreadyProcessed => WorkOutcome::Skipped(SkipReason::AlreadyProcessed),
            ApplyOutcome::Detached => WorkOutcome::Skipped(SkipReason::Detached),
            ApplyOutcome::NotInserted(_) => WorkOutcome::Skipped(SkipReason::NotInserted),
        }
    })
}
