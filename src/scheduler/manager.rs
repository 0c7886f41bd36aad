//! Annotation scheduler
//!
//! Owns the registry, budget and visibility set of one page, and wires the
//! trackers, selection policy and workers together:
//! 1. `enable` starts a session: attach trackers, scan, fold initial visibility, wake
//! 2. visibility batches with a pending task entering, coalesced mutation
//!    batches, and completed tasks all call `pump`
//! 3. each `pump` runs one selection pass and claims at most one task,
//!    which is handed to a spawned worker. Concurrency grows only through
//!    these re-entry points, never by draining the queue in one call
//! 4. `disable` clears all state, detaches trackers and restores the page
//!
//! Locks are never held across an await. When nested, the order is
//! observers, then state, then page.
//!
//! Each enable starts a new session number. A worker whose session has ended
//! leaves the current registry, budget and tree alone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use crate::annotate::Annotator;
use crate::coordination::Coalescer;
use crate::domain::Task;
use crate::host::{EntryBatch, MutationBatch, ObserveError, Page};
use crate::observe::{apply_visibility_batch, discover_inserted, MutationTracker, VisibilityTracker};
use crate::scheduler::eligibility::{EligibilityFilter, SourceScript, DEFAULT_MIN_TEXT_LEN};
use crate::scheduler::mutator;
use crate::scheduler::state::{SchedulerState, SchedulerStats};
use crate::scheduler::worker::{self, Claim, WorkOutcome, WorkerContext};

/// Default number of annotation requests in flight
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default pre-fetch margin around the viewport, in pixels
pub const DEFAULT_PREFETCH_MARGIN: f64 = 300.0;

/// Default delay between observer attach attempts on a loading page
pub const DEFAULT_OBSERVER_RETRY: Duration = Duration::from_millis(100);

/// Runtime settings for one scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_concurrent: usize,
    pub prefetch_margin: f64,
    pub min_text_len: usize,
    /// Zero defers coalesced wakes to the next tick
    pub coalesce_delay: Duration,
    pub observer_retry: Duration,
    pub source_script: SourceScript,
    pub target_language: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            prefetch_margin: DEFAULT_PREFETCH_MARGIN,
            min_text_len: DEFAULT_MIN_TEXT_LEN,
            coalesce_delay: Duration::ZERO,
            observer_retry: DEFAULT_OBSERVER_RETRY,
            source_script: SourceScript::default(),
            target_language: "zh-CN".to_string(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_target_language(mut self, language: impl Into<String>) -> Self {
        self.target_language = language.into();
        self
    }

    pub fn with_observer_retry(mut self, retry: Duration) -> Self {
        self.observer_retry = retry;
        self
    }

    pub fn filter(&self) -> EligibilityFilter {
        EligibilityFilter::new(self.min_text_len, self.source_script)
    }
}

/// Trackers and their listener tasks for the running session
#[derive(Default)]
struct Observers {
    visibility: Option<Arc<VisibilityTracker>>,
    mutation: Option<MutationTracker>,
    listeners: Vec<JoinHandle<()>>,
}

impl Observers {
    fn shutdown(self) {
        for handle in &self.listeners {
            handle.abort();
        }
        if let Some(tracker) = &self.visibility {
            tracker.disconnect();
        }
        if let Some(tracker) = &self.mutation {
            tracker.disconnect();
        }
    }
}

struct Shared<A: ?Sized> {
    page: Arc<Page>,
    config: SchedulerConfig,
    filter: EligibilityFilter,
    state: Mutex<SchedulerState>,
    session: AtomicU64,
    observers: Mutex<Observers>,
    wake: Coalescer,
    idle: Notify,
    annotator: Arc<A>,
}

impl<A: Annotator + ?Sized + 'static> Shared<A> {
    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn observers(&self) -> MutexGuard<'_, Observers> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, session: u64) -> bool {
        self.session.load(Ordering::Acquire) == session
    }
}

/// Viewport-driven annotation scheduler for one page
pub struct AnnotationScheduler<A: Annotator + ?Sized + 'static> {
    shared: Arc<Shared<A>>,
}

impl<A: Annotator + ?Sized + 'static> AnnotationScheduler<A> {
    pub fn new(page: Arc<Page>, annotator: Arc<A>, config: SchedulerConfig) -> Self {
        let filter = config.filter();
        let wake = Coalescer::new(config.coalesce_delay);
        let state = SchedulerState::new(config.max_concurrent);
        Self {
            shared: Arc::new(Shared {
                page,
                filter,
                state: Mutex::new(state),
                session: AtomicU64::new(0),
                observers: Mutex::new(Observers::default()),
                wake,
                idle: Notify::new(),
                annotator,
                config,
            }),
        }
    }

    pub fn page(&self) -> &Arc<Page> {
        &self.shared.page
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.state().enabled
    }

    /// Current session number; changes on every enable and disable
    pub fn session(&self) -> u64 {
        self.shared.session.load(Ordering::Acquire)
    }

    /// Start a session. Returns false when already enabled.
    ///
    /// Discovery and tracker setup run on a spawned task, so this must be
    /// called from within a tokio runtime.
    pub fn enable(&self) -> bool {
        let session = {
            let mut state = self.shared.state();
            if state.enabled {
                return false;
            }
            state.enabled = true;
            state.started = false;
            self.shared.session.fetch_add(1, Ordering::AcqRel) + 1
        };
        tracing::info!(session, "Scheduler enabled");
        tokio::spawn(startup(self.shared.clone(), session));
        true
    }

    /// Tear the session down: clear tasks, budget and visibility, detach the
    /// trackers, and remove annotations and markers from the page. Workers
    /// still in flight run to completion and then do nothing.
    pub fn disable(&self) {
        let shared = &self.shared;
        let was_enabled = {
            let mut state = shared.state();
            let was_enabled = state.enabled;
            state.reset();
            shared.session.fetch_add(1, Ordering::AcqRel);
            was_enabled
        };
        shared.wake.reset();

        let observers = std::mem::take(&mut *shared.observers());
        observers.shutdown();

        let removed = shared.page.mutate(mutator::strip_annotations);
        tracing::info!(was_enabled, removed, "Scheduler disabled");
        shared.idle.notify_waiters();
    }

    /// Claim and dispatch at most one task. Returns whether a task was claimed.
    pub fn pump(&self) -> bool {
        pump(&self.shared)
    }

    /// Request a coalesced pump
    pub fn wake(&self) {
        wake(&self.shared);
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.state().stats()
    }

    /// Tasks in discovery order
    pub fn tasks(&self) -> Vec<Task> {
        self.shared.state().registry.iter().cloned().collect()
    }

    /// Whether the current session has no more work: disabled, or started
    /// with nothing pending and nothing in flight
    pub fn is_drained(&self) -> bool {
        let state = self.shared.state();
        !state.enabled || (state.started && state.is_idle())
    }

    /// Wait until `is_drained`
    pub async fn drained(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_drained() {
                return;
            }
            notified.await;
        }
    }
}

impl<A: Annotator + ?Sized + 'static> Drop for AnnotationScheduler<A> {
    fn drop(&mut self) {
        let observers = std::mem::take(&mut *self.shared.observers());
        observers.shutdown();
    }
}

fn wake<A: Annotator + ?Sized + 'static>(shared: &Arc<Shared<A>>) {
    let target = shared.clone();
    shared.wake.schedule(move || {
        pump(&target);
    });
}

fn pump<A: Annotator + ?Sized + 'static>(shared: &Arc<Shared<A>>) -> bool {
    match claim_one(shared) {
        Some(claim) => {
            spawn_worker(shared, claim);
            true
        }
        None => false,
    }
}

/// One selection pass: claim a single task under the state lock
fn claim_one<A: Annotator + ?Sized + 'static>(shared: &Shared<A>) -> Option<Claim> {
    let mut state = shared.state();
    let pick = state.claim_next()?;
    let node = state.registry.get(pick.task_id())?.node;
    Some(Claim {
        task_id: pick.task_id(),
        node,
        session: shared.session.load(Ordering::Acquire),
        visible: pick.is_visible(),
    })
}

/// Releases a claim when the worker finishes, panics or is dropped
struct ClaimGuard<A: Annotator + ?Sized + 'static> {
    shared: Arc<Shared<A>>,
    claim: Claim,
    ran: bool,
}

impl<A: Annotator + ?Sized + 'static> Drop for ClaimGuard<A> {
    fn drop(&mut self) {
        // A worker cancelled by runtime shutdown frees its slot without dispatching more
        let repump = self.ran || std::thread::panicking();
        finish(&self.shared, &self.claim, repump);
    }
}

fn spawn_worker<A: Annotator + ?Sized + 'static>(shared: &Arc<Shared<A>>, claim: Claim) {
    tracing::debug!(task_id = %claim.task_id, node = %claim.node, visible = claim.visible, "Claimed task");
    let mut guard = ClaimGuard {
        shared: shared.clone(),
        claim,
        ran: false,
    };
    tokio::spawn(async move {
        let shared = guard.shared.clone();
        let claim = guard.claim;
        let ctx = WorkerContext {
            target_language: &shared.config.target_language,
            min_text_len: shared.config.min_text_len,
        };
        let outcome = worker::run(&claim, &shared.page, shared.annotator.as_ref(), ctx, || {
            shared.is_current(claim.session)
        })
        .await;
        match outcome {
            WorkOutcome::Applied(placement) => {
                tracing::debug!(task_id = %claim.task_id, ?placement, "Annotation applied")
            }
            WorkOutcome::Skipped(reason) => {
                tracing::debug!(task_id = %claim.task_id, %reason, "Task finished without annotation")
            }
        }
        guard.ran = true;
    });
}

/// Complete the task and free its slot, then look for more work
fn finish<A: Annotator + ?Sized + 'static>(shared: &Arc<Shared<A>>, claim: &Claim, repump: bool) {
    let current = {
        let mut state = shared.state();
        let current = shared.is_current(claim.session);
        if current {
            if let Err(e) = state.registry.complete(claim.task_id) {
                tracing::error!(task_id = %claim.task_id, error = %e, "Could not complete task");
            }
            state.budget.release();
        }
        current
    };
    if current && repump {
        pump(shared);
    }
    shared.idle.notify_waiters();
}

/// Attach a tracker, retrying while the page is still loading
async fn attach_with_retry<A, T, F>(shared: &Shared<A>, session: u64, what: &str, mut attach: F) -> Option<T>
where
    A: Annotator + ?Sized + 'static,
    F: FnMut() -> Result<T, ObserveError>,
{
    loop {
        if !shared.is_current(session) {
            return None;
        }
        match attach() {
            Ok(tracker) => return Some(tracker),
            Err(ObserveError::NotReady) => {
                tracing::debug!(tracker = what, "Page not ready, retrying");
                tokio::time::sleep(shared.config.observer_retry).await;
            }
            Err(e) => {
                tracing::error!(tracker = what, error = %e, "Could not attach tracker");
                return None;
            }
        }
    }
}

async fn startup<A: Annotator + ?Sized + 'static>(shared: Arc<Shared<A>>, session: u64) {
    let page = shared.page.clone();
    let margin = shared.config.prefetch_margin;
    let Some((visibility, mut entries)) =
        attach_with_retry(&shared, session, "visibility", || VisibilityTracker::attach(&page, margin)).await
    else {
        return;
    };
    let Some((mutation, mutations)) =
        attach_with_retry(&shared, session, "mutation", || MutationTracker::attach(&page)).await
    else {
        return;
    };
    let visibility = Arc::new(visibility);

    // Initial scan, then fold the initial visibility in before anything is claimed
    let discovered = {
        let mut state = shared.state();
        if !shared.is_current(session) {
            return;
        }
        let body = page.with_document(|doc| doc.body());
        let state = &mut *state;
        page.with_document_mut(|doc| state.registry.initial_scan(doc, &shared.filter, body))
    };
    visibility.observe(&discovered);
    while let Ok(batch) = entries.try_recv() {
        fold_visibility(&shared, &batch);
    }

    {
        let mut observers = shared.observers();
        if !shared.is_current(session) {
            visibility.disconnect();
            mutation.disconnect();
            return;
        }
        observers.listeners.push(tokio::spawn(visibility_listener(shared.clone(), entries)));
        observers.listeners.push(tokio::spawn(mutation_listener(
            shared.clone(),
            visibility.clone(),
            mutations,
        )));
        observers.visibility = Some(visibility);
        observers.mutation = Some(mutation);
    }

    {
        let mut state = shared.state();
        if !shared.is_current(session) {
            return;
        }
        state.started = true;
        tracing::info!(session, tasks = state.registry.len(), visible = state.visible.len(), "Initial scan complete");
    }
    wake(&shared);
    shared.idle.notify_waiters();
}

/// Returns true when the batch should trigger a pump
fn fold_visibility<A: Annotator + ?Sized + 'static>(shared: &Shared<A>, batch: &EntryBatch) -> bool {
    let mut state = shared.state();
    let state = &mut *state;
    shared
        .page
        .with_document(|doc| apply_visibility_batch(&mut state.visible, &state.registry, doc, batch))
}

async fn visibility_listener<A: Annotator + ?Sized + 'static>(
    shared: Arc<Shared<A>>,
    mut entries: mpsc::UnboundedReceiver<EntryBatch>,
) {
    while let Some(batch) = entries.recv().await {
        if fold_visibility(&shared, &batch) {
            pump(&shared);
        }
    }
}

async fn mutation_listener<A: Annotator + ?Sized + 'static>(
    shared: Arc<Shared<A>>,
    visibility: Arc<VisibilityTracker>,
    mut mutations: mpsc::UnboundedReceiver<MutationBatch>,
) {
    while let Some(batch) = mutations.recv().await {
        let discovered = {
            let mut state = shared.state();
            if !state.enabled {
                break;
            }
            let registry = &mut state.registry;
            shared
                .page
                .with_document_mut(|doc| discover_inserted(registry, doc, &shared.filter, &batch))
        };
        if !discovered.is_empty() {
            tracing::debug!(count = discovered.len(), "Discovered inserted nodes");
            visibility.observe(&discovered);
        }
        wake(&shared);
    }
}
