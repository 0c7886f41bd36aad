//! Coalesced wake-ups
//!
//! A pending flag plus one deferred continuation. Any number of `schedule`
//! calls made before the continuation runs produce a single invocation.
//! Nothing is delayed beyond the configured tick, only deduplicated.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Deduplicates bursts of wake requests into one deferred call
#[derive(Debug, Clone)]
pub struct Coalescer {
    pending: Arc<AtomicBool>,
    delay: Duration,
}

impl Default for Coalescer {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl Coalescer {
    /// `Duration::ZERO` defers to the next scheduler tick
    pub fn new(delay: Duration) -> Self {
        Self {
            pending: Arc::new(AtomicBool::new(false)),
            delay,
        }
    }

    /// Schedule `f` unless a continuation is already pending.
    /// Returns whether this call scheduled it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.pending.swap(true, Ordering::AcqRel) {
            return false;
        }
        let pending = self.pending.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }
            // Cleared before running so requests made during `f` schedule again
            pending.store(false, Ordering::Release);
            f();
        });
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Forget a pending continuation so the next `schedule` goes through.
    /// A continuation already spawned still runs.
    pub fn reset(&self) {
        self.pending.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_burst_runs_once() {
        let coalescer = Coalescer::default();
        let count = Arc::new(AtomicUsize::new(0));
        let mut scheduled = 0;
        for _ in 0..10 {
            let count = count.clone();
            if coalescer.schedule(move || {
                count.fetch_add(1, Ordering::SeqCst);
            }) {
                scheduled += 1;
            }
        }
        assert_eq!(scheduled, 1);
        assert!(coalescer.is_pending());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!coalescer.is_pending());
    }

    #[tokio::test]
    async fn test_schedules_again_after_firing() {
        let coalescer = Coalescer::default();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let c = count.clone();
            coalescer.schedule(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_delay_is_honored() {
        let coalescer = Coalescer::new(Duration::from_millis(50));
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        coalescer.schedule(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_reset_clears_pending() {
        let coalescer = Coalescer::new(Duration::from_millis(50));
        coalescer.schedule(|| {});
        assert!(coalescer.is_pending());
        coalescer.reset();
        assert!(!coalescer.is_pending());
        assert!(coalescer.schedule(|| {}));
    }
}
