//! Scripted annotator for tests and dry runs

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use super::client::{AnnotateError, Annotator};

/// Annotator with canned output, optional latency and failure injection.
///
/// Unscripted text is answered with `[<target>] <text>`.
#[derive(Debug, Default)]
pub struct MockAnnotator {
    responses: HashMap<String, String>,
    delay: Option<Duration>,
    fail_on: Vec<String>,
    empty_on: Vec<String>,
    calls: Mutex<Vec<String>>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl MockAnnotator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `text` with `annotation`
    pub fn with_response(mut self, text: impl Into<String>, annotation: impl Into<String>) -> Self {
        self.responses.insert(text.into(), annotation.into());
        self
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail any call whose text contains `fragment`
    pub fn failing_on(mut self, fragment: impl Into<String>) -> Self {
        self.fail_on.push(fragment.into());
        self
    }

    /// Return an empty annotation for any text containing `fragment`
    pub fn empty_on(mut self, fragment: impl Into<String>) -> Self {
        self.empty_on.push(fragment.into());
        self
    }

    /// Texts submitted so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Calls outstanding right now
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously outstanding calls observed
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Annotator for MockAnnotator {
    async fn annotate(&self, text: &str, target_language: &str) -> Result<String, AnnotateError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(self.in_flight.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_on.iter().any(|f| text.contains(f.as_str())) {
            return Err(AnnotateError::Unavailable(format!("scripted failure for {:?}", text)));
        }
        if self.empty_on.iter().any(|f| text.contains(f.as_str())) {
            return Ok(String::new());
        }
        Ok(self
            .responses
            .get(text)
            .cloned()
            .unwrap_or_else(|| format!("[{}] {}", target_language, text)))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
