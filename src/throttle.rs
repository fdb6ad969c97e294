//! Per-source politeness throttle
//!
//! Each source may declare a minimum interval between two requests. Requests to
//! the same source take one token from that source's gate; the gate holds a
//! single token that refills `interval` after it was last taken, so requests to
//! one source are serialized and spaced. Sources without an interval are never
//! delayed, and one source's gate never delays another source.
//!
//! This is independent from the page worker pool: a chapter may have several
//! workers in flight, but they still reach a throttled source one at a time.

use crate::types::SourceId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Shared throttle for all sources (cloneable - all fields are Arc-wrapped)
#[derive(Clone, Default)]
pub struct SourceThrottle {
    /// Minimum interval per source (absent = unthrottled)
    intervals: Arc<HashMap<SourceId, Duration>>,
    /// Time the last token was taken, per source
    gates: Arc<std::sync::Mutex<HashMap<SourceId, Arc<tokio::sync::Mutex<Option<Instant>>>>>>,
    /// Tokens handed out across all sources
    tokens_taken: Arc<AtomicU64>,
}

impl SourceThrottle {
    /// Create a throttle from per-source minimum intervals
    #[must_use]
    pub fn new(intervals: HashMap<SourceId, Duration>) -> Self {
        Self {
            intervals: Arc::new(intervals),
            gates: Arc::default(),
            tokens_taken: Arc::default(),
        }
    }

    /// Minimum interval configured for a source
    pub fn interval(&self, source: &SourceId) -> Option<Duration> {
        self.intervals
            .get(source)
            .copied()
            .filter(|interval| !interval.is_zero())
    }

    /// Total tokens taken so far (one per outbound request)
    pub fn tokens_taken(&self) -> u64 {
        self.tokens_taken.load(Ordering::Relaxed)
    }

    /// Take a token for `source`, waiting until the source's interval has elapsed
    pub async fn acquire(&self, source: &SourceId) {
        self.tokens_taken.fetch_add(1, Ordering::Relaxed);

        // Fast path: unthrottled source
        let Some(interval) = self.interval(source) else {
            return;
        };

        let gate = self.gate(source);
        // Held across the wait so same-source requests queue behind each other
        let mut last_taken = gate.lock().await;
        if let Some(previous) = *last_taken {
            let ready_at = previous + interval;
            if ready_at > Instant::now() {
                tracing::trace!(
                    source = %source,
                    wait_ms = (ready_at - Instant::now()).as_millis(),
                    "Waiting for source throttle"
                );
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last_taken = Some(Instant::now());
    }

    fn gate(&self, source: &SourceId) -> Arc<tokio::sync::Mutex<Option<Instant>>> {
        let mut gates = match self.gates.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(gates.entry(source.clone()).or_default())
    }
}
