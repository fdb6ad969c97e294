//! Aggregate progress counters shared by all page workers

use crate::types::{PageResult, ProgressSnapshot};
use std::sync::atomic::{AtomicU64, Ordering};

/// Append-only counters; every field is updated with atomic increments
#[derive(Debug, Default)]
pub(crate) struct ProgressCounters {
    chapters_finished: AtomicU64,
    pages_downloaded: AtomicU64,
    pages_reused: AtomicU64,
    pages_failed: AtomicU64,
    bytes_downloaded: AtomicU64,
}

impl ProgressCounters {
    /// Count one finished page
    pub(crate) fn record_page(&self, result: &PageResult) {
        if !result.is_success() {
            self.pages_failed.fetch_add(1, Ordering::Relaxed);
        } else if result.reused {
            self.pages_reused.fetch_add(1, Ordering::Relaxed);
        } else {
            self.pages_downloaded.fetch_add(1, Ordering::Relaxed);
            self.bytes_downloaded.fetch_add(result.bytes, Ordering::Relaxed);
        }
    }

    /// Count one finished chapter
    pub(crate) fn record_chapter(&self) {
        self.chapters_finished.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub(crate) fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            chapters_finished: self.chapters_finished.load(Ordering::Relaxed),
            pages_downloaded: self.pages_downloaded.load(Ordering::Relaxed),
            pages_reused: self.pages_reused.load(Ordering::Relaxed),
            pages_failed: self.pages_failed.load(Ordering::Relaxed),
            bytes_downloaded: self.bytes_downloaded.load(Ordering::Relaxed),
        }
    }
}
