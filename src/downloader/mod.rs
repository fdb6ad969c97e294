//! Download orchestration split into focused submodules.
//!
//! The `MangaDownloader` struct and its methods are organized by domain:
//! - [`commands`] - Search, info, chapter listing and range downloads
//! - [`chapter_task`] - One chapter: page worker pool, finalization, packaging
//! - [`resume`] - Completion state derived from the download tree
//! - [`progress`] - Aggregate counters shared by all page workers

mod chapter_task;
mod commands;
mod progress;
mod resume;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use crate::config::Config;
use crate::error::Result;
use crate::http_client::FetchClient;
use crate::layout::Layout;
use crate::sources::SourceRegistry;
use crate::throttle::SourceThrottle;
use crate::types::{Event, ProgressSnapshot, SourceId};
use progress::ProgressCounters;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct MangaDownloader {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Registered source adapters
    pub(crate) registry: Arc<SourceRegistry>,
    /// Shared fetch client used for image downloads
    pub(crate) fetch: FetchClient,
    /// Path derivation for the download tree
    pub(crate) layout: Layout,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Cancels every running and future request of this instance
    pub(crate) cancel_token: CancellationToken,
    /// Aggregate progress counters
    pub(crate) progress: Arc<ProgressCounters>,
}

impl MangaDownloader {
    /// Create a downloader with every built-in source registered
    ///
    /// The per-source throttle is built from `sources.*.min_request_interval`
    /// and one fetch client is shared by all adapters and page workers.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        let intervals: HashMap<SourceId, _> = config
            .sources
            .iter()
            .filter_map(|(id, source)| source.min_request_interval.map(|d| (SourceId::new(id), d)))
            .collect();
        let fetch = FetchClient::new(&config.http, SourceThrottle::new(intervals))?;
        let registry = SourceRegistry::with_defaults(&fetch, &config);

        tracing::info!(
            sources = ?registry.list(),
            download_dir = ?config.download_dir(),
            page_concurrency = config.download.page_concurrency,
            "Manga downloader initialized"
        );
        Ok(Self::with_registry(config, fetch, registry))
    }

    /// Create a downloader over an explicit registry and fetch client
    pub fn with_registry(config: Config, fetch: FetchClient, registry: SourceRegistry) -> Self {
        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            layout: Layout::new(config.download_dir().clone()),
            config: Arc::new(config),
            registry: Arc::new(registry),
            fetch,
            event_tx,
            cancel_token: CancellationToken::new(),
            progress: Arc::new(ProgressCounters::default()),
        }
    }

    /// Subscribe to progress events
    ///
    /// Events are dropped for subscribers that fall more than the channel
    /// capacity behind.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &Config {
        &self.config
    }

    /// Registered sources
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// The shared fetch client
    pub fn fetch_client(&self) -> &FetchClient {
        &self.fetch
    }

    /// Path derivation for the download tree
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Request cancellation
    ///
    /// In-flight page fetches are abandoned, no new page or chapter starts and
    /// no archive is written for an unfinished chapter. Already written pages
    /// stay on disk for the next run. Cancellation is permanent for this
    /// instance and all its clones.
    pub fn cancel(&self) {
        if self.cancel_token.is_cancelled() {
            return;
        }
        tracing::info!("Cancellation requested");
        self.cancel_token.cancel();
        self.emit_event(Event::Cancelled);
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Current aggregate progress
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Broadcast an event; having no subscribers is fine
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
