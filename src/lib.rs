//! # manga-fetcher
//!
//! Multi-source manga fetch orchestration: search a source, resolve a chapter
//! range, download pages concurrently with retries, resume from disk and
//! package finished chapters as CBZ archives.
//!
//! ## Design Philosophy
//!
//! manga-fetcher is designed to be:
//! - **Library-first** - No CLI or UI; a caller layer drives it through [`Request`]s
//! - **Source-agnostic** - Sites are adapters behind one trait, looked up by [`SourceId`]
//! - **Resumable** - Completion is derived from the download tree, nothing else is persisted
//! - **Event-driven** - Consumers subscribe to progress events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use manga_fetcher::{Config, MangaDownloader, SeriesSlug, SourceId};
//! use manga_fetcher::types::DownloadRequest;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = MangaDownloader::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let request = DownloadRequest {
//!         slug: SeriesSlug::new("one-piece.21"),
//!         start: Some(1),
//!         end: Some(3),
//!         want_archive: true,
//!     };
//!     let report = downloader
//!         .download(Some(&SourceId::new("mangakatana")), &request)
//!         .await?;
//!     println!("{} chapters complete", report.completed_chapters());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// CBZ chapter packaging
pub mod archive;
/// Configuration types
pub mod config;
/// Download orchestration (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// HTTP fetch client with retry and throttling
pub mod http_client;
/// Filesystem layout of downloaded content
pub mod layout;
/// Chapter range resolution
pub mod range;
/// Retry logic with exponential backoff
pub mod retry;
/// Source adapters and registry
pub mod sources;
/// Per-source request throttling
pub mod throttle;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{ArchivePolicy, Config};
pub use downloader::MangaDownloader;
pub use error::{Error, RangeError, Result};
pub use range::ChapterRange;
pub use sources::{SourceAdapter, SourceRegistry};
pub use types::{
    ChapterDescriptor, ChapterDownloadReport, ChapterStatus, DownloadReport, Event, PageRef,
    PageStatus, SearchHit, SeriesInfo, SeriesSlug, SeriesStatus, SourceId,
};

/// Cancel the downloader when a termination signal arrives.
///
/// Running downloads stop promptly, keeping the pages already written, and
/// return their partial reports.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use manga_fetcher::{Config, MangaDownloader, cancel_on_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let downloader = MangaDownloader::new(Config::default())?;
///
///     let watcher = downloader.clone();
///     tokio::spawn(async move { cancel_on_signal(&watcher).await });
///
///     Ok(())
/// }
/// ```
pub async fn cancel_on_signal(downloader: &MangaDownloader) {
    wait_for_signal().await;
    downloader.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
