//! Chapter task context: everything a chapter run and its page workers share

use crate::config::Config;
use crate::http_client::FetchClient;
use crate::layout::Layout;
use crate::sources::SourceAdapter;
use crate::types::{Event, SeriesSlug, SourceId};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::super::MangaDownloader;
use super::super::progress::ProgressCounters;

/// State shared by every chapter of one download request
pub(crate) struct ChapterTaskContext {
    pub(crate) adapter: Arc<dyn SourceAdapter>,
    pub(crate) source: SourceId,
    pub(crate) slug: SeriesSlug,
    pub(crate) fetch: FetchClient,
    pub(crate) layout: Layout,
    pub(crate) config: Arc<Config>,
    pub(crate) event_tx: broadcast::Sender<Event>,
    pub(crate) cancel_token: CancellationToken,
    pub(crate) progress: Arc<ProgressCounters>,
    pub(crate) want_archive: bool,
}

impl ChapterTaskContext {
    pub(crate) fn new(
        downloader: &MangaDownloader,
        adapter: Arc<dyn SourceAdapter>,
        slug: SeriesSlug,
        want_archive: bool,
    ) -> Self {
        Self {
            source: adapter.id().clone(),
            adapter,
            slug,
            fetch: downloader.fetch.clone(),
            layout: downloader.layout.clone(),
            config: downloader.config.clone(),
            event_tx: downloader.event_tx.clone(),
            cancel_token: downloader.cancel_token.clone(),
            progress: downloader.progress.clone(),
            want_archive,
        }
    }

    /// Broadcast an event; having no subscribers is fine
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}
