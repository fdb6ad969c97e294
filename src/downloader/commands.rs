//! Caller-facing operations: search, series info, chapter listing, download

use crate::error::{Error, Result};
use crate::range::{ChapterRange, resolve_range};
use crate::types::{
    ChapterDescriptor, ChapterStatus, Command, CommandOutput, DownloadReport, DownloadRequest,
    Event, Request, SearchHit, SeriesInfo, SeriesSlug, SourceId,
};
use std::time::Instant;

use super::MangaDownloader;
use super::chapter_task::{ChapterTaskContext, run_chapter};

impl MangaDownloader {
    /// Search a source; an empty query browses the source's default listing
    ///
    /// `page` is 1-based; 0 is treated as 1.
    pub async fn search(&self, source: Option<&SourceId>, query: &str, page: u32) -> Result<Vec<SearchHit>> {
        let adapter = self.registry.resolve(source, &self.config.default_source)?;
        let hits = adapter.search(query.trim(), page.max(1)).await?;
        tracing::debug!(source = %adapter.id(), query, page, hits = hits.len(), "Search finished");
        Ok(hits)
    }

    /// Series metadata plus its chapter listing
    pub async fn info(
        &self,
        source: Option<&SourceId>,
        slug: &SeriesSlug,
    ) -> Result<(SeriesInfo, Vec<ChapterDescriptor>)> {
        let adapter = self.registry.resolve(source, &self.config.default_source)?;
        let mut info = adapter.fetch_info(slug).await?;
        let chapters = adapter.list_chapters(slug).await?;
        if info.chapter_count == 0 {
            info.chapter_count = chapters.len();
        }
        Ok((info, chapters))
    }

    /// Every chapter of a series, ascending
    pub async fn list_chapters(&self, source: Option<&SourceId>, slug: &SeriesSlug) -> Result<Vec<ChapterDescriptor>> {
        let adapter = self.registry.resolve(source, &self.config.default_source)?;
        adapter.list_chapters(slug).await
    }

    /// Download a chapter range
    ///
    /// Chapters run one after another in ascending order; pages within a
    /// chapter run on the bounded worker pool. Per-chapter failures are
    /// reported, not returned. Chapters already complete on disk are skipped
    /// without network access.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRange`] for a malformed range (before any request) or
    ///   a range the source has no chapters in
    /// - [`Error::UnknownSource`] when `source` is not registered
    /// - [`Error::Cancelled`] when the downloader was cancelled before the start
    /// - adapter errors from listing the series' chapters
    pub async fn download(&self, source: Option<&SourceId>, request: &DownloadRequest) -> Result<DownloadReport> {
        let started = Instant::now();
        let range = ChapterRange::new(request.start, request.end);
        range.validate()?;

        let adapter = self.registry.resolve(source, &self.config.default_source)?;
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let chapters = resolve_range(adapter.as_ref(), &request.slug, range).await?;
        let source_id = adapter.id().clone();
        self.emit_event(Event::RangeResolved {
            source: source_id.clone(),
            slug: request.slug.clone(),
            chapters: chapters.iter().map(|c| c.index).collect(),
        });
        tracing::info!(
            source = %source_id,
            slug = %request.slug,
            chapters = chapters.len(),
            want_archive = request.want_archive,
            "Starting download"
        );

        let ctx = ChapterTaskContext::new(self, adapter, request.slug.clone(), request.want_archive);
        let mut reports = Vec::with_capacity(chapters.len());
        let mut cancelled = false;

        for chapter in chapters {
            if self.is_cancelled() {
                cancelled = true;
                break;
            }
            let report = run_chapter(&ctx, chapter).await;
            self.progress.record_chapter();
            let chapter_cancelled = report.status == ChapterStatus::Cancelled;
            reports.push(report);
            if chapter_cancelled {
                cancelled = true;
                break;
            }
        }

        let report = DownloadReport {
            source: source_id,
            slug: request.slug.clone(),
            chapters: reports,
            cancelled,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            source = %report.source,
            slug = %report.slug,
            completed = report.completed_chapters(),
            attempted = report.chapters.len(),
            pages = report.succeeded_pages(),
            requested_pages = report.requested_pages(),
            cancelled,
            elapsed_ms = report.elapsed.as_millis(),
            "Download finished"
        );
        Ok(report)
    }

    /// Dispatch a caller request
    pub async fn execute(&self, request: Request) -> Result<CommandOutput> {
        let source = request.source.as_ref();
        match request.command {
            Command::Search { query, page } => {
                let hits = self.search(source, &query, page).await?;
                Ok(CommandOutput::Search { hits })
            }
            Command::Info { slug } => {
                let (info, chapters) = self.info(source, &slug).await?;
                Ok(CommandOutput::Info { info, chapters })
            }
            Command::ListChapters { slug } => {
                let chapters = self.list_chapters(source, &slug).await?;
                Ok(CommandOutput::Chapters { chapters })
            }
            Command::Download(download) => {
                let report = self.download(source, &download).await?;
                Ok(CommandOutput::Download(report))
            }
        }
    }
}
