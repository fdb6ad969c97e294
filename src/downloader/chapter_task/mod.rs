//! Chapter task execution
//!
//! Split into focused submodules:
//! - [`context`] - State shared by the chapters of one request
//! - [`page_worker`] - Per-page fetch, logical retry and atomic write
//! - [`finalization`] - Aggregation, completion marker and packaging
//!
//! A chapter's failure is recorded in its report and never aborts the
//! request; sibling chapters keep going.

mod context;
mod finalization;
mod page_worker;

pub(crate) use context::ChapterTaskContext;

use crate::config::MAX_PAGE_CONCURRENCY;
use crate::layout::Layout;
use crate::types::{ChapterDescriptor, ChapterDownloadReport, Event};
use futures::stream::{self, StreamExt};
use std::time::Instant;

use super::resume::{self, ResumeState};

/// Download one chapter and report the outcome
pub(crate) async fn run_chapter(ctx: &ChapterTaskContext, chapter: ChapterDescriptor) -> ChapterDownloadReport {
    let started = Instant::now();

    let state = match resume::inspect(&ctx.layout, &ctx.source, &ctx.slug, &chapter).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(chapter = chapter.index, error = %e, "Failed to inspect chapter on disk");
            return finished(ctx, ChapterDownloadReport::failed(chapter, e.to_string(), started.elapsed()));
        }
    };

    let existing = match state {
        ResumeState::Archived(artifact) => {
            let report = finalization::already_archived(ctx, chapter, artifact, started);
            return finished(ctx, report);
        }
        ResumeState::Downloaded(pages) => {
            let report = finalization::already_downloaded(ctx, chapter, pages, started).await;
            return finished(ctx, report);
        }
        ResumeState::Fresh { existing } => existing,
    };

    let pages = match ctx.adapter.list_chapter_pages(&ctx.slug, &chapter).await {
        Ok(pages) if pages.is_empty() => {
            tracing::warn!(chapter = chapter.index, "Source listed no pages for chapter");
            let report = ChapterDownloadReport::failed(chapter, "source listed no pages", started.elapsed());
            return finished(ctx, report);
        }
        Ok(pages) => pages,
        Err(e) => {
            tracing::error!(chapter = chapter.index, error = %e, "Failed to list chapter pages");
            return finished(ctx, ChapterDownloadReport::failed(chapter, e.to_string(), started.elapsed()));
        }
    };

    let requested = pages.len();
    ctx.emit_event(Event::ChapterStarted {
        chapter: chapter.index,
        pages: requested,
    });
    tracing::info!(
        source = %ctx.source,
        slug = %ctx.slug,
        chapter = chapter.index,
        pages = requested,
        reusable = existing.len(),
        "Downloading chapter"
    );

    let chapter_dir = ctx.layout.chapter_dir(&ctx.source, &ctx.slug, &chapter);
    if let Err(e) = Layout::ensure_dir(&chapter_dir).await {
        tracing::error!(chapter = chapter.index, ?chapter_dir, error = %e, "Failed to create chapter directory");
        return finished(ctx, ChapterDownloadReport::failed(chapter, e.to_string(), started.elapsed()));
    }

    let concurrency = ctx.config.download.page_concurrency.clamp(1, MAX_PAGE_CONCURRENCY);
    let results = stream::iter(pages)
        .map(|page| {
            let reuse = existing.get(&page.number).cloned();
            page_worker::download_page(ctx, &chapter, page, reuse)
        })
        .buffer_unordered(concurrency)
        .collect::<Vec<_>>()
        .await;

    let report = finalization::finish_chapter(ctx, chapter, requested, results, started).await;
    finished(ctx, report)
}

fn finished(ctx: &ChapterTaskContext, report: ChapterDownloadReport) -> ChapterDownloadReport {
    ctx.emit_event(Event::ChapterFinished {
        chapter: report.chapter.index,
        succeeded: report.succeeded_pages,
        failed: report.failed_pages.len(),
    });
    report
}
