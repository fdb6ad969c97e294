//! Chapter finalization: aggregate page results, mark completion, package

use crate::archive::ArchivePackager;
use crate::types::{
    ArchiveArtifact, ChapterDescriptor, ChapterDownloadReport, ChapterStatus, Event, PageFailure,
    PageResult, PageStatus,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use super::super::resume;
use super::context::ChapterTaskContext;

/// Build the report for a chapter whose pages were just processed
///
/// Results arrive in completion order and are keyed by page number here.
pub(super) async fn finish_chapter(
    ctx: &ChapterTaskContext,
    chapter: ChapterDescriptor,
    requested: usize,
    results: Vec<PageResult>,
    started: Instant,
) -> ChapterDownloadReport {
    let pages: BTreeMap<u32, PageResult> = results.into_iter().map(|r| (r.page, r)).collect();
    let failed_pages: Vec<PageFailure> = pages
        .values()
        .filter(|r| !r.is_success())
        .map(|r| PageFailure {
            page: r.page,
            status: r.status,
            reason: r.error.clone().unwrap_or_default(),
        })
        .collect();
    let succeeded = pages.len() - failed_pages.len();
    let cancelled = ctx.is_cancelled();

    let pages_complete = failed_pages.is_empty();

    if pages_complete {
        if let Err(e) = resume::write_marker(&ctx.layout, &ctx.source, &ctx.slug, &chapter, requested).await {
            tracing::warn!(chapter = chapter.index, error = %e, "Failed to write completion marker");
        }
    } else {
        let permanent = failed_pages
            .iter()
            .filter(|f| f.status == PageStatus::PermanentFailure)
            .count();
        tracing::warn!(
            chapter = chapter.index,
            succeeded,
            failed = failed_pages.len(),
            permanent,
            cancelled,
            "Chapter finished with failed pages"
        );
    }

    let mut archive = None;
    let mut archive_error = None;
    let packable = ctx.want_archive
        && !cancelled
        && succeeded > 0
        && ctx.config.download.archive_policy.permits(failed_pages.len());

    if packable {
        let files: Vec<(u32, PathBuf)> = pages
            .values()
            .filter_map(|r| r.path.clone().map(|path| (r.page, path)))
            .collect();
        let cleanup = ctx.config.download.cleanup_after_archive && pages_complete;
        match package(ctx, &chapter, files, cleanup).await {
            Ok(artifact) => archive = Some(artifact),
            Err(e) => archive_error = Some(e),
        }
    } else if ctx.want_archive {
        tracing::info!(
            chapter = chapter.index,
            failed = failed_pages.len(),
            cancelled,
            "Chapter not packaged"
        );
    }

    // A chapter whose archive was asked for only completes once the archive exists.
    let status = if !pages_complete {
        if cancelled {
            ChapterStatus::Cancelled
        } else {
            ChapterStatus::PartiallyFailed
        }
    } else if let Some(reason) = &archive_error {
        ChapterStatus::PackagingFailed {
            reason: reason.clone(),
        }
    } else if ctx.want_archive && archive.is_none() {
        if cancelled {
            ChapterStatus::Cancelled
        } else {
            ChapterStatus::PackagingFailed {
                reason: "archive not written".to_string(),
            }
        }
    } else {
        ChapterStatus::Complete
    };

    ChapterDownloadReport {
        chapter,
        status,
        requested_pages: requested,
        succeeded_pages: succeeded,
        failed_pages,
        pages,
        elapsed: started.elapsed(),
        archive,
        archive_error,
    }
}

/// Report for a chapter whose archive is already in place
pub(super) fn already_archived(
    ctx: &ChapterTaskContext,
    chapter: ChapterDescriptor,
    artifact: ArchiveArtifact,
    started: Instant,
) -> ChapterDownloadReport {
    tracing::info!(chapter = chapter.index, path = ?artifact.path, "Chapter already archived, skipping");
    ctx.emit_event(Event::ChapterSkipped { chapter: chapter.index });

    ChapterDownloadReport {
        chapter,
        status: ChapterStatus::AlreadyPresent,
        requested_pages: artifact.page_count,
        succeeded_pages: artifact.page_count,
        failed_pages: Vec::new(),
        pages: BTreeMap::new(),
        elapsed: started.elapsed(),
        archive: Some(artifact),
        archive_error: None,
    }
}

/// Report for a chapter whose pages are all on disk, packaging them if asked
///
/// No request is made; packaging works from the files alone.
pub(super) async fn already_downloaded(
    ctx: &ChapterTaskContext,
    chapter: ChapterDescriptor,
    files: Vec<(u32, PathBuf)>,
    started: Instant,
) -> ChapterDownloadReport {
    tracing::info!(chapter = chapter.index, pages = files.len(), "Chapter already downloaded, skipping");
    ctx.emit_event(Event::ChapterSkipped { chapter: chapter.index });

    let pages: BTreeMap<u32, PageResult> = files
        .iter()
        .map(|(page, path)| {
            let result = PageResult {
                page: *page,
                status: PageStatus::Success,
                bytes: 0,
                retries: 0,
                path: Some(path.clone()),
                reused: true,
                error: None,
            };
            ctx.progress.record_page(&result);
            (*page, result)
        })
        .collect();

    let (archive, archive_error) = if ctx.want_archive {
        let cleanup = ctx.config.download.cleanup_after_archive;
        match package(ctx, &chapter, files, cleanup).await {
            Ok(artifact) => (Some(artifact), None),
            Err(e) => (None, Some(e)),
        }
    } else {
        (None, None)
    };
    let status = match &archive_error {
        Some(reason) => ChapterStatus::PackagingFailed {
            reason: reason.clone(),
        },
        None => ChapterStatus::AlreadyPresent,
    };

    ChapterDownloadReport {
        requested_pages: pages.len(),
        succeeded_pages: pages.len(),
        chapter,
        status,
        failed_pages: Vec::new(),
        pages,
        elapsed: started.elapsed(),
        archive,
        archive_error,
    }
}

async fn package(
    ctx: &ChapterTaskContext,
    chapter: &ChapterDescriptor,
    files: Vec<(u32, PathBuf)>,
    cleanup: bool,
) -> std::result::Result<ArchiveArtifact, String> {
    let output = ctx.layout.archive_path(&ctx.source, &ctx.slug, chapter);
    let temp = ctx.layout.temp_archive_path(&ctx.source, &ctx.slug, chapter);
    match ArchivePackager::pack(chapter.index, files, &output, &temp, cleanup).await {
        Ok(artifact) => {
            ctx.emit_event(Event::ArchiveCreated {
                chapter: chapter.index,
                path: artifact.path.clone(),
            });
            Ok(artifact)
        }
        Err(e) => {
            tracing::error!(chapter = chapter.index, ?output, error = %e, "Failed to package chapter");
            Err(e.to_string())
        }
    }
}
