//! Page worker: fetch one page image and write it under its final name
//!
//! Each page gets its own logical retry budget on top of the fetch client's
//! transport retries. A logical retry resolves the image URL again, so a
//! source that hands out short-lived image URLs gets a fresh one.

use crate::config::{DownloadConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::http_client::RequestOptions;
use crate::retry::{IsRetryable, backoff_delay};
use crate::types::{ChapterDescriptor, Event, PageRef, PageResult, PageStatus};
use crate::utils::{infer_extension, write_atomic};
use std::path::PathBuf;
use std::time::Duration;

use super::context::ChapterTaskContext;

/// Download one page, reusing `existing` when the page is already on disk
///
/// Never fails: every outcome, cancellation included, is folded into the
/// returned [`PageResult`].
pub(crate) async fn download_page(
    ctx: &ChapterTaskContext,
    chapter: &ChapterDescriptor,
    page: PageRef,
    existing: Option<PathBuf>,
) -> PageResult {
    let result = match existing {
        Some(path) => {
            tracing::debug!(chapter = chapter.index, page = page.number, ?path, "Page already on disk");
            PageResult {
                page: page.number,
                status: PageStatus::Success,
                bytes: 0,
                retries: 0,
                path: Some(path),
                reused: true,
                error: None,
            }
        }
        None => fetch_with_retries(ctx, chapter, &page).await,
    };
    ctx.progress.record_page(&result);
    result
}

async fn fetch_with_retries(ctx: &ChapterTaskContext, chapter: &ChapterDescriptor, page: &PageRef) -> PageResult {
    let budget = ctx.config.download.page_retry_budget;
    let mut retries: u32 = 0;

    loop {
        if ctx.is_cancelled() {
            return failed(page, PageStatus::RetryableFailure, retries, &Error::Cancelled);
        }

        let attempt = tokio::select! {
            biased;
            _ = ctx.cancel_token.cancelled() => Err(Error::Cancelled),
            result = fetch_once(ctx, chapter, page) => result,
        };

        match attempt {
            Ok((path, bytes)) => {
                ctx.emit_event(Event::PageDownloaded {
                    chapter: chapter.index,
                    page: page.number,
                    bytes,
                });
                return PageResult {
                    page: page.number,
                    status: PageStatus::Success,
                    bytes,
                    retries,
                    path: Some(path),
                    reused: false,
                    error: None,
                };
            }
            Err(Error::Cancelled) => {
                return failed(page, PageStatus::RetryableFailure, retries, &Error::Cancelled);
            }
            Err(e) if e.is_retryable() && retries < budget => {
                retries += 1;
                let delay = page_retry_delay(&ctx.config.download, &ctx.config.http.retry, retries);
                tracing::warn!(
                    chapter = chapter.index,
                    page = page.number,
                    retry = retries,
                    budget,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "Page download failed, retrying"
                );
                ctx.emit_event(Event::PageRetrying {
                    chapter: chapter.index,
                    page: page.number,
                    attempt: retries,
                    error: e.to_string(),
                });
                tokio::select! {
                    _ = ctx.cancel_token.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Err(e) => {
                let status = if e.is_retryable() {
                    PageStatus::RetryableFailure
                } else {
                    PageStatus::PermanentFailure
                };
                tracing::error!(
                    chapter = chapter.index,
                    page = page.number,
                    retries,
                    error = %e,
                    "Page download failed"
                );
                ctx.emit_event(Event::PageFailed {
                    chapter: chapter.index,
                    page: page.number,
                    error: e.to_string(),
                });
                return failed(page, status, retries, &e);
            }
        }
    }
}

/// One logical attempt: resolve, fetch, validate, write
async fn fetch_once(
    ctx: &ChapterTaskContext,
    chapter: &ChapterDescriptor,
    page: &PageRef,
) -> Result<(PathBuf, u64)> {
    let url = ctx.adapter.resolve_image_url(page).await?;
    let options = RequestOptions::with_referer(ctx.adapter.referer());
    let body = ctx.fetch.get_bytes(&ctx.source, &url, &options).await?;

    if body.bytes.is_empty() {
        return Err(Error::transient(&url, "empty image body"));
    }

    let ext = infer_extension(&body.bytes, body.content_type.as_deref(), &body.final_url);
    let path = ctx
        .layout
        .page_path(&ctx.source, &ctx.slug, chapter, page.number, ext);
    let temp = ctx
        .layout
        .temp_page_path(&ctx.source, &ctx.slug, chapter, page.number, ext);
    write_atomic(&path, &temp, &body.bytes).await?;

    Ok((path, body.bytes.len() as u64))
}

/// Delay before logical retry number `retry` of a page
///
/// Starts at the configured page retry delay and grows with the transport
/// backoff multiplier, capped by the transport maximum delay.
pub(crate) fn page_retry_delay(download: &DownloadConfig, transport: &RetryConfig, retry: u32) -> Duration {
    let schedule = RetryConfig {
        max_attempts: download.page_retry_budget,
        initial_delay: download.page_retry_delay,
        max_delay: transport.max_delay,
        backoff_multiplier: transport.backoff_multiplier,
        jitter: false,
    };
    backoff_delay(&schedule, retry)
}

fn failed(page: &PageRef, status: PageStatus, retries: u32, error: &Error) -> PageResult {
    PageResult {
        page: page.number,
        status,
        bytes: 0,
        retries,
        path: None,
        reused: false,
        error: Some(error.to_string()),
    }
}
