//! Disk-derived resume state
//!
//! Nothing besides the download tree is persisted. A chapter counts as done
//! when its archive exists and is trusted, or when its directory holds the
//! completion marker and exactly the page files the marker names. Either way
//! no request is needed to skip it.

use crate::archive::ArchivePackager;
use crate::error::Result;
use crate::layout::Layout;
use crate::types::{ArchiveArtifact, ChapterDescriptor, SeriesSlug, SourceId};
use crate::utils::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Contents of the `.complete` marker
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CompletionMarker {
    /// Pages in the chapter's page list when it completed
    pub(crate) pages: usize,
}

/// What is already on disk for one chapter
#[derive(Debug)]
pub(crate) enum ResumeState {
    /// Archive present and trusted
    Archived(ArchiveArtifact),
    /// Every page present per the completion marker, sorted by page number
    Downloaded(Vec<(u32, PathBuf)>),
    /// Chapter must be (re)fetched; pages already on disk can be reused
    Fresh {
        /// Completed page files by page number
        existing: HashMap<u32, PathBuf>,
    },
}

/// Work out the resume state of a chapter from the download tree
///
/// An archive is only trusted when the chapter directory either carries the
/// marker or holds no loose pages. A partial archive written under a
/// permissive policy keeps its loose pages and no marker, so it is redone.
pub(crate) async fn inspect(
    layout: &Layout,
    source: &SourceId,
    slug: &SeriesSlug,
    chapter: &ChapterDescriptor,
) -> Result<ResumeState> {
    let chapter_dir = layout.chapter_dir(source, slug, chapter);
    let pages = Layout::list_page_files(&chapter_dir).await?;
    let marker = read_marker(&layout.marker_path(source, slug, chapter)).await;

    let archive_path = layout.archive_path(source, slug, chapter);
    if tokio::fs::try_exists(&archive_path).await? && (marker.is_some() || pages.is_empty()) {
        let listing_path = archive_path.clone();
        let entries = tokio::task::spawn_blocking(move || ArchivePackager::list_entries(&listing_path))
            .await
            .ok()
            .and_then(|r| r.ok());
        match entries {
            Some(entries) if !entries.is_empty() => {
                return Ok(ResumeState::Archived(ArchiveArtifact {
                    chapter_index: chapter.index,
                    path: archive_path,
                    page_count: entries.len(),
                }));
            }
            _ => {
                tracing::warn!(path = ?archive_path, "Existing archive unreadable, chapter will be redone");
            }
        }
    }

    if let Some(marker) = marker
        && is_complete_set(&pages, marker.pages)
    {
        return Ok(ResumeState::Downloaded(pages));
    }

    Ok(ResumeState::Fresh {
        existing: pages.into_iter().collect(),
    })
}

/// Pages are exactly 1..=expected
fn is_complete_set(pages: &[(u32, PathBuf)], expected: usize) -> bool {
    expected > 0
        && pages.len() == expected
        && pages
            .iter()
            .enumerate()
            .all(|(i, (page, _))| *page as usize == i + 1)
}

async fn read_marker(path: &Path) -> Option<CompletionMarker> {
    let raw = tokio::fs::read(path).await.ok()?;
    match serde_json::from_slice(&raw) {
        Ok(marker) => Some(marker),
        Err(e) => {
            tracing::warn!(?path, error = %e, "Ignoring malformed completion marker");
            None
        }
    }
}

/// Record that a chapter completed with `pages` pages
pub(crate) async fn write_marker(
    layout: &Layout,
    source: &SourceId,
    slug: &SeriesSlug,
    chapter: &ChapterDescriptor,
    pages: usize,
) -> Result<()> {
    let raw = serde_json::to_vec(&CompletionMarker { pages })?;
    write_atomic(
        &layout.marker_path(source, slug, chapter),
        &layout.temp_marker_path(source, slug, chapter),
        &raw,
    )
    .await
}
