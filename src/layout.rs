//! Filesystem layout
//!
//! Every on-disk path is derived here:
//!
//! ```text
//! <root>/<source>/<slug>/chapter_0001/0001.jpg
//! <root>/<source>/<slug>/chapter_0001/.complete
//! <root>/<source>/<slug>/chapter_0001.cbz
//! ```
//!
//! Files are written under a `.part` sibling first and renamed into place.
//!
//! Path derivation is pure; only [`Layout::ensure_dir`] and the directory
//! scans touch the filesystem.

use crate::error::Result;
use crate::types::{ChapterDescriptor, SeriesSlug, SourceId};
use crate::utils::sanitize_filename;
use std::path::{Path, PathBuf};

/// Extension of packaged chapters
pub const ARCHIVE_EXTENSION: &str = "cbz";

/// File name of the chapter completion marker
pub const MARKER_FILE: &str = ".complete";

/// Suffix for files that are still being written
pub const PART_SUFFIX: &str = "part";

/// Deterministic path derivation for downloaded content
#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Create a layout rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Download root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<source>/<slug>`
    pub fn series_dir(&self, source: &SourceId, slug: &SeriesSlug) -> PathBuf {
        self.root
            .join(sanitize_filename(source.as_str()))
            .join(sanitize_filename(slug.as_str()))
    }

    /// `<root>/<source>/<slug>/chapter_NNNN`
    pub fn chapter_dir(&self, source: &SourceId, slug: &SeriesSlug, chapter: &ChapterDescriptor) -> PathBuf {
        self.series_dir(source, slug).join(chapter_name(chapter))
    }

    /// `<chapter_dir>/NNNN.<ext>`
    pub fn page_path(
        &self,
        source: &SourceId,
        slug: &SeriesSlug,
        chapter: &ChapterDescriptor,
        page: u32,
        ext: &str,
    ) -> PathBuf {
        self.chapter_dir(source, slug, chapter)
            .join(format!("{}.{}", page_stem(page), ext))
    }

    /// Temporary name a page is written under before the rename
    pub fn temp_page_path(
        &self,
        source: &SourceId,
        slug: &SeriesSlug,
        chapter: &ChapterDescriptor,
        page: u32,
        ext: &str,
    ) -> PathBuf {
        part_path(&self.page_path(source, slug, chapter, page, ext))
    }

    /// Temporary name the chapter archive is written under
    pub fn temp_archive_path(&self, source: &SourceId, slug: &SeriesSlug, chapter: &ChapterDescriptor) -> PathBuf {
        part_path(&self.archive_path(source, slug, chapter))
    }

    /// Temporary name the completion marker is written under
    pub fn temp_marker_path(&self, source: &SourceId, slug: &SeriesSlug, chapter: &ChapterDescriptor) -> PathBuf {
        part_path(&self.marker_path(source, slug, chapter))
    }

    /// `<root>/<source>/<slug>/chapter_NNNN.cbz`
    pub fn archive_path(&self, source: &SourceId, slug: &SeriesSlug, chapter: &ChapterDescriptor) -> PathBuf {
        self.series_dir(source, slug)
            .join(format!("{}.{}", chapter_name(chapter), ARCHIVE_EXTENSION))
    }

    /// `<chapter_dir>/.complete`
    pub fn marker_path(&self, source: &SourceId, slug: &SeriesSlug, chapter: &ChapterDescriptor) -> PathBuf {
        self.chapter_dir(source, slug, chapter).join(MARKER_FILE)
    }

    /// Create a directory and its parents; an existing directory is not an error
    pub async fn ensure_dir(path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    /// Completed page files in `dir`, sorted by page number
    ///
    /// Temporary `.part` files, the marker and names that are not page numbers
    /// are ignored. A missing directory yields an empty list.
    pub async fn list_page_files(dir: &Path) -> Result<Vec<(u32, PathBuf)>> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut pages = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(page) = page_number(&path) {
                pages.push((page, path));
            }
        }
        pages.sort_by_key(|(page, _)| *page);
        Ok(pages)
    }
}

/// Directory / archive stem for a chapter
pub fn chapter_name(chapter: &ChapterDescriptor) -> String {
    format!("chapter_{:04}", chapter.index)
}

/// File stem for a page
pub fn page_stem(page: u32) -> String {
    format!("{page:04}")
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(PART_SUFFIX);
    path.with_file_name(name)
}

/// Page number encoded in a completed page file name
fn page_number(path: &Path) -> Option<u32> {
    let ext = path.extension()?.to_str()?;
    if ext == PART_SUFFIX {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}
