//! Chapter packaging into CBZ (zip) archives
//!
//! Entries are named with zero-padded page numbers so lexicographic order,
//! which most readers use, equals page order. The archive is written under a
//! temporary name and renamed once closed and synced; loose pages are removed
//! only after that rename succeeded.

use crate::error::{Error, Result};
use crate::layout::MARKER_FILE;
use crate::types::ArchiveArtifact;
use crate::utils::DEFAULT_EXTENSION;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Minimum digits in an entry name
const MIN_ENTRY_WIDTH: usize = 3;

/// Packs a chapter's page files into one archive
pub struct ArchivePackager;

impl ArchivePackager {
    /// Pack `pages` (page number, file) into `output`, writing through `temp`
    ///
    /// Pages are packed in page-number order whatever order they are given in.
    /// With `cleanup`, the loose page files, the chapter marker and the then
    /// empty chapter directory are removed after the archive is in place.
    ///
    /// # Errors
    ///
    /// [`Error::PackagingFailed`] when there are no pages, a page file is
    /// missing or unreadable, or the archive cannot be written. `output` is
    /// untouched in that case.
    pub async fn pack(
        chapter_index: u32,
        mut pages: Vec<(u32, PathBuf)>,
        output: &Path,
        temp: &Path,
        cleanup: bool,
    ) -> Result<ArchiveArtifact> {
        pages.sort_by_key(|(page, _)| *page);
        if pages.is_empty() {
            return Err(packaging_failed(output, "no pages to pack"));
        }

        let output_buf = output.to_path_buf();
        let temp_buf = temp.to_path_buf();
        let pages_for_writer = pages.clone();
        tokio::task::spawn_blocking(move || Self::write_archive(&pages_for_writer, &output_buf, &temp_buf))
            .await
            .map_err(|e| packaging_failed(output, format!("packaging task failed: {}", e)))??;

        info!(
            chapter = chapter_index,
            ?output,
            pages = pages.len(),
            "Chapter archive written"
        );

        if cleanup {
            Self::remove_loose_pages(&pages).await;
        }

        Ok(ArchiveArtifact {
            chapter_index,
            path: output.to_path_buf(),
            page_count: pages.len(),
        })
    }

    /// Entry name for a page (`001.jpg`, `0042.png` ...)
    pub fn entry_name(page: u32, width: usize, ext: &str) -> String {
        format!("{:0width$}.{}", page, ext, width = width)
    }

    /// Digits needed so every entry name has the same width
    pub fn entry_width(last_page: u32) -> usize {
        last_page.to_string().len().max(MIN_ENTRY_WIDTH)
    }

    /// Entry names of an existing archive, in stored order
    pub fn list_entries(path: &Path) -> Result<Vec<String>> {
        let file = std::fs::File::open(path)?;
        let archive = zip::ZipArchive::new(file)
            .map_err(|e| packaging_failed(path, format!("failed to read archive: {}", e)))?;
        Ok(archive.file_names().map(str::to_string).collect::<Vec<_>>())
    }

    fn write_archive(pages: &[(u32, PathBuf)], output: &Path, temp: &Path) -> Result<()> {
        let result = Self::write_entries(pages, temp, output);
        if result.is_err() {
            let _ = std::fs::remove_file(temp);
            return result;
        }
        std::fs::rename(temp, output)
            .map_err(|e| packaging_failed(output, format!("failed to move archive into place: {}", e)))
    }

    fn write_entries(pages: &[(u32, PathBuf)], temp: &Path, output: &Path) -> Result<()> {
        let last_page = pages.last().map(|(page, _)| *page).unwrap_or(0);
        let width = Self::entry_width(last_page);

        let file = std::fs::File::create(temp)
            .map_err(|e| packaging_failed(output, format!("failed to create archive: {}", e)))?;
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);

        for (page, path) in pages {
            let mut source = std::fs::File::open(path).map_err(|e| {
                packaging_failed(output, format!("page {} unreadable at {}: {}", page, path.display(), e))
            })?;
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or(DEFAULT_EXTENSION)
                .to_lowercase();
            let name = Self::entry_name(*page, width, &ext);
            debug!(entry = %name, "adding page to archive");

            writer
                .start_file(name, options)
                .map_err(|e| packaging_failed(output, format!("failed to start entry: {}", e)))?;
            std::io::copy(&mut source, &mut writer).map_err(|e| {
                packaging_failed(output, format!("failed to copy page {}: {}", page, e))
            })?;
        }

        let mut file = writer
            .finish()
            .map_err(|e| packaging_failed(output, format!("failed to finalize archive: {}", e)))?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    async fn remove_loose_pages(pages: &[(u32, PathBuf)]) {
        for (_, path) in pages {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(?path, error = %e, "failed to remove packed page");
            }
        }

        let Some(chapter_dir) = pages.first().and_then(|(_, path)| path.parent()) else {
            return;
        };
        let _ = tokio::fs::remove_file(chapter_dir.join(MARKER_FILE)).await;
        // Only succeeds when nothing else is left in the directory
        if tokio::fs::remove_dir(chapter_dir).await.is_ok() {
            debug!(?chapter_dir, "removed empty chapter directory");
        }
    }
}

fn packaging_failed(path: &Path, reason: impl Into<String>) -> Error {
    Error::PackagingFailed {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn write_pages(dir: &Path, count: u32) -> Vec<(u32, PathBuf)> {
        (1..=count)
            .map(|page| {
                let path = dir.join(format!("{page:04}.jpg"));
                std::fs::write(&path, format!("page {page}")).unwrap();
                (page, path)
            })
            .collect()
    }

    #[tokio::test]
    async fn entries_are_listed_in_page_order() {
        let temp_dir = TempDir::new().unwrap();
        let chapter_dir = temp_dir.path().join("chapter_0001");
        std::fs::create_dir(&chapter_dir).unwrap();
        let mut pages = write_pages(&chapter_dir, 12);
        // Completion order is not page order
        pages.reverse();
        let output = temp_dir.path().join("chapter_0001.cbz");
        let temp = temp_dir.path().join("chapter_0001.cbz.part");

        let artifact = ArchivePackager::pack(1, pages, &output, &temp, false)
            .await
            .unwrap();

        assert_eq!(artifact.page_count, 12);
        assert_eq!(artifact.path, output);
        let entries = ArchivePackager::list_entries(&output).unwrap();
        let expected: Vec<String> = (1..=12).map(|p| format!("{p:03}.jpg")).collect();
        assert_eq!(entries, expected);

        let mut sorted = entries.clone();
        sorted.sort();
        assert_eq!(sorted, entries, "lexicographic order must equal page order");

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&output).unwrap()).unwrap();
        let mut content = String::new();
        archive.by_name("010.jpg").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "page 10");

        // Loose pages are kept without cleanup
        assert!(chapter_dir.join("0001.jpg").exists());
        assert!(!temp.exists());
    }

    #[tokio::test]
    async fn cleanup_removes_pages_after_write() {
        let temp_dir = TempDir::new().unwrap();
        let chapter_dir = temp_dir.path().join("chapter_0002");
        std::fs::create_dir(&chapter_dir).unwrap();
        let pages = write_pages(&chapter_dir, 3);
        std::fs::write(chapter_dir.join(MARKER_FILE), br#"{"pages":3}"#).unwrap();
        let output = temp_dir.path().join("chapter_0002.cbz");

        let temp = temp_dir.path().join("chapter_0002.cbz.part");

        ArchivePackager::pack(2, pages, &output, &temp, true).await.unwrap();

        assert!(output.exists());
        assert!(!chapter_dir.exists());
        assert_eq!(ArchivePackager::list_entries(&output).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn missing_page_fails_and_keeps_loose_files() {
        let temp_dir = TempDir::new().unwrap();
        let pages = write_pages(temp_dir.path(), 3);
        std::fs::remove_file(&pages[1].1).unwrap();
        let output = temp_dir.path().join("chapter.cbz");
        let temp = temp_dir.path().join("chapter.cbz.part");

        let err = ArchivePackager::pack(1, pages.clone(), &output, &temp, true)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::PackagingFailed { .. }), "got {err:?}");
        assert!(!output.exists());
        assert!(!temp.exists());
        assert!(pages[0].1.exists(), "cleanup must not run after a failed pack");
    }

    #[tokio::test]
    async fn empty_page_set_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let output = temp_dir.path().join("chapter.cbz");
        let temp = temp_dir.path().join("chapter.cbz.part");
        let err = ArchivePackager::pack(1, Vec::new(), &output, &temp, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PackagingFailed { .. }));
    }

    #[test]
    fn entry_width_grows_with_page_count() {
        assert_eq!(ArchivePackager::entry_width(9), 3);
        assert_eq!(ArchivePackager::entry_width(999), 3);
        assert_eq!(ArchivePackager::entry_width(1000), 4);
        assert_eq!(ArchivePackager::entry_name(7, 4, "png"), "0007.png");
    }
}
