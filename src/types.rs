//! Core types for manga-fetcher

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Identifier of one source adapter (registry key)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    /// Create a new SourceId (normalized to trimmed lowercase)
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().trim().to_lowercase())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source-scoped identifier of one series
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeriesSlug(String);

impl SeriesSlug {
    /// Create a new SeriesSlug
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SeriesSlug {
    fn from(slug: &str) -> Self {
        Self::new(slug)
    }
}

impl std::fmt::Display for SeriesSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One search hit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Series slug on this source
    pub slug: SeriesSlug,
    /// Display title
    pub title: String,
    /// Thumbnail URL, when the source provides one
    pub thumbnail: Option<String>,
}

/// Publication status of a series
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesStatus {
    /// Still publishing
    Ongoing,
    /// Finished
    Completed,
    /// Source did not say
    #[default]
    Unknown,
}

impl SeriesStatus {
    /// Map a free-form status label from a source
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        if label.contains("ongoing") || label.contains("publishing") {
            SeriesStatus::Ongoing
        } else if label.contains("complete") || label.contains("finished") {
            SeriesStatus::Completed
        } else {
            SeriesStatus::Unknown
        }
    }
}

/// Series metadata returned by `fetch_info`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesInfo {
    /// Series slug
    pub slug: SeriesSlug,
    /// Display title
    pub title: String,
    /// Synopsis, possibly empty
    pub description: String,
    /// Cover image URL
    pub cover_url: Option<String>,
    /// Publication status
    pub status: SeriesStatus,
    /// Number of chapters the source lists
    pub chapter_count: usize,
}

/// One chapter of a series, in source-native ascending order
///
/// `index` is the 1-based ordinal reported by the source; caller ranges are
/// matched against it, not against positions in the chapter vector.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterDescriptor {
    /// 1-based ordinal
    pub index: u32,
    /// Token the adapter uses to fetch the chapter (id or URL path)
    pub id: String,
    /// Chapter number as printed by the source ("12", "12.5"), if any
    pub number: Option<String>,
    /// Display title
    pub title: String,
    /// Page count, when known without fetching the chapter
    pub page_count: Option<usize>,
}

/// One page of a chapter
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    /// Chapter ordinal this page belongs to
    pub chapter_index: u32,
    /// 1-based page number
    pub number: u32,
    /// Image URL as listed by the source (may need resolution before fetching)
    pub url: String,
}

/// Bytes of a fetched resource plus the metadata needed to store it
#[derive(Clone, Debug)]
pub struct FetchedBody {
    /// Response body
    pub bytes: Vec<u8>,
    /// `Content-Type` header, if any
    pub content_type: Option<String>,
    /// URL after redirects
    pub final_url: String,
}

/// Outcome class for one page download
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Page is on disk under its final name
    Success,
    /// Page failed with transient errors until its retry budget ran out
    RetryableFailure,
    /// Page failed with a permanent error
    PermanentFailure,
}

/// Per-page download result
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    /// Page number
    pub page: u32,
    /// Outcome class
    pub status: PageStatus,
    /// Bytes written (0 on failure or when the page was already present)
    pub bytes: u64,
    /// Logical retries spent on this page
    pub retries: u32,
    /// Final path of the page file on success
    pub path: Option<PathBuf>,
    /// Whether the page was already on disk and no request was made
    pub reused: bool,
    /// Error detail on failure
    pub error: Option<String>,
}

impl PageResult {
    /// Whether the page ended up on disk
    pub fn is_success(&self) -> bool {
        self.status == PageStatus::Success
    }
}

/// A failed page, as listed in a chapter report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    /// Page number
    pub page: u32,
    /// Retryable or permanent
    pub status: PageStatus,
    /// Error detail
    pub reason: String,
}

/// Chapter-level outcome
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ChapterStatus {
    /// Every page downloaded
    Complete,
    /// Chapter was already complete on disk; nothing was fetched
    AlreadyPresent,
    /// Some pages failed
    PartiallyFailed,
    /// The chapter could not be processed at all (page list unavailable, ...)
    Failed {
        /// Why the chapter failed
        reason: String,
    },
    /// Every page is on disk but the requested archive could not be written
    PackagingFailed {
        /// Packager error
        reason: String,
    },
    /// Cancelled before the chapter finished
    Cancelled,
}

/// Packaged chapter archive
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveArtifact {
    /// Chapter ordinal
    pub chapter_index: u32,
    /// Archive file path
    pub path: PathBuf,
    /// Pages packed
    pub page_count: usize,
}

/// Report for one chapter
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChapterDownloadReport {
    /// The chapter processed
    pub chapter: ChapterDescriptor,
    /// Chapter-level outcome
    pub status: ChapterStatus,
    /// Pages in the chapter's page list
    pub requested_pages: usize,
    /// Pages on disk at the end of the run
    pub succeeded_pages: usize,
    /// Failed pages with reasons, ordered by page number
    pub failed_pages: Vec<PageFailure>,
    /// Per-page results keyed by page number
    pub pages: BTreeMap<u32, PageResult>,
    /// Wall time spent on this chapter
    pub elapsed: Duration,
    /// Archive written for this chapter, if any
    pub archive: Option<ArchiveArtifact>,
    /// Packaging error, if packaging was attempted and failed
    pub archive_error: Option<String>,
}

impl ChapterDownloadReport {
    /// Report for a chapter that failed before page downloads started
    pub fn failed(chapter: ChapterDescriptor, reason: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            chapter,
            status: ChapterStatus::Failed {
                reason: reason.into(),
            },
            requested_pages: 0,
            succeeded_pages: 0,
            failed_pages: Vec::new(),
            pages: BTreeMap::new(),
            elapsed,
            archive: None,
            archive_error: None,
        }
    }

    /// Whether every requested page is on disk and any requested archive exists
    pub fn is_complete(&self) -> bool {
        matches!(
            self.status,
            ChapterStatus::Complete | ChapterStatus::AlreadyPresent
        )
    }

    /// Logical retries spent on a page (0 if the page is unknown)
    pub fn retries_for(&self, page: u32) -> u32 {
        self.pages.get(&page).map(|p| p.retries).unwrap_or(0)
    }
}

/// Aggregate report for one download request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadReport {
    /// Source used
    pub source: SourceId,
    /// Series slug
    pub slug: SeriesSlug,
    /// Chapter reports in resolved-range order
    pub chapters: Vec<ChapterDownloadReport>,
    /// Whether the run was cancelled before every chapter was attempted
    pub cancelled: bool,
    /// Total wall time
    pub elapsed: Duration,
}

impl DownloadReport {
    /// Chapters that ended complete (downloaded now or already present)
    pub fn completed_chapters(&self) -> usize {
        self.chapters.iter().filter(|c| c.is_complete()).count()
    }

    /// Chapters that did not end complete
    pub fn failed_chapters(&self) -> Vec<&ChapterDownloadReport> {
        self.chapters.iter().filter(|c| !c.is_complete()).collect()
    }

    /// Pages requested across all chapters
    pub fn requested_pages(&self) -> usize {
        self.chapters.iter().map(|c| c.requested_pages).sum()
    }

    /// Pages on disk across all chapters
    pub fn succeeded_pages(&self) -> usize {
        self.chapters.iter().map(|c| c.succeeded_pages).sum()
    }

    /// Archives written during this run or found already present
    pub fn archives(&self) -> Vec<&ArchiveArtifact> {
        self.chapters.iter().filter_map(|c| c.archive.as_ref()).collect()
    }

    /// Chapter ordinals a caller should retry
    pub fn retry_indices(&self) -> Vec<u32> {
        self.failed_chapters()
            .iter()
            .map(|c| c.chapter.index)
            .collect()
    }
}

/// Progress events broadcast while a request runs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Chapter range resolved
    RangeResolved {
        /// Source used
        source: SourceId,
        /// Series slug
        slug: SeriesSlug,
        /// Resolved chapter ordinals
        chapters: Vec<u32>,
    },
    /// Chapter processing started
    ChapterStarted {
        /// Chapter ordinal
        chapter: u32,
        /// Pages in the page list
        pages: usize,
    },
    /// Chapter skipped because it is already complete on disk
    ChapterSkipped {
        /// Chapter ordinal
        chapter: u32,
    },
    /// Page written
    PageDownloaded {
        /// Chapter ordinal
        chapter: u32,
        /// Page number
        page: u32,
        /// Bytes written
        bytes: u64,
    },
    /// Page failed transiently and will be retried
    PageRetrying {
        /// Chapter ordinal
        chapter: u32,
        /// Page number
        page: u32,
        /// Retry number (1-based)
        attempt: u32,
        /// Error detail
        error: String,
    },
    /// Page failed for good
    PageFailed {
        /// Chapter ordinal
        chapter: u32,
        /// Page number
        page: u32,
        /// Error detail
        error: String,
    },
    /// Chapter finished (any status)
    ChapterFinished {
        /// Chapter ordinal
        chapter: u32,
        /// Pages on disk
        succeeded: usize,
        /// Pages failed
        failed: usize,
    },
    /// Archive written
    ArchiveCreated {
        /// Chapter ordinal
        chapter: u32,
        /// Archive path
        path: PathBuf,
    },
    /// Run cancelled
    Cancelled,
}

/// Request from the CLI/TUI layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Source to use (None = configured default)
    pub source: Option<SourceId>,
    /// What to do
    pub command: Command,
}

/// Command carried by a [`Request`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Search the source
    Search {
        /// Query string (empty = browse)
        query: String,
        /// 1-based result page
        page: u32,
    },
    /// Fetch series info
    Info {
        /// Series slug
        slug: SeriesSlug,
    },
    /// List all chapters of a series
    ListChapters {
        /// Series slug
        slug: SeriesSlug,
    },
    /// Download a chapter range
    Download(DownloadRequest),
}

/// Download parameters
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRequest {
    /// Series slug
    pub slug: SeriesSlug,
    /// First chapter ordinal (None = 1)
    pub start: Option<u32>,
    /// Last chapter ordinal (None = through the last available)
    pub end: Option<u32>,
    /// Package each complete chapter into an archive
    pub want_archive: bool,
}

/// Result of executing a [`Request`]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutput {
    /// Search hits
    Search {
        /// Hits in source order
        hits: Vec<SearchHit>,
    },
    /// Series info plus chapter listing
    Info {
        /// Series metadata
        info: SeriesInfo,
        /// Chapters in ascending order
        chapters: Vec<ChapterDescriptor>,
    },
    /// Chapter listing
    Chapters {
        /// Chapters in ascending order
        chapters: Vec<ChapterDescriptor>,
    },
    /// Download report
    Download(DownloadReport),
}

/// Snapshot of the aggregate progress counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Chapters finished (any status)
    pub chapters_finished: u64,
    /// Pages written
    pub pages_downloaded: u64,
    /// Pages already on disk
    pub pages_reused: u64,
    /// Pages failed
    pub pages_failed: u64,
    /// Bytes written
    pub bytes_downloaded: u64,
}
