//! The capability contract every source implements

use crate::error::Result;
use crate::types::{ChapterDescriptor, PageRef, SearchHit, SeriesInfo, SeriesSlug, SourceId};
use async_trait::async_trait;

/// One supported website
///
/// Adapters are stateless between calls and never retry: every request goes
/// through the shared [`FetchClient`](crate::http_client::FetchClient), which
/// owns timeouts, backoff and throttling. An adapter only builds URLs and
/// translates the site's markup or JSON into the canonical types.
///
/// # Errors
///
/// - [`Error::NotFound`](crate::Error::NotFound) when a slug or chapter does not exist
/// - [`Error::SourceUnavailable`](crate::Error::SourceUnavailable) when the
///   response cannot be understood (site layout or API changed)
/// - [`Error::Transient`](crate::Error::Transient) /
///   [`Error::Permanent`](crate::Error::Permanent) passed through from the fetch client
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Registry key of this source
    fn id(&self) -> &SourceId;

    /// Referer the site's image hosts expect, if any
    fn referer(&self) -> Option<&str>;

    /// Search by title; an empty query browses the catalogue
    ///
    /// Zero hits is an empty vector, not an error.
    async fn search(&self, query: &str, page: u32) -> Result<Vec<SearchHit>>;

    /// Series metadata
    async fn fetch_info(&self, slug: &SeriesSlug) -> Result<SeriesInfo>;

    /// Every chapter of a series, ascending by index
    async fn list_chapters(&self, slug: &SeriesSlug) -> Result<Vec<ChapterDescriptor>>;

    /// Pages of one chapter, in reading order (page numbers start at 1)
    async fn list_chapter_pages(
        &self,
        slug: &SeriesSlug,
        chapter: &ChapterDescriptor,
    ) -> Result<Vec<PageRef>>;

    /// Direct image URL for a page, resolved just before it is fetched
    async fn resolve_image_url(&self, page: &PageRef) -> Result<String>;
}

/// Build page references from image URLs in reading order
pub(crate) fn pages_from_urls(chapter: &ChapterDescriptor, urls: Vec<String>) -> Vec<PageRef> {
    urls.into_iter()
        .enumerate()
        .map(|(i, url)| PageRef {
            chapter_index: chapter.index,
            number: i as u32 + 1,
            url,
        })
        .collect()
}

/// Assign 1-based ordinals to chapters already in ascending order
pub(crate) fn number_chapters(chapters: &mut [ChapterDescriptor]) {
    for (i, chapter) in chapters.iter_mut().enumerate() {
        chapter.index = i as u32 + 1;
    }
}
