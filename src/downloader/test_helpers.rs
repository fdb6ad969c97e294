//! Shared test helpers: an in-memory source whose images live on a mock server

use crate::config::Config;
use crate::downloader::MangaDownloader;
use crate::error::{Error, Result};
use crate::http_client::FetchClient;
use crate::sources::{SourceAdapter, SourceRegistry};
use crate::throttle::SourceThrottle;
use crate::types::{ChapterDescriptor, PageRef, SearchHit, SeriesInfo, SeriesSlug, SeriesStatus, SourceId};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Identifier the fake source registers under
pub(crate) const FAKE_SOURCE: &str = "fake";

/// Smallest valid PNG (1x1, transparent)
pub(crate) const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// In-memory source: chapter listing and page lists are local, images are
/// served by a [`MockServer`] under `/img/<chapter>/<page>.png`
pub(crate) struct FakeSource {
    id: SourceId,
    image_base: String,
    chapters: Vec<(ChapterDescriptor, usize)>,
    broken_chapters: HashSet<u32>,
    pub(crate) list_calls: AtomicUsize,
    pub(crate) page_list_calls: AtomicUsize,
}

impl FakeSource {
    /// `chapters` is (ordinal, page count)
    pub(crate) fn new(server: &MockServer, chapters: &[(u32, usize)]) -> Self {
        Self {
            id: SourceId::new(FAKE_SOURCE),
            image_base: server.uri(),
            chapters: chapters
                .iter()
                .map(|&(index, pages)| {
                    let chapter = ChapterDescriptor {
                        index,
                        id: format!("c{index}"),
                        number: Some(index.to_string()),
                        title: format!("Chapter {index}"),
                        page_count: Some(pages),
                    };
                    (chapter, pages)
                })
                .collect(),
            broken_chapters: HashSet::new(),
            list_calls: AtomicUsize::new(0),
            page_list_calls: AtomicUsize::new(0),
        }
    }

    /// Make the page listing of `chapter` fail
    pub(crate) fn with_broken_chapter(mut self, chapter: u32) -> Self {
        self.broken_chapters.insert(chapter);
        self
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn page_list_calls(&self) -> usize {
        self.page_list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for FakeSource {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn referer(&self) -> Option<&str> {
        None
    }

    async fn search(&self, query: &str, _page: u32) -> Result<Vec<SearchHit>> {
        Ok(vec![SearchHit {
            slug: SeriesSlug::new("series"),
            title: format!("Result for {query}"),
            thumbnail: None,
        }])
    }

    async fn fetch_info(&self, slug: &SeriesSlug) -> Result<SeriesInfo> {
        Ok(SeriesInfo {
            slug: slug.clone(),
            title: "Series".to_string(),
            description: String::new(),
            cover_url: None,
            status: SeriesStatus::Ongoing,
            chapter_count: 0,
        })
    }

    async fn list_chapters(&self, _slug: &SeriesSlug) -> Result<Vec<ChapterDescriptor>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.chapters.iter().map(|(c, _)| c.clone()).collect())
    }

    async fn list_chapter_pages(&self, _slug: &SeriesSlug, chapter: &ChapterDescriptor) -> Result<Vec<PageRef>> {
        self.page_list_calls.fetch_add(1, Ordering::SeqCst);
        if self.broken_chapters.contains(&chapter.index) {
            return Err(Error::source_unavailable(FAKE_SOURCE, "chapter page list missing"));
        }
        let pages = self
            .chapters
            .iter()
            .find(|(c, _)| c.index == chapter.index)
            .map(|(_, pages)| *pages)
            .ok_or_else(|| Error::not_found(FAKE_SOURCE, chapter.id.clone()))?;
        Ok((1..=pages as u32)
            .map(|number| PageRef {
                chapter_index: chapter.index,
                number,
                url: format!("{}{}", self.image_base, image_path(chapter.index, number)),
            })
            .collect())
    }

    async fn resolve_image_url(&self, page: &PageRef) -> Result<String> {
        Ok(page.url.clone())
    }
}

/// Mock server path of a page image
pub(crate) fn image_path(chapter: u32, page: u32) -> String {
    format!("/img/{chapter}/{page}.png")
}

/// Serve every page of a chapter
pub(crate) async fn mount_chapter(server: &MockServer, chapter: u32, pages: u32) {
    for page in 1..=pages {
        mount_page(server, chapter, page).await;
    }
}

/// Serve one page image
pub(crate) async fn mount_page(server: &MockServer, chapter: u32, page: u32) {
    Mock::given(method("GET"))
        .and(path(image_path(chapter, page)))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(TINY_PNG),
        )
        .mount(server)
        .await;
}

/// Requests the mock server received for one page image
pub(crate) async fn requests_for(server: &MockServer, chapter: u32, page: u32) -> usize {
    let wanted = image_path(chapter, page);
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == wanted)
        .count()
}

/// Total requests the mock server received
pub(crate) async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

/// Test configuration: no transport retries, fast logical retries
pub(crate) fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.default_source = FAKE_SOURCE.to_string();
    config.download.download_dir = temp_dir.path().join("downloads");
    config.download.page_concurrency = 3;
    config.download.page_retry_delay = Duration::from_millis(10);
    config.http.timeout = Duration::from_secs(5);
    config.http.retry.max_attempts = 0;
    config.http.retry.jitter = false;
    config
}

/// Helper to create a downloader serving only `source`
/// Returns the downloader, the shared source handle and the tempdir (which must be kept alive).
pub(crate) fn create_test_downloader(
    source: FakeSource,
    configure: impl FnOnce(&mut Config),
) -> (MangaDownloader, Arc<FakeSource>, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = test_config(&temp_dir);
    configure(&mut config);

    let fetch = FetchClient::new(&config.http, SourceThrottle::default()).unwrap();
    let source = Arc::new(source);
    let mut registry = SourceRegistry::new();
    registry.register(source.clone());

    let downloader = MangaDownloader::with_registry(config, fetch, registry);
    (downloader, source, temp_dir)
}
