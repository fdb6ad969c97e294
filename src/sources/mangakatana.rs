//! MangaKatana (HTML scraping)
//!
//! Series live at `/manga/<slug>`, chapters at `/manga/<slug>/c<n>`. The site
//! lists chapters newest first; they are reversed here so ordinals ascend. Page
//! images are not in the markup: an inline script declares them as a JS array
//! whose name is referenced next to a `data-src` attribute.

use super::traits::{SourceAdapter, number_chapters, pages_from_urls};
use crate::error::{Error, Result};
use crate::http_client::{FetchClient, RequestOptions};
use crate::types::{ChapterDescriptor, PageRef, SearchHit, SeriesInfo, SeriesSlug, SeriesStatus, SourceId};
use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// Registry key
pub const SOURCE_ID: &str = "mangakatana";

/// Production base URL
pub const BASE_URL: &str = "https://mangakatana.com";

type CachedRegex = LazyLock<std::result::Result<Regex, regex::Error>>;

static CHAPTER_NUMBER: CachedRegex = LazyLock::new(|| Regex::new(r"(\d+\.\d+|\d+)"));
static IMAGE_ARRAY_NAME: CachedRegex = LazyLock::new(|| Regex::new(r#"data-src['"],\s*(\w+)"#));
static ARRAY_DECL: CachedRegex = LazyLock::new(|| Regex::new(r"var\s+(\w+)\s*=\s*\[([^\]]*)\]"));
static QUOTED: CachedRegex = LazyLock::new(|| Regex::new(r"'([^']*)'"));

/// MangaKatana adapter
pub struct MangaKatana {
    id: SourceId,
    base_url: String,
    fetch: FetchClient,
}

impl MangaKatana {
    /// Adapter against the production site
    pub fn new(fetch: FetchClient) -> Self {
        Self::with_base_url(fetch, BASE_URL)
    }

    /// Adapter against another host (mirror, mock server)
    pub fn with_base_url(fetch: FetchClient, base_url: impl Into<String>) -> Self {
        Self {
            id: SourceId::new(SOURCE_ID),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            fetch,
        }
    }

    fn abs_url(&self, path: &str) -> String {
        if url::Url::parse(path).is_ok() {
            return path.to_string();
        }
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn series_url(&self, slug: &SeriesSlug) -> String {
        if slug.as_str().contains('/') {
            self.abs_url(slug.as_str())
        } else {
            self.abs_url(&format!("manga/{}", slug))
        }
    }

    fn options(&self) -> RequestOptions {
        RequestOptions::with_referer(Some(&self.base_url))
    }

    async fn get_html(&self, url: &str, what: &str) -> Result<String> {
        self.fetch
            .get_text(&self.id, url, &self.options())
            .await
            .map_err(|e| e.or_not_found(SOURCE_ID, what))
    }
}

#[async_trait]
impl SourceAdapter for MangaKatana {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn referer(&self) -> Option<&str> {
        Some(&self.base_url)
    }

    async fn search(&self, query: &str, page: u32) -> Result<Vec<SearchHit>> {
        let page = page.max(1);
        let query = query.trim();
        let html = if query.is_empty() {
            let url = self.abs_url(&format!("manga/page/{page}"));
            self.fetch.get_text(&self.id, &url, &self.options()).await?
        } else {
            let url = self.abs_url(&format!("page/{page}"));
            let options = self
                .options()
                .query("search", query)
                .query("search_by", "book_name");
            self.fetch.get_text(&self.id, &url, &options).await?
        };

        let hits = parse_search(&html, &self.base_url)?;
        tracing::debug!(source = SOURCE_ID, query = query, page = page, hits = hits.len(), "Search parsed");
        Ok(hits)
    }

    async fn fetch_info(&self, slug: &SeriesSlug) -> Result<SeriesInfo> {
        let html = self.get_html(&self.series_url(slug), slug.as_str()).await?;
        parse_info(&html, slug, &self.base_url)
    }

    async fn list_chapters(&self, slug: &SeriesSlug) -> Result<Vec<ChapterDescriptor>> {
        let html = self.get_html(&self.series_url(slug), slug.as_str()).await?;
        parse_chapters(&html)
    }

    async fn list_chapter_pages(
        &self,
        _slug: &SeriesSlug,
        chapter: &ChapterDescriptor,
    ) -> Result<Vec<PageRef>> {
        let html = self.get_html(&self.abs_url(&chapter.id), &chapter.id).await?;
        let urls = parse_page_urls(&html)?;
        Ok(pages_from_urls(chapter, urls))
    }

    async fn resolve_image_url(&self, page: &PageRef) -> Result<String> {
        Ok(self.abs_url(&page.url))
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| Error::source_unavailable(SOURCE_ID, format!("bad selector {css}: {e:?}")))
}

fn cached_regex(cached: &'static CachedRegex) -> Result<&'static Regex> {
    LazyLock::force(cached)
        .as_ref()
        .map_err(|e| Error::source_unavailable(SOURCE_ID, e.to_string()))
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Path component of an href, absolute hrefs reduced to their path
fn normalize_href(href: &str) -> String {
    match url::Url::parse(href) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) if href.starts_with('/') => href.to_string(),
        Err(_) => format!("/{href}"),
    }
}

/// Series slug from a series href (`.../manga/one-piece.21` -> `one-piece.21`)
fn slug_from_href(href: &str) -> Option<String> {
    normalize_href(href)
        .split('/')
        .filter(|segment| !segment.is_empty())
        .next_back()
        .map(str::to_string)
}

/// Search or browse listing
pub(crate) fn parse_search(html: &str, base_url: &str) -> Result<Vec<SearchHit>> {
    let document = Html::parse_document(html);
    let item_sel = selector("div#book_list > div.item")?;
    let title_sel = selector("div.text > h3 > a")?;
    let img_sel = selector("img")?;
    let base = url::Url::parse(&format!("{base_url}/")).ok();

    let mut hits = Vec::new();
    for item in document.select(&item_sel) {
        let Some(anchor) = item.select(&title_sel).next() else {
            continue;
        };
        let Some(slug) = anchor.value().attr("href").and_then(slug_from_href) else {
            continue;
        };
        let thumbnail = item
            .select(&img_sel)
            .next()
            .and_then(|img| img.value().attr("src").or_else(|| img.value().attr("data-src")))
            .map(|src| match &base {
                Some(base) => base.join(src).map(|u| u.to_string()).unwrap_or_else(|_| src.to_string()),
                None => src.to_string(),
            });
        hits.push(SearchHit {
            slug: SeriesSlug::new(slug),
            title: text_of(anchor),
            thumbnail,
        });
    }
    Ok(hits)
}

/// Series page metadata
pub(crate) fn parse_info(html: &str, slug: &SeriesSlug, base_url: &str) -> Result<SeriesInfo> {
    let chapter_count = parse_chapters(html)?.len();

    let document = Html::parse_document(html);
    let title = document
        .select(&selector("h1.heading")?)
        .next()
        .map(text_of)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| slug.to_string());
    let description = document
        .select(&selector("div.summary > p")?)
        .next()
        .map(text_of)
        .unwrap_or_default();
    let cover_url = document
        .select(&selector("div.cover img")?)
        .next()
        .and_then(|img| img.value().attr("src"))
        .map(|src| {
            url::Url::parse(&format!("{base_url}/"))
                .and_then(|base| base.join(src))
                .map(|u| u.to_string())
                .unwrap_or_else(|_| src.to_string())
        });
    let status = document
        .select(&selector(".value.status")?)
        .next()
        .map(|el| SeriesStatus::from_label(&text_of(el)))
        .unwrap_or_default();

    Ok(SeriesInfo {
        slug: slug.clone(),
        title,
        description,
        cover_url,
        status,
        chapter_count,
    })
}

/// Chapter table, reversed to ascending order and numbered from 1
///
/// A page with neither the series heading nor a chapter table is not a series
/// page as this adapter knows it, and is reported as [`Error::SourceUnavailable`].
pub(crate) fn parse_chapters(html: &str) -> Result<Vec<ChapterDescriptor>> {
    let document = Html::parse_document(html);
    let row_sel = selector("tr")?;
    let chapter_sel = selector(".chapter")?;
    let anchor_sel = selector("a")?;
    let number_re = cached_regex(&CHAPTER_NUMBER)?;

    let mut chapters = Vec::new();
    for row in document.select(&row_sel) {
        if row.select(&chapter_sel).next().is_none() {
            continue;
        }
        let Some(anchor) = row.select(&anchor_sel).next() else {
            continue;
        };
        let Some(href) = anchor.value().attr("href").map(str::trim).filter(|h| !h.is_empty()) else {
            continue;
        };
        let title = text_of(anchor);
        let number = number_re.captures(&title).map(|c| c[1].to_string());
        chapters.push(ChapterDescriptor {
            index: 0,
            id: normalize_href(href),
            number,
            title,
            page_count: None,
        });
    }

    if chapters.is_empty()
        && document.select(&selector("h1.heading")?).next().is_none()
        && document.select(&selector("div.chapters")?).next().is_none()
    {
        return Err(Error::source_unavailable(
            SOURCE_ID,
            "series page has no heading or chapter table",
        ));
    }

    chapters.reverse();
    number_chapters(&mut chapters);
    Ok(chapters)
}

/// Image URLs from the chapter reader's inline script
pub(crate) fn parse_page_urls(html: &str) -> Result<Vec<String>> {
    let document = Html::parse_document(html);
    let script = document
        .select(&selector("script")?)
        .map(|s| s.text().collect::<String>())
        .find(|text| text.contains("data-src"))
        .ok_or_else(|| Error::source_unavailable(SOURCE_ID, "reader script not found"))?;

    let array_name = cached_regex(&IMAGE_ARRAY_NAME)?
        .captures(&script)
        .map(|c| c[1].to_string())
        .ok_or_else(|| Error::source_unavailable(SOURCE_ID, "image array name not found"))?;

    let blob = cached_regex(&ARRAY_DECL)?
        .captures_iter(&script)
        .find(|c| c[1] == *array_name)
        .map(|c| c[2].to_string())
        .ok_or_else(|| {
            Error::source_unavailable(SOURCE_ID, format!("image array {array_name} not found"))
        })?;

    Ok(cached_regex(&QUOTED)?
        .captures_iter(&blob)
        .map(|c| c[1].to_string())
        .filter(|u| !u.is_empty())
        .collect())
}
