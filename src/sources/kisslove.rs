//! KissLove (`klz9.com` JSON API)
//!
//! Every request is signed: `X-Client-Ts` carries the unix time in seconds and
//! `X-Client-Sig` the hex SHA-256 of `"{ts}.{CLIENT_ID}"`. The API is loosely
//! typed, so fields are read with fallbacks instead of a fixed serde schema.

use super::traits::{SourceAdapter, number_chapters, pages_from_urls};
use crate::error::{Error, Result};
use crate::http_client::{FetchClient, RequestOptions};
use crate::types::{ChapterDescriptor, PageRef, SearchHit, SeriesInfo, SeriesSlug, SeriesStatus, SourceId};
use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Registry key
pub const SOURCE_ID: &str = "kisslove";

/// Production base URL
pub const BASE_URL: &str = "https://klz9.com";

/// Public client identifier mixed into the request signature
pub const CLIENT_ID: &str = "KL9K40zaSyC9K40vOMLLbEcepIFBhUKXwELqxlwTEF";

/// Items per page when browsing without a query
const BROWSE_LIMIT: u32 = 36;

/// Scanlation credit pages injected into chapters
const FILTERED_IMAGES: &[&str] = &[
    "https://1.bp.blogspot.com/-ZMyVQcnjYyE/W2cRdXQb15I/AAAAAAACDnk/8X1Hm7wmhz4hLvpIzTNBHQnhuKu05Qb0gCHMYCw/s0/LHScan.png",
    "https://s4.imfaclub.com/images/20190814/Credit_LHScan_5d52edc2409e7.jpg",
    "https://s4.imfaclub.com/images/20200112/5e1ad960d67b2_5e1ad962338c7.jpg",
];

/// Retired image hosts and the CDN host now serving their files
const IMAGE_HOST_MAPPING: &[(&str, &str)] = &[
    ("imfaclub.com", "j1.jfimv2.xyz"),
    ("s2.imfaclub.com", "j2.jfimv2.xyz"),
    ("s4.imfaclub.com", "j4.jfimv2.xyz"),
    ("ihlv1.xyz", "j1.jfimv2.xyz"),
    ("s2.ihlv1.xyz", "j2.jfimv2.xyz"),
    ("s4.ihlv1.xyz", "j4.jfimv2.xyz"),
    ("h1.klimv1.xyz", "j1.jfimv2.xyz"),
    ("h2.klimv1.xyz", "j2.jfimv2.xyz"),
    ("h4.klimv1.xyz", "j4.jfimv2.xyz"),
];

/// KissLove adapter
pub struct KissLove {
    id: SourceId,
    base_url: String,
    fetch: FetchClient,
}

impl KissLove {
    /// Adapter against the production API
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

    fn signed_options(&self) -> RequestOptions {
        RequestOptions::with_referer(Some(&self.base_url)).signed(signature_headers)
    }

    async fn get_json(&self, path: &str, options: RequestOptions, what: &str) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        self.fetch
            .get_json(&self.id, &url, &options)
            .await
            .map_err(|e| e.or_not_found(SOURCE_ID, what))
    }

    async fn series_payload(&self, slug: &SeriesSlug) -> Result<Value> {
        let path = format!("api/manga/slug/{}", urlencoding::encode(slug.as_str()));
        self.get_json(&path, self.signed_options(), slug.as_str()).await
    }
}

#[async_trait]
impl SourceAdapter for KissLove {
    fn id(&self) -> &SourceId {
        &self.id
    }

    fn referer(&self) -> Option<&str> {
        Some(&self.base_url)
    }

    async fn search(&self, query: &str, page: u32) -> Result<Vec<SearchHit>> {
        let page = page.max(1);
        let query = query.trim();
        let payload = if query.is_empty() {
            let options = self
                .signed_options()
                .query("page", page)
                .query("limit", BROWSE_LIMIT);
            self.get_json("api/manga", options, "latest").await?
        } else {
            let options = self
                .signed_options()
                .query("search", query)
                .query("sort", "Popular")
                .query("order", "desc")
                .query("page", page);
            self.get_json("api/manga/list", options, query).await?
        };

        let hits = parse_search(&payload);
        tracing::debug!(source = SOURCE_ID, query = query, page = page, hits = hits.len(), "Search parsed");
        Ok(hits)
    }

    async fn fetch_info(&self, slug: &SeriesSlug) -> Result<SeriesInfo> {
        let payload = self.series_payload(slug).await?;
        parse_info(&payload, slug)
    }

    async fn list_chapters(&self, slug: &SeriesSlug) -> Result<Vec<ChapterDescriptor>> {
        let payload = self.series_payload(slug).await?;
        parse_chapters(&payload)
    }

    async fn list_chapter_pages(
        &self,
        _slug: &SeriesSlug,
        chapter: &ChapterDescriptor,
    ) -> Result<Vec<PageRef>> {
        let path = format!("api/chapter/{}", urlencoding::encode(&chapter.id));
        let payload = self.get_json(&path, self.signed_options(), &chapter.id).await?;
        let urls = parse_page_urls(&payload)?;
        Ok(pages_from_urls(chapter, urls))
    }

    async fn resolve_image_url(&self, page: &PageRef) -> Result<String> {
        Ok(map_image_host(&page.url))
    }
}

/// `X-Client-Sig` and `X-Client-Ts` for the current second
fn signature_headers() -> Vec<(String, String)> {
    let ts = chrono::Utc::now().timestamp();
    vec![
        ("X-Client-Sig".to_string(), sign(ts)),
        ("X-Client-Ts".to_string(), ts.to_string()),
    ]
}

/// Hex SHA-256 of `"{ts}.{CLIENT_ID}"`
pub(crate) fn sign(ts: i64) -> String {
    format!("{:x}", Sha256::digest(format!("{ts}.{CLIENT_ID}").as_bytes()))
}

/// Rewrite retired image hosts to their current CDN host
pub(crate) fn map_image_host(url: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(url) else {
        return url.to_string();
    };
    let Some(new_host) = parsed.host_str().and_then(|host| {
        IMAGE_HOST_MAPPING
            .iter()
            .find(|(old, _)| *old == host)
            .map(|(_, new)| *new)
    }) else {
        return url.to_string();
    };
    match parsed.set_host(Some(new_host)) {
        Ok(()) => parsed.to_string(),
        Err(_) => url.to_string(),
    }
}

/// First non-empty string (or number rendered as string) among `keys`
fn first_str(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn unexpected(what: &str) -> Error {
    Error::source_unavailable(SOURCE_ID, format!("unexpected {what} payload shape"))
}

/// Search or browse payload (`{ "items": [...] }` or a bare array)
pub(crate) fn parse_search(payload: &Value) -> Vec<SearchHit> {
    let items: &[Value] = match payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(_) => payload
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        _ => &[],
    };

    items
        .iter()
        .filter_map(|item| {
            let slug = first_str(item, &["slug", "url", "mangaSlug"])?;
            let title = first_str(item, &["name", "title", "mangaName"]).unwrap_or_else(|| slug.clone());
            Some(SearchHit {
                slug: SeriesSlug::new(slug),
                title,
                thumbnail: first_str(item, &["cover", "thumbnail", "image"]),
            })
        })
        .collect()
}

/// Series payload from `api/manga/slug/{slug}`
pub(crate) fn parse_info(payload: &Value, slug: &SeriesSlug) -> Result<SeriesInfo> {
    if !payload.is_object() {
        return Err(unexpected("series"));
    }
    Ok(SeriesInfo {
        slug: slug.clone(),
        title: first_str(payload, &["name", "title", "mangaName"]).unwrap_or_else(|| slug.to_string()),
        description: first_str(payload, &["description", "summary"]).unwrap_or_default(),
        cover_url: first_str(payload, &["cover", "thumbnail", "image"]),
        status: first_str(payload, &["status"])
            .map(|s| SeriesStatus::from_label(&s))
            .unwrap_or_default(),
        chapter_count: payload
            .get("chapters")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0),
    })
}

/// Chapters embedded in the series payload, ascending by chapter number
///
/// Chapters whose number is missing or not numeric sort first.
pub(crate) fn parse_chapters(payload: &Value) -> Result<Vec<ChapterDescriptor>> {
    if !payload.is_object() {
        return Err(unexpected("series"));
    }
    let Some(raw) = payload.get("chapters").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let mut chapters: Vec<ChapterDescriptor> = raw.iter().map(parse_chapter).collect();
    chapters.sort_by(|a, b| sort_key(a).total_cmp(&sort_key(b)));
    number_chapters(&mut chapters);
    Ok(chapters)
}

fn parse_chapter(raw: &Value) -> ChapterDescriptor {
    let slug = first_str(raw, &["slug", "chapter_slug", "chapterSlug"]);
    let id = first_str(raw, &["id", "chapter_id", "chapterId"])
        .or_else(|| slug.clone())
        .or_else(|| first_str(raw, &["chapter", "title", "name"]))
        .unwrap_or_else(|| "unknown".to_string());
    let number = first_str(raw, &["chapter", "chapterNumber", "number"]);
    let title = first_str(raw, &["title", "name"]).unwrap_or_else(|| match &number {
        Some(number) => format!("Chapter {number}"),
        None => format!("Chapter {}", slug.as_deref().unwrap_or(&id)),
    });

    ChapterDescriptor {
        index: 0,
        id,
        number,
        title,
        page_count: None,
    }
}

fn sort_key(chapter: &ChapterDescriptor) -> f64 {
    chapter
        .number
        .as_deref()
        .and_then(|n| n.parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(-1.0)
}

/// Image URLs from a chapter payload, credit pages removed
pub(crate) fn parse_page_urls(payload: &Value) -> Result<Vec<String>> {
    let content = payload
        .get("content")
        .and_then(Value::as_str)
        .ok_or_else(|| unexpected("chapter"))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !FILTERED_IMAGES.contains(line))
        .map(str::to_string)
        .collect())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::throttle::SourceThrottle;
    use serde_json::json;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn signature_is_hex_sha256_and_time_dependent() {
        let sig = sign(1_700_000_000);
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(sig, sign(1_700_000_000));
        assert_ne!(sig, sign(1_700_000_001));
    }

    #[test]
    fn legacy_hosts_are_remapped() {
        assert_eq!(
            map_image_host("https://s4.imfaclub.com/images/a/1.jpg?x=1"),
            "https://j4.jfimv2.xyz/images/a/1.jpg?x=1"
        );
        assert_eq!(
            map_image_host("https://h2.klimv1.xyz/p/2.png"),
            "https://j2.jfimv2.xyz/p/2.png"
        );
        assert_eq!(map_image_host("https://cdn.other/p/3.png"), "https://cdn.other/p/3.png");
        assert_eq!(map_image_host("not a url"), "not a url");
    }

    #[test]
    fn search_accepts_items_object_or_array() {
        let wrapped = json!({ "items": [
            { "slug": "one-piece", "name": "One Piece", "cover": "https://c/1.jpg" },
            { "url": "naruto", "title": "Naruto" },
            { "name": "no slug" }
        ]});
        let hits = parse_search(&wrapped);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].thumbnail.as_deref(), Some("https://c/1.jpg"));
        assert_eq!(hits[1].slug.as_str(), "naruto");
        assert_eq!(hits[1].title, "Naruto");

        let bare = json!([{ "mangaSlug": "bleach", "mangaName": "Bleach", "image": "i" }]);
        let hits = parse_search(&bare);
        assert_eq!(hits[0].slug.as_str(), "bleach");
        assert_eq!(hits[0].thumbnail.as_deref(), Some("i"));

        assert!(parse_search(&json!("nope")).is_empty());
    }

    #[test]
    fn chapters_sort_numerically_with_fallback_fields() {
        let payload = json!({
            "name": "One Piece",
            "chapters": [
                { "id": 30, "chapter": "10" },
                { "chapter_id": "c2", "chapterNumber": 2, "title": "Two" },
                { "chapterId": "c9", "number": "9.5" },
                { "slug": "extra" }
            ]
        });
        let chapters = parse_chapters(&payload).unwrap();

        let ids: Vec<&str> = chapters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["extra", "c2", "c9", "30"]);
        let indices: Vec<u32> = chapters.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
        assert_eq!(chapters[0].title, "Chapter extra");
        assert_eq!(chapters[1].title, "Two");
        assert_eq!(chapters[3].title, "Chapter 10");
    }

    #[test]
    fn info_reads_fallback_fields() {
        let payload = json!({
            "title": "One Piece",
            "summary": "Pirates.",
            "thumbnail": "https://c/op.jpg",
            "status": "Completed",
            "chapters": [{ "id": 1 }, { "id": 2 }]
        });
        let info = parse_info(&payload, &SeriesSlug::new("one-piece")).unwrap();
        assert_eq!(info.title, "One Piece");
        assert_eq!(info.description, "Pirates.");
        assert_eq!(info.status, SeriesStatus::Completed);
        assert_eq!(info.chapter_count, 2);

        assert!(matches!(
            parse_info(&json!([1, 2]), &SeriesSlug::new("x")),
            Err(Error::SourceUnavailable { .. })
        ));
    }

    #[test]
    fn page_content_is_split_and_filtered() {
        let payload = json!({
            "content": format!(
                "https://cdn/1.jpg\n\n  https://cdn/2.jpg  \n{}\nhttps://cdn/3.jpg",
                FILTERED_IMAGES[1]
            )
        });
        let urls = parse_page_urls(&payload).unwrap();
        assert_eq!(urls, vec!["https://cdn/1.jpg", "https://cdn/2.jpg", "https://cdn/3.jpg"]);

        assert!(parse_page_urls(&json!({ "id": 1 })).is_err());
    }

    fn adapter(server: &MockServer) -> KissLove {
        let fetch = FetchClient::new(&HttpConfig::default(), SourceThrottle::default()).unwrap();
        KissLove::with_base_url(fetch, server.uri())
    }

    #[tokio::test]
    async fn requests_are_signed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/manga/list"))
            .and(query_param("search", "one piece"))
            .and(query_param("sort", "Popular"))
            .and(query_param("order", "desc"))
            .and(query_param("page", "1"))
            .and(header_exists("x-client-sig"))
            .and(header_exists("x-client-ts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let hits = adapter(&server).search("one piece", 1).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn empty_query_browses_latest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/manga"))
            .and(query_param("limit", "36"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{ "slug": "a", "name": "A" }])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let hits = adapter(&server).search("", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn missing_series_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/manga/slug/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .fetch_info(&SeriesSlug::new("ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn chapter_pages_come_from_chapter_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chapter/c2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": "https://s2.ihlv1.xyz/a/1.jpg\nhttps://s2.ihlv1.xyz/a/2.jpg"
            })))
            .mount(&server)
            .await;

        let adapter = adapter(&server);
        let chapter = ChapterDescriptor {
            index: 4,
            id: "c2".to_string(),
            number: Some("2".to_string()),
            title: "Two".to_string(),
            page_count: None,
        };
        let pages = adapter
            .list_chapter_pages(&SeriesSlug::new("one-piece"), &chapter)
            .await
            .unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].chapter_index, 4);
        assert_eq!(
            adapter.resolve_image_url(&pages[1]).await.unwrap(),
            "https://j2.jfimv2.xyz/a/2.jpg"
        );
    }
}
