//! Source fixtures: MangaKatana markup and KissLove payloads served by a mock server

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// JPEG magic plus padding; enough for extension sniffing
pub const FAKE_JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01];

/// MangaKatana series page listing `chapters` chapters, newest first
pub fn katana_series_html(slug: &str, title: &str, chapters: u32) -> String {
    let rows: String = (1..=chapters)
        .rev()
        .map(|n| {
            format!(
                r#"<tr><td><div class="chapter"><a href="/manga/{slug}/c{n}">Chapter {n}</a></div></td><td class="update_time">Jan 1, 2024</td></tr>"#
            )
        })
        .collect();
    format!(
        r#"<html><body>
        <div class="media"><div class="cover"><img src="/imgs/cover/{slug}.jpg"></div></div>
        <div class="info">
          <h1 class="heading">{title}</h1>
          <ul class="meta"><li><div class="label">Status:</div><div class="value status ongoing">Ongoing</div></li></ul>
        </div>
        <div class="summary"><p>A test series.</p></div>
        <div class="chapters"><table><tbody>{rows}</tbody></table></div>
        </body></html>"#
    )
}

/// MangaKatana reader page whose inline script lists `pages` images on `image_base`
pub fn katana_reader_html(image_base: &str, chapter: u32, pages: u32) -> String {
    let urls: Vec<String> = (1..=pages)
        .map(|p| format!("'{}'", katana_image_url(image_base, chapter, p)))
        .collect();
    format!(
        r#"<html><body>
        <div id="imgs"></div>
        <script>
          var ytaw=['https://decoy.invalid/1.jpg'];
          var thzq=[{},];
          $('#imgs').append('<img data-src',thzq);
        </script>
        </body></html>"#,
        urls.join(",")
    )
}

/// Image URL used by the MangaKatana fixtures
pub fn katana_image_url(image_base: &str, chapter: u32, page: u32) -> String {
    format!("{image_base}/imgs/{chapter}/{page}.jpg")
}

/// Serve a whole MangaKatana series: series page, reader pages and images
pub async fn mount_katana_series(server: &MockServer, slug: &str, chapters: u32, pages: u32) {
    Mock::given(method("GET"))
        .and(path(format!("/manga/{slug}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(katana_series_html(slug, "One Piece", chapters)))
        .mount(server)
        .await;

    for chapter in 1..=chapters {
        Mock::given(method("GET"))
            .and(path(format!("/manga/{slug}/c{chapter}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(katana_reader_html(&server.uri(), chapter, pages)),
            )
            .mount(server)
            .await;

        for page in 1..=pages {
            Mock::given(method("GET"))
                .and(path(format!("/imgs/{chapter}/{page}.jpg")))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("content-type", "image/jpeg")
                        .set_body_bytes(FAKE_JPEG),
                )
                .mount(server)
                .await;
        }
    }
}

/// KissLove series payload; chapter ids are `100 + n`, listed in scrambled order
pub fn kisslove_series_json(slug: &str, chapters: u32) -> serde_json::Value {
    let mut list: Vec<serde_json::Value> = (1..=chapters)
        .map(|n| json!({ "id": 100 + n, "chapter": n.to_string(), "slug": format!("{slug}-chapter-{n}") }))
        .collect();
    list.reverse();
    json!({
        "slug": slug,
        "name": "Solo Leveling",
        "description": "Hunters.",
        "cover": "https://cdn.invalid/cover.jpg",
        "status": "Completed",
        "chapters": list,
    })
}

/// Serve a whole KissLove series: series payload, chapter payloads and images
pub async fn mount_kisslove_series(server: &MockServer, slug: &str, chapters: u32, pages: u32) {
    Mock::given(method("GET"))
        .and(path(format!("/api/manga/slug/{slug}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(kisslove_series_json(slug, chapters)))
        .mount(server)
        .await;

    for chapter in 1..=chapters {
        let content: Vec<String> = (1..=pages)
            .map(|p| format!("{}/kl/{chapter}/{p}.jpg", server.uri()))
            .collect();
        Mock::given(method("GET"))
            .and(path(format!("/api/chapter/{}", 100 + chapter)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": content.join("\n") })))
            .mount(server)
            .await;

        for page in 1..=pages {
            Mock::given(method("GET"))
                .and(path(format!("/kl/{chapter}/{page}.jpg")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(FAKE_JPEG))
                .mount(server)
                .await;
        }
    }
}
