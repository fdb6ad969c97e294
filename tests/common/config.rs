//! Test configuration helpers: downloaders pointed at a mock server

use manga_fetcher::config::SourceConfig;
use manga_fetcher::{Config, MangaDownloader};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

/// Configuration with every built-in source redirected to `server`
///
/// Retries are kept but delays shrunk so failing tests stay fast.
pub fn mock_config(server: &MockServer, temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.download.download_dir = temp_dir.path().join("downloads");
    config.download.page_retry_delay = Duration::from_millis(10);
    config.http.timeout = Duration::from_secs(5);
    config.http.retry.max_attempts = 1;
    config.http.retry.initial_delay = Duration::from_millis(10);
    config.http.retry.jitter = false;

    for source in ["mangakatana", "kisslove"] {
        config.sources.insert(
            source.to_string(),
            SourceConfig {
                base_url: Some(server.uri()),
                min_request_interval: None,
            },
        );
    }
    config
}

/// Downloader over [`mock_config`], after `configure` had its say
///
/// Returns the downloader and the tempdir (which must be kept alive).
pub fn mock_downloader(server: &MockServer, configure: impl FnOnce(&mut Config)) -> (MangaDownloader, TempDir) {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut config = mock_config(server, &temp_dir);
    configure(&mut config);
    let downloader = MangaDownloader::new(config).unwrap();
    (downloader, temp_dir)
}

/// Requests the mock server has seen so far
pub async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

/// Requests the mock server has seen whose path starts with `prefix`
pub async fn requests_under(server: &MockServer, prefix: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().starts_with(prefix))
        .count()
}
