//! Utility functions for file naming, extension inference and atomic writes

use crate::error::Result;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Extension used when nothing better can be inferred
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Replace characters that are invalid in file names on common filesystems
///
/// `<>:"/\|?*` and control characters become `_`; surrounding whitespace and
/// dots are trimmed. A name that ends up empty becomes `untitled`.
///
/// # Examples
///
/// ```
/// use manga_fetcher::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("Re:Zero / Part 1"), "Re_Zero _ Part 1");
/// assert_eq!(sanitize_filename(" ..hidden.. "), "hidden");
/// assert_eq!(sanitize_filename("???"), "___");
/// assert_eq!(sanitize_filename("  "), "untitled");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim_matches(|c: char| c.is_whitespace() || c == '.');
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Infer an image file extension (without the dot)
///
/// Neither the server's `Content-Type` nor the URL suffix is trusted alone:
/// the body's magic bytes win, then an `image/*` content type, then the URL
/// suffix (query and fragment ignored), then [`DEFAULT_EXTENSION`].
pub fn infer_extension(bytes: &[u8], content_type: Option<&str>, url: &str) -> &'static str {
    sniff_image(bytes)
        .or_else(|| content_type.and_then(extension_from_content_type))
        .or_else(|| extension_from_url(url))
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Detect common image formats from their leading bytes
fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("jpg"),
        [0x89, b'P', b'N', b'G', ..] => Some("png"),
        [b'G', b'I', b'F', b'8', ..] => Some("gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("webp"),
        [_, _, _, _, b'f', b't', b'y', b'p', b'a', b'v', b'i', b'f', ..] => Some("avif"),
        [b'B', b'M', ..] => Some("bmp"),
        _ => None,
    }
}

fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    match mime.as_str() {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/avif" => Some("avif"),
        "image/bmp" => Some("bmp"),
        _ => None,
    }
}

fn extension_from_url(url: &str) -> Option<&'static str> {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        // Relative or malformed: strip query and fragment by hand
        Err(_) => url.split(['?', '#']).next().unwrap_or("").to_string(),
    };
    let ext = Path::new(&path).extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("jpg"),
        "png" => Some("png"),
        "gif" => Some("gif"),
        "webp" => Some("webp"),
        "avif" => Some("avif"),
        "bmp" => Some("bmp"),
        _ => None,
    }
}

/// Write `bytes` to `path` so that `path` only ever holds a complete file
///
/// The data goes to `temp` first, is flushed to disk, then renamed over
/// `path`. A crash mid-write leaves at most `temp` behind. Callers take `temp`
/// from [`crate::layout::Layout`], which owns every on-disk name.
pub async fn write_atomic(path: &Path, temp: &Path, bytes: &[u8]) -> Result<()> {
    let result = async {
        let mut file = tokio::fs::File::create(temp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(temp, path).await?;
        Ok::<_, std::io::Error>(())
    }
    .await;

    if let Err(e) = result {
        // Best effort: never leave a stale partial behind on failure
        let _ = tokio::fs::remove_file(temp).await;
        return Err(e.into());
    }
    Ok(())
}
