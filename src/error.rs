//! Error types for manga-fetcher
//!
//! This module provides the error taxonomy shared by every component:
//! - Source-level errors (not found, source unavailable)
//! - Caller input errors (invalid chapter ranges, unknown sources, bad config)
//! - Network-level errors split into transient and permanent
//! - Packaging errors raised by the archive step
//!
//! The transient/permanent split is decided once, in the fetch client, so the
//! orchestrator can decide retry eligibility without re-inspecting status codes.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for manga-fetcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for manga-fetcher
#[derive(Debug, Error)]
pub enum Error {
    /// Series or chapter does not exist on the source
    #[error("not found on {source_id}: {what}")]
    NotFound {
        /// Source that was queried
        source_id: String,
        /// What was looked up (slug, chapter token, ...)
        what: String,
    },

    /// Caller supplied a chapter range that cannot be satisfied
    #[error("invalid chapter range: {0}")]
    InvalidRange(#[from] RangeError),

    /// The source responded but its content could not be understood
    /// (site structure changed, API shape changed, ...)
    #[error("source {source_id} unavailable: {detail}")]
    SourceUnavailable {
        /// Source that failed
        source_id: String,
        /// Diagnostic detail for the caller
        detail: String,
    },

    /// Network-level failure that may succeed if retried
    #[error("transient failure fetching {url}: {reason}")]
    Transient {
        /// Requested URL
        url: String,
        /// Human-readable reason (timeout, 503, truncated body, ...)
        reason: String,
    },

    /// Network-level failure that will not succeed if retried
    #[error("permanent failure fetching {url}: {reason}")]
    Permanent {
        /// Requested URL
        url: String,
        /// HTTP status, when the failure came from a response
        status: Option<u16>,
        /// Human-readable reason
        reason: String,
    },

    /// Archive step failed for a chapter
    #[error("packaging failed for {path}: {reason}")]
    PackagingFailed {
        /// Archive output path
        path: PathBuf,
        /// The reason packaging failed
        reason: String,
    },

    /// No adapter registered under this source identifier
    #[error("unknown source: {0}")]
    UnknownSource(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "page_concurrency")
        key: Option<String>,
    },

    /// Operation was cancelled by the caller
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Chapter range errors
///
/// `Malformed` means the request itself is nonsensical and was rejected before
/// any network call. `NoChapters` means the request was well-formed but the
/// source has nothing in that range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// Range is syntactically invalid
    #[error("malformed range {start}..={end:?}: {reason}")]
    Malformed {
        /// Requested start index
        start: u32,
        /// Requested end index (None = through last)
        end: Option<u32>,
        /// Why the range was rejected
        reason: String,
    },

    /// Range is valid but no chapter on the source falls inside it
    #[error("no chapters in {start}..={end:?} ({available} available)")]
    NoChapters {
        /// Requested start index
        start: u32,
        /// Requested end index (None = through last)
        end: Option<u32>,
        /// Number of chapters the source lists
        available: usize,
    },
}

impl Error {
    /// Build a `NotFound` error
    pub fn not_found(source_id: impl Into<String>, what: impl Into<String>) -> Self {
        Self::NotFound {
            source_id: source_id.into(),
            what: what.into(),
        }
    }

    /// Build a `SourceUnavailable` error
    pub fn source_unavailable(source_id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_id: source_id.into(),
            detail: detail.into(),
        }
    }

    /// Build a `Transient` error
    pub fn transient(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transient {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Build a `Permanent` error
    pub fn permanent(url: impl Into<String>, status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Permanent {
            url: url.into(),
            status,
            reason: reason.into(),
        }
    }

    /// Build a `Config` error pointing at a specific key
    pub fn config(key: &str, message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Machine-readable error code for the caller layer
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound { .. } => "not_found",
            Error::InvalidRange(_) => "invalid_range",
            Error::SourceUnavailable { .. } => "source_unavailable",
            Error::Transient { .. } => "transient",
            Error::Permanent { .. } => "permanent",
            Error::PackagingFailed { .. } => "packaging_failed",
            Error::UnknownSource(_) => "unknown_source",
            Error::Config { .. } => "config_error",
            Error::Cancelled => "cancelled",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
        }
    }

    /// Whether this error is a `Permanent` failure carrying HTTP 404
    pub fn is_http_not_found(&self) -> bool {
        matches!(self, Error::Permanent { status: Some(404), .. })
    }

    /// Re-map an HTTP 404 into a source-level `NotFound`, leaving other errors untouched
    pub fn or_not_found(self, source_id: &str, what: &str) -> Self {
        if self.is_http_not_found() {
            Error::not_found(source_id, what)
        } else {
            self
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(Error::not_found("mangakatana", "x").code(), "not_found");
        assert_eq!(Error::transient("u", "r").code(), "transient");
        assert_eq!(Error::permanent("u", Some(403), "r").code(), "permanent");
        assert_eq!(Error::Cancelled.code(), "cancelled");
        assert_eq!(
            Error::InvalidRange(RangeError::NoChapters {
                start: 1,
                end: None,
                available: 0
            })
            .code(),
            "invalid_range"
        );
    }

    #[test]
    fn http_404_becomes_not_found() {
        let err = Error::permanent("https://x/manga/abc", Some(404), "HTTP 404")
            .or_not_found("kisslove", "abc");
        match err {
            Error::NotFound { source_id, what } => {
                assert_eq!(source_id, "kisslove");
                assert_eq!(what, "abc");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn other_permanent_errors_are_not_remapped() {
        let err = Error::permanent("u", Some(403), "HTTP 403").or_not_found("kisslove", "abc");
        assert!(matches!(err, Error::Permanent { status: Some(403), .. }));

        let err = Error::transient("u", "timeout").or_not_found("kisslove", "abc");
        assert!(matches!(err, Error::Transient { .. }));
    }

    #[test]
    fn range_error_messages_distinguish_kinds() {
        let malformed = RangeError::Malformed {
            start: 5,
            end: Some(2),
            reason: "start is after end".into(),
        };
        let empty = RangeError::NoChapters {
            start: 40,
            end: None,
            available: 12,
        };
        assert!(malformed.to_string().contains("malformed"));
        assert!(empty.to_string().contains("12 available"));
    }
}
