//! Chapter range resolution
//!
//! A caller range is 1-based and inclusive, and is matched against the
//! source-reported chapter ordinal rather than vector positions, since some
//! sources skip chapters. Syntax is checked before any request is made.

use crate::error::{RangeError, Result};
use crate::sources::SourceAdapter;
use crate::types::{ChapterDescriptor, SeriesSlug};
use serde::{Deserialize, Serialize};

/// Inclusive 1-based chapter range
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRange {
    /// First ordinal (None = 1)
    pub start: Option<u32>,
    /// Last ordinal (None = through the last available)
    pub end: Option<u32>,
}

impl ChapterRange {
    /// Range from optional bounds
    pub fn new(start: Option<u32>, end: Option<u32>) -> Self {
        Self { start, end }
    }

    /// Every chapter
    pub fn all() -> Self {
        Self::default()
    }

    /// Effective first ordinal
    pub fn first(&self) -> u32 {
        self.start.unwrap_or(1)
    }

    /// Reject ranges that cannot match anything regardless of the source
    pub fn validate(&self) -> std::result::Result<(), RangeError> {
        let start = self.first();
        if start == 0 {
            return Err(RangeError::Malformed {
                start,
                end: self.end,
                reason: "chapter indices start at 1".to_string(),
            });
        }
        if let Some(end) = self.end
            && start > end
        {
            return Err(RangeError::Malformed {
                start,
                end: self.end,
                reason: "start is after end".to_string(),
            });
        }
        Ok(())
    }

    /// Whether `index` falls inside the range
    pub fn contains(&self, index: u32) -> bool {
        index >= self.first() && self.end.is_none_or(|end| index <= end)
    }

    /// Chapters whose ordinal is in range, in ascending ordinal order
    pub fn select(&self, chapters: &[ChapterDescriptor]) -> std::result::Result<Vec<ChapterDescriptor>, RangeError> {
        self.validate()?;

        let mut selected: Vec<ChapterDescriptor> = chapters
            .iter()
            .filter(|c| self.contains(c.index))
            .cloned()
            .collect();
        selected.sort_by_key(|c| c.index);

        if selected.is_empty() {
            return Err(RangeError::NoChapters {
                start: self.first(),
                end: self.end,
                available: chapters.len(),
            });
        }
        Ok(selected)
    }
}

/// Validate `range`, list the series' chapters and select the range
///
/// A malformed range fails before the adapter is called.
pub async fn resolve_range(
    adapter: &dyn SourceAdapter,
    slug: &SeriesSlug,
    range: ChapterRange,
) -> Result<Vec<ChapterDescriptor>> {
    range.validate()?;

    let chapters = adapter.list_chapters(slug).await?;
    let selected = range.select(&chapters)?;

    tracing::debug!(
        source = %adapter.id(),
        slug = %slug,
        available = chapters.len(),
        selected = selected.len(),
        "Chapter range resolved"
    );
    Ok(selected)
}
