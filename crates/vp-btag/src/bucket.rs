//! Inclusive tag-count buckets.

use serde::{Deserialize, Serialize};
use vp_core::{Error, Result};

/// An inclusive range of tag counts an event must fall in for a weight to
/// apply, e.g. "exactly 1 tag" or "0 or 1 tags".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCountBucket {
    min_tags: usize,
    max_tags: usize,
}

impl TagCountBucket {
    /// A bucket covering `min_tags..=max_tags`.
    pub fn new(min_tags: usize, max_tags: usize) -> Result<Self> {
        if min_tags > max_tags {
            return Err(Error::Validation(format!(
                "tag bucket [{min_tags}, {max_tags}] is empty"
            )));
        }
        Ok(Self { min_tags, max_tags })
    }

    /// A bucket matching exactly `n` tags.
    pub fn exactly(n: usize) -> Self {
        Self { min_tags: n, max_tags: n }
    }

    /// Whether a tag count falls inside the bucket.
    pub fn contains(&self, count: usize) -> bool {
        count >= self.min_tags && count <= self.max_tags
    }

    /// Lower edge (inclusive).
    pub fn min_tags(&self) -> usize {
        self.min_tags
    }

    /// Upper edge (inclusive).
    pub fn max_tags(&self) -> usize {
        self.max_tags
    }
}
