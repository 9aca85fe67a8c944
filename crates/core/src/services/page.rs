//! Offset pagination.

use serde::Deserialize;

/// Default number of items per page.
pub const DEFAULT_LIMIT: u64 = 20;

/// Upper bound on items per page.
pub const MAX_LIMIT: u64 = 100;

/// A window into an ordered listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Page {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    DEFAULT_LIMIT
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    /// Build a page, clamping `limit` into `1..=MAX_LIMIT`.
    #[must_use]
    pub fn new(limit: u64, offset: u64) -> Self {
        Self {
            limit: limit.clamp(1, MAX_LIMIT),
            offset,
        }
    }

    /// The same page with `limit` clamped.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self::new(self.limit, self.offset)
    }
}
