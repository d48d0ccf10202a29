//! Neighbour-day settings for route search.
//!
//! A route search answers for one day and also lists the nearest days on
//! either side that have connections. These settings bound how many such
//! days are returned and how far away they may be.

use chrono::Duration;
use serde::Deserialize;

use crate::config::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Days per side when the caller gives no `range_width`.
    pub default_range_width: usize,

    /// Hard cap on a caller's `range_width`.
    pub max_range_width: usize,

    /// Neighbour days further than this from the requested date are ignored.
    pub lookaround_days: i64,
}

impl SearchConfig {
    #[cfg(test)]
    fn new(default_range_width: usize, max_range_width: usize, lookaround_days: i64) -> Self {
        Self {
            default_range_width,
            max_range_width,
            lookaround_days,
        }
    }

    pub fn lookaround(&self) -> Duration {
        Duration::days(self.lookaround_days)
    }

    /// Days per side for a request, never above `max_range_width`.
    pub fn range_width(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_range_width)
            .min(self.max_range_width)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.default_range_width > self.max_range_width {
            return Err(ConfigError::Invalid(
                "search default_range_width exceeds max_range_width".to_string(),
            ));
        }
        if self.lookaround_days < 1 {
            return Err(ConfigError::Invalid(
                "search lookaround_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_range_width: 3,
            max_range_width: 14,
            lookaround_days: 92,
        }
    }
}
