//! Rate limiter configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ApiClass;

/// Default minimum remaining capacity (percent) before callers are delayed.
pub const DEFAULT_MIN_CAPACITY_PCT: f64 = 10.0;

/// Default extra wait added on top of the quota reset time.
pub const DEFAULT_BUFFER_SECS: u64 = 5;

/// Configuration for quota-aware delaying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Remaining capacity (percent of the advertised limit) at or below which
    /// requests wait for the window to reset. Zero disables delaying.
    pub min_capacity_pct: f64,
    /// Seconds added to the reset time when delaying.
    pub buffer_secs: u64,
    /// API classes that are never delayed.
    pub unthrottled: Vec<ApiClass>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_capacity_pct: DEFAULT_MIN_CAPACITY_PCT,
            buffer_secs: DEFAULT_BUFFER_SECS,
            unthrottled: Vec::new(),
        }
    }
}

impl RateLimitConfig {
    /// Configuration that never delays any request.
    pub fn disabled() -> Self {
        Self {
            min_capacity_pct: 0.0,
            ..Self::default()
        }
    }

    /// Effective threshold for an API class.
    pub fn threshold_for(&self, api_class: ApiClass) -> f64 {
        if self.unthrottled.contains(&api_class) {
            0.0
        } else {
            self.min_capacity_pct
        }
    }

    pub fn buffer(&self) -> Duration {
        Duration::from_secs(self.buffer_secs)
    }
}
