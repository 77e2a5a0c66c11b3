//! Quota-aware rate limiter.
//!
//! Tracks the request budget advertised by the document source and tells
//! callers how long to hold off before the next request. The limiter is an
//! explicit instance handed to the request layer; clones share one window.

mod config;
mod window;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

pub use config::{RateLimitConfig, DEFAULT_BUFFER_SECS, DEFAULT_MIN_CAPACITY_PCT};
pub use window::QuotaWindow;

/// Which document source API a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiClass {
    ListVersions,
    Download,
    Metadata,
    Delete,
    Other,
}

impl ApiClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListVersions => "list_versions",
            Self::Download => "download",
            Self::Metadata => "metadata",
            Self::Delete => "delete",
            Self::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "list_versions" => Some(Self::ListVersions),
            "download" => Some(Self::Download),
            "metadata" => Some(Self::Metadata),
            "delete" => Some(Self::Delete),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Classify a request by method and URL path.
    pub fn classify(method: &reqwest::Method, url: &url::Url) -> Self {
        if *method == reqwest::Method::DELETE {
            return Self::Delete;
        }
        let path = url.path().trim_end_matches('/');
        if path.ends_with("/versions") {
            Self::ListVersions
        } else if path.ends_with("/content") {
            Self::Download
        } else if path.ends_with("/metadata") {
            Self::Metadata
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for ApiClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared quota window plus the policy for acting on it.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    window: Arc<RwLock<QuotaWindow>>,
}

impl RateLimiter {
    /// Create a rate limiter with default config and an unknown window.
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            window: Arc::new(RwLock::new(QuotaWindow::default())),
        }
    }

    /// A limiter that never delays.
    pub fn disabled() -> Self {
        Self::with_config(RateLimitConfig::disabled())
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// How long the caller must wait before issuing a request of this class.
    pub async fn wait(&self, api_class: ApiClass) -> Duration {
        let threshold = self.config.threshold_for(api_class);
        let window = *self.window.read().await;
        let delay = window.delay_at(Instant::now(), threshold, self.config.buffer());
        if !delay.is_zero() {
            debug!(
                "Quota low for {} ({:?}% left), waiting {:?}",
                api_class,
                window.capacity_left_pct(),
                delay
            );
        }
        delay
    }

    /// Replace the shared window with quota signals from a response.
    pub async fn observe(&self, headers: &HashMap<String, String>, api_class: ApiClass) {
        let Some(observed) = QuotaWindow::from_headers(headers, Instant::now()) else {
            return;
        };
        let mut window = self.window.write().await;
        *window = observed;
        if let Some(pct) = observed.capacity_left_pct() {
            if pct <= self.config.threshold_for(api_class) {
                info!(
                    "Document source quota at {:.1}% after {} request",
                    pct, api_class
                );
            }
        }
    }

    /// Snapshot of the current window.
    pub async fn window(&self) -> QuotaWindow {
        *self.window.read().await
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a `Retry-After` header value given in seconds.
///
/// HTTP-date values are not supported and yield `None`.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
