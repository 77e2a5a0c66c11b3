//! Resilient request layer for the document source.
//!
//! Every outbound call goes through [`ResilientClient::send`], which consults
//! the shared [`RateLimiter`] before each attempt, feeds quota headers back
//! into it, and replays throttled requests up to a fixed ceiling.

mod request;
mod response;
mod transport;

pub use request::{BodyStream, OutboundRequest, ReplayableRequest, RequestBody};
pub use response::{extract_response_headers, HttpResponse};
pub use transport::{HttpTransport, ReqwestTransport, DEFAULT_TIMEOUT, USER_AGENT};

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::rate_limit::{ApiClass, RateLimiter};

/// Failure of a single attempt at the transport level.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("failed to build request: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("failed to read body: {0}")]
    Body(String),
    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Failure of a request after the resilience layer gave up.
#[derive(Debug, Clone, Error)]
pub enum RequestError {
    #[error("{api_class} request still throttled after {attempts} attempts")]
    ThrottleExceeded { api_class: ApiClass, attempts: u32 },
    #[error("request cancelled")]
    Cancelled,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Default number of retries after a throttled attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Default seconds added to a `Retry-After` value.
pub const DEFAULT_RETRY_AFTER_BUFFER_SECS: u64 = 5;
/// Default wait when a throttled response carries no `Retry-After`.
pub const DEFAULT_BACKOFF_SECS: u64 = 15;

/// Retry behaviour for throttled responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_after_buffer_secs: u64,
    pub default_backoff_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_after_buffer_secs: DEFAULT_RETRY_AFTER_BUFFER_SECS,
            default_backoff_secs: DEFAULT_BACKOFF_SECS,
        }
    }
}

impl RetryPolicy {
    /// Wait before replaying a throttled request.
    pub fn backoff_for(&self, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(after) => {
                after.saturating_add(Duration::from_secs(self.retry_after_buffer_secs))
            }
            None => Duration::from_secs(self.default_backoff_secs),
        }
    }
}

/// Instrumentation callback invoked after each attempt.
pub type LatencyHook = Arc<dyn Fn(ApiClass, StatusCode, Duration) + Send + Sync>;

/// Request layer that respects source quotas and replays throttled calls.
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn HttpTransport>,
    rate_limiter: RateLimiter,
    retry: RetryPolicy,
    latency_hook: Option<LatencyHook>,
}

impl ResilientClient {
    pub fn new(transport: Arc<dyn HttpTransport>, rate_limiter: RateLimiter) -> Self {
        Self {
            transport,
            rate_limiter,
            retry: RetryPolicy::default(),
            latency_hook: None,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_latency_hook(mut self, hook: LatencyHook) -> Self {
        self.latency_hook = Some(hook);
        self
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Send a request, waiting out quota pressure and replaying throttled attempts.
    ///
    /// Non-throttle responses, including ordinary 4xx and 5xx, are returned
    /// unchanged for the caller to interpret.
    pub async fn send(
        &self,
        request: OutboundRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, RequestError> {
        let request = request.into_replayable().await?;
        let api_class = ApiClass::classify(&request.method, &request.url);
        let mut retries: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(RequestError::Cancelled);
            }

            let delay = self.rate_limiter.wait(api_class).await;
            if !delay.is_zero() {
                sleep_cancellable(delay, cancel).await?;
            }

            let started = Instant::now();
            let response = tokio::select! {
                _ = cancel.cancelled() => return Err(RequestError::Cancelled),
                result = self.transport.execute(request.clone()) => result?,
            };
            let elapsed = started.elapsed();
            if let Some(hook) = &self.latency_hook {
                hook(api_class, response.status, elapsed);
            }
            debug!(
                "{} {} -> {} in {:?}",
                api_class, request.url, response.status, elapsed
            );

            self.rate_limiter
                .observe(&response.headers, api_class)
                .await;

            if !response.is_throttled() {
                return Ok(response);
            }

            let status = response.status;
            let retry_after = response.retry_after();
            response.drain().await;

            if retries >= self.retry.max_retries {
                warn!(
                    "Giving up on {} {} after {} attempts (last status {})",
                    api_class,
                    request.url,
                    retries + 1,
                    status
                );
                return Err(RequestError::ThrottleExceeded {
                    api_class,
                    attempts: retries + 1,
                });
            }

            let backoff = self.retry.backoff_for(retry_after);
            warn!(
                "Throttled by document source ({}) on {}, retrying in {:?}",
                status, api_class, backoff
            );
            sleep_cancellable(backoff, cancel).await?;
            retries += 1;
        }
    }
}

async fn sleep_cancellable(duration: Duration, cancel: &CancellationToken) -> Result<(), RequestError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(RequestError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
