//! Transport seam between the resilient client and the network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::trace;

use super::{HttpResponse, ReplayableRequest, TransportError};

/// User agent sent to the document source.
pub const USER_AGENT: &str = concat!("docvault/", env!("CARGO_PKG_VERSION"));

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Sends one attempt of a request.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: ReplayableRequest) -> Result<HttpResponse, TransportError>;
}

/// Transport backed by a shared `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    fn map_error(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: ReplayableRequest) -> Result<HttpResponse, TransportError> {
        trace!("{} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(Self::map_error)?;
        Ok(HttpResponse::from_reqwest(response))
    }
}
