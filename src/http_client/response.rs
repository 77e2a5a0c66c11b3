//! HTTP response wrapper.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use super::TransportError;
use crate::rate_limit::parse_retry_after;

/// Response body, either still on the wire or already buffered.
pub(crate) enum ResponseBody {
    Pending(Response),
    Ready(Bytes),
}

/// HTTP response wrapper.
pub struct HttpResponse {
    pub status: StatusCode,
    /// Lower-cased header names.
    pub headers: HashMap<String, String>,
    pub(crate) body: ResponseBody,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

impl HttpResponse {
    pub(crate) fn from_reqwest(response: Response) -> Self {
        let status = response.status();
        let headers = extract_response_headers(response.headers());
        Self {
            status,
            headers,
            body: ResponseBody::Pending(response),
        }
    }

    /// Build a response from already-buffered parts.
    pub fn from_bytes(
        status: StatusCode,
        headers: HashMap<String, String>,
        body: impl Into<Bytes>,
    ) -> Self {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v))
            .collect();
        Self {
            status,
            headers,
            body: ResponseBody::Ready(body.into()),
        }
    }

    /// Check if the response is successful.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Whether the source is explicitly asking us to slow down.
    pub fn is_throttled(&self) -> bool {
        matches!(
            self.status,
            StatusCode::TOO_MANY_REQUESTS
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT
        )
    }

    /// Get the Retry-After header in seconds.
    pub fn retry_after(&self) -> Option<Duration> {
        self.headers
            .get("retry-after")
            .and_then(|v| parse_retry_after(v))
    }

    /// Get response body as bytes.
    pub async fn bytes(self) -> Result<Bytes, TransportError> {
        match self.body {
            ResponseBody::Pending(response) => response.bytes().await.map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Body(e.to_string())
                }
            }),
            ResponseBody::Ready(bytes) => Ok(bytes),
        }
    }

    /// Deserialize the body as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T, TransportError> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// Read and discard the body so the connection can be reused.
    pub async fn drain(self) {
        let _ = self.bytes().await;
    }
}

/// Collect response headers into a map with lower-cased names.
pub fn extract_response_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (name, value) in headers {
        if let Ok(v) = value.to_str() {
            map.insert(name.as_str().to_ascii_lowercase(), v.to_string());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_statuses() {
        for code in [429u16, 503, 504] {
            let resp = HttpResponse::from_bytes(
                StatusCode::from_u16(code).unwrap(),
                HashMap::new(),
                Bytes::new(),
            );
            assert!(resp.is_throttled(), "{} should throttle", code);
        }
        for code in [200u16, 404, 500, 502] {
            let resp = HttpResponse::from_bytes(
                StatusCode::from_u16(code).unwrap(),
                HashMap::new(),
                Bytes::new(),
            );
            assert!(!resp.is_throttled(), "{} should not throttle", code);
        }
    }

    #[test]
    fn test_retry_after_header_case() {
        let mut headers = HashMap::new();
        headers.insert("Retry-After".to_string(), "3".to_string());
        let resp = HttpResponse::from_bytes(StatusCode::TOO_MANY_REQUESTS, headers, Bytes::new());
        assert_eq!(resp.retry_after(), Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_json_body() {
        let resp = HttpResponse::from_bytes(StatusCode::OK, HashMap::new(), r#"{"a":1}"#);
        let value: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(value["a"], 1);
    }
}
