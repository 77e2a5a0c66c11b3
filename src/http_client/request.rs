//! Outbound request types.
//!
//! A request may carry a one-shot streaming body. Before the first attempt it
//! is turned into a [`ReplayableRequest`] whose body is buffered, so a
//! throttled attempt can be replayed byte-for-byte.

use std::collections::HashMap;
use std::fmt;

use bytes::{Bytes, BytesMut};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use url::Url;

use super::TransportError;

/// One-shot stream of body chunks.
pub type BodyStream = BoxStream<'static, std::io::Result<Bytes>>;

/// Request body as supplied by a caller.
pub enum RequestBody {
    Empty,
    Bytes(Bytes),
    /// Cannot be rewound; buffered before the first send.
    Stream(BodyStream),
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
            Self::Stream(_) => f.write_str("Stream"),
        }
    }
}

/// A request addressed to the document source.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
    /// Transport-level properties carried verbatim across retries.
    pub properties: HashMap<String, String>,
}

impl OutboundRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            properties: HashMap::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn delete(url: Url) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Bytes(body.into());
        self
    }

    pub fn with_stream(mut self, stream: BodyStream) -> Self {
        self.body = RequestBody::Stream(stream);
        self
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    /// Buffer the body so the request can be sent more than once.
    pub async fn into_replayable(self) -> Result<ReplayableRequest, TransportError> {
        let body = match self.body {
            RequestBody::Empty => None,
            RequestBody::Bytes(bytes) => Some(bytes),
            RequestBody::Stream(mut stream) => {
                let mut buf = BytesMut::new();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| TransportError::Body(e.to_string()))?;
                    buf.extend_from_slice(&chunk);
                }
                Some(buf.freeze())
            }
        };

        Ok(ReplayableRequest {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body,
            properties: self.properties,
        })
    }
}

/// A request whose body is fully buffered; cloning yields an identical attempt.
#[derive(Debug, Clone)]
pub struct ReplayableRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub properties: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_body_is_buffered_for_replay() {
        let chunks: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"world")),
        ];
        let request = OutboundRequest::get(Url::parse("https://src.example/a").unwrap())
            .with_header("x-trace", "abc")
            .with_property("attempt-group", "7")
            .with_stream(futures::stream::iter(chunks).boxed());

        let replayable = request.into_replayable().await.unwrap();
        let clone = replayable.clone();

        assert_eq!(clone.body.as_deref(), Some(&b"hello world"[..]));
        assert_eq!(clone.body, replayable.body);
        assert_eq!(clone.headers.get("x-trace").unwrap(), "abc");
        assert_eq!(clone.properties.get("attempt-group").unwrap(), "7");
    }

    #[tokio::test]
    async fn test_stream_error_surfaces() {
        let chunks: Vec<std::io::Result<Bytes>> = vec![Err(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "gone",
        ))];
        let request = OutboundRequest::get(Url::parse("https://src.example/a").unwrap())
            .with_stream(futures::stream::iter(chunks).boxed());

        assert!(matches!(
            request.into_replayable().await,
            Err(TransportError::Body(_))
        ));
    }

    #[test]
    fn test_invalid_header_ignored() {
        let request = OutboundRequest::get(Url::parse("https://src.example/a").unwrap())
            .with_header("bad header", "v");
        assert!(request.headers.is_empty());
    }
}
