//! REST document source against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use docvault::http_client::{ReqwestTransport, RequestError, ResilientClient, RetryPolicy};
use docvault::rate_limit::{ApiClass, RateLimiter};
use docvault::source::{DocumentRef, DocumentSource, RestDocumentSource, SchemaVariant, SourceError};

const ITEM: &str = "/tenants/acme/collections/legal/items/msa.pdf";

fn doc() -> DocumentRef {
    DocumentRef::new("acme", "legal", "msa.pdf")
}

fn client(limiter: RateLimiter) -> ResilientClient {
    let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
    ResilientClient::new(Arc::new(transport), limiter).with_retry_policy(RetryPolicy {
        max_retries: 2,
        retry_after_buffer_secs: 0,
        default_backoff_secs: 0,
    })
}

fn source(server: &MockServer) -> RestDocumentSource {
    RestDocumentSource::new(client(RateLimiter::new()), &server.uri())
}

fn versions_json() -> serde_json::Value {
    serde_json::json!([
        {"id": "v2", "modifiedAt": "2024-05-02T10:00:00Z", "size": 12},
        {"id": "v1", "modifiedAt": "2024-05-01T10:00:00Z"}
    ])
}

#[tokio::test]
async fn test_list_versions_parses_descriptors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/versions", ITEM)))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(versions_json()))
        .mount(&server)
        .await;

    let src = source(&server).with_token(Some("secret".to_string()));
    let versions = src
        .list_versions(&doc(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].id, "v2");
    assert_eq!(versions[0].size, Some(12));
    assert_eq!(versions[1].size, None);
    assert!(versions[1].modified_at < versions[0].modified_at);
}

#[tokio::test]
async fn test_missing_document_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/versions", ITEM)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = source(&server)
        .list_versions(&doc(), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::NotFound(_)), "got {:?}", err);
}

#[tokio::test]
async fn test_throttled_request_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/content", ITEM)))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/content", ITEM)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"latest bytes".to_vec()))
        .mount(&server)
        .await;

    let bytes = source(&server)
        .download(&doc(), "v2", true, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(&bytes[..], b"latest bytes");
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_retry_ceiling_is_exact() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/versions/v1/content", ITEM)))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = source(&server)
        .download(&doc(), "v1", false, &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        SourceError::Request(RequestError::ThrottleExceeded {
            api_class,
            attempts,
        }) => {
            assert_eq!(api_class, ApiClass::Download);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected throttle failure, got {:?}", other),
    }
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/versions", ITEM)))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = source(&server)
        .list_versions(&doc(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(
        matches!(err, SourceError::UnexpectedStatus { status: 500, .. }),
        "got {:?}",
        err
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_metadata_requests_schema_variant() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/metadata", ITEM)))
        .and(query_param("schema", "contracts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "objectId": "obj-1",
                "versionId": "v1",
                "fields": {"party": "Acme"},
                "security": {"groups": ["legal"]}
            }
        ])))
        .mount(&server)
        .await;

    let records = source(&server)
        .extract_metadata(&doc(), SchemaVariant::Contracts, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].object_id, "obj-1");
    assert_eq!(records[0].version_id.as_deref(), Some("v1"));
    assert_eq!(records[0].fields["party"], "Acme");
}

#[tokio::test]
async fn test_delete_reports_refusal() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path(ITEM))
        .respond_with(ResponseTemplate::new(204))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(ITEM))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let src = source(&server);
    let cancel = CancellationToken::new();
    assert!(src.delete_document(&doc(), &cancel).await.unwrap());
    assert!(!src.delete_document(&doc(), &cancel).await.unwrap());
}

#[tokio::test]
async fn test_quota_headers_feed_the_limiter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{}/versions", ITEM)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(versions_json())
                .insert_header("RateLimit-Limit", "100")
                .insert_header("RateLimit-Remaining", "42")
                .insert_header("RateLimit-Reset", "60"),
        )
        .mount(&server)
        .await;

    let limiter = RateLimiter::new();
    let src = RestDocumentSource::new(client(limiter.clone()), &server.uri());
    src.list_versions(&doc(), &CancellationToken::new())
        .await
        .unwrap();

    let window = limiter.window().await;
    assert_eq!(window.limit, Some(100));
    assert_eq!(window.remaining, Some(42));
    assert_eq!(limiter.wait(ApiClass::Download).await, Duration::ZERO);
}

#[tokio::test]
async fn test_cancelled_request_is_not_sent() {
    let server = MockServer::start().await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = source(&server)
        .list_versions(&doc(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Request(RequestError::Cancelled)));
    assert!(server.received_requests().await.unwrap().is_empty());
}
