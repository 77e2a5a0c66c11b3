//! REST adapter for the document source.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::{
    DocumentRef, DocumentSource, MetadataRecord, SchemaVariant, SourceError, VersionDescriptor,
};
use crate::http_client::{HttpResponse, OutboundRequest, ResilientClient};

/// Document source reached over HTTP through the resilient client.
#[derive(Clone)]
pub struct RestDocumentSource {
    client: ResilientClient,
    base_url: String,
    token: Option<String>,
}

impl RestDocumentSource {
    pub fn new(client: ResilientClient, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    fn item_url(&self, doc: &DocumentRef, suffix: &str) -> Result<Url, SourceError> {
        let raw = format!(
            "{}/tenants/{}/collections/{}/items/{}{}",
            self.base_url,
            urlencoding::encode(&doc.tenant_id),
            urlencoding::encode(&doc.collection),
            urlencoding::encode(&doc.relative_path),
            suffix
        );
        Url::parse(&raw).map_err(|e| SourceError::Decode(format!("invalid url {}: {}", raw, e)))
    }

    fn authorize(&self, request: OutboundRequest) -> OutboundRequest {
        match &self.token {
            Some(token) => request.with_header("authorization", &format!("Bearer {}", token)),
            None => request,
        }
    }

    async fn fetch(
        &self,
        request: OutboundRequest,
        doc: &DocumentRef,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, SourceError> {
        let context = format!("{} {}", request.method, request.url);
        let response = self.client.send(self.authorize(request), cancel).await?;
        check_status(response, doc, &context).await
    }
}

async fn check_status(
    response: HttpResponse,
    doc: &DocumentRef,
    context: &str,
) -> Result<HttpResponse, SourceError> {
    if response.status == StatusCode::NOT_FOUND {
        response.drain().await;
        return Err(SourceError::NotFound(doc.to_string()));
    }
    if !response.is_success() {
        let status = response.status.as_u16();
        response.drain().await;
        return Err(SourceError::UnexpectedStatus {
            status,
            context: context.to_string(),
        });
    }
    Ok(response)
}

#[async_trait]
impl DocumentSource for RestDocumentSource {
    async fn list_versions(
        &self,
        doc: &DocumentRef,
        cancel: &CancellationToken,
    ) -> Result<Vec<VersionDescriptor>, SourceError> {
        let url = self.item_url(doc, "/versions")?;
        let response = self.fetch(OutboundRequest::get(url), doc, cancel).await?;
        let versions: Vec<VersionDescriptor> = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        debug!("{} has {} versions", doc, versions.len());
        Ok(versions)
    }

    async fn download(
        &self,
        doc: &DocumentRef,
        version_id: &str,
        is_latest: bool,
        cancel: &CancellationToken,
    ) -> Result<Bytes, SourceError> {
        let suffix = if is_latest {
            "/content".to_string()
        } else {
            format!("/versions/{}/content", urlencoding::encode(version_id))
        };
        let url = self.item_url(doc, &suffix)?;
        let response = self.fetch(OutboundRequest::get(url), doc, cancel).await?;
        Ok(response.bytes().await?)
    }

    async fn extract_metadata(
        &self,
        doc: &DocumentRef,
        variant: SchemaVariant,
        cancel: &CancellationToken,
    ) -> Result<Vec<MetadataRecord>, SourceError> {
        let mut url = self.item_url(doc, "/metadata")?;
        url.query_pairs_mut().append_pair("schema", variant.as_str());
        let response = self.fetch(OutboundRequest::get(url), doc, cancel).await?;
        response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))
    }

    async fn delete_document(
        &self,
        doc: &DocumentRef,
        cancel: &CancellationToken,
    ) -> Result<bool, SourceError> {
        let url = self.item_url(doc, "")?;
        let request = self.authorize(OutboundRequest::delete(url));
        let response = self.client.send(request, cancel).await?;
        let status = response.status;
        response.drain().await;
        if !status.is_success() {
            warn!("Document source refused deletion of {} ({})", doc, status);
        }
        Ok(status.is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::ReqwestTransport;
    use crate::rate_limit::RateLimiter;
    use std::sync::Arc;
    use std::time::Duration;

    fn source(base: &str) -> RestDocumentSource {
        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        RestDocumentSource::new(
            ResilientClient::new(Arc::new(transport), RateLimiter::new()),
            base,
        )
    }

    #[test]
    fn test_item_url_encodes_path() {
        let src = source("https://src.example/api/");
        let doc = DocumentRef::new("acme", "q3 reports", "dir/file name.pdf");
        let url = src.item_url(&doc, "/versions").unwrap();
        assert_eq!(
            url.as_str(),
            "https://src.example/api/tenants/acme/collections/q3%20reports/items/dir%2Ffile%20name.pdf/versions"
        );
    }

    #[test]
    fn test_empty_token_ignored() {
        let src = source("https://src.example").with_token(Some(String::new()));
        assert!(src.token.is_none());
    }
}
