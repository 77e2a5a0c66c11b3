//! Document source collaborator.
//!
//! The source holds versioned documents addressed by tenant, collection and
//! relative path. All network access goes through the resilient client.

mod memory;
mod rest;
mod schema;

pub use memory::{InMemoryDocumentSource, SourceCall};
pub use rest::RestDocumentSource;
pub use schema::SchemaVariant;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::http_client::{RequestError, TransportError};

/// Address of one document at the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub tenant_id: String,
    pub collection: String,
    pub relative_path: String,
}

impl DocumentRef {
    pub fn new(tenant_id: &str, collection: &str, relative_path: &str) -> Self {
        Self {
            tenant_id: tenant_id.to_string(),
            collection: collection.to_string(),
            relative_path: relative_path.to_string(),
        }
    }
}

impl std::fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.tenant_id, self.collection, self.relative_path
        )
    }
}

/// One version as listed by the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    pub id: String,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Schema-bound metadata extracted for one document version.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    /// Logical identity of the document, stable across versions.
    pub object_id: String,
    /// Version this record was extracted from, when the source reports it.
    #[serde(default)]
    pub version_id: Option<String>,
    #[serde(default)]
    pub fields: serde_json::Value,
    #[serde(default)]
    pub security: serde_json::Value,
}

#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("document not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("unexpected status {status} from document source: {context}")]
    UnexpectedStatus { status: u16, context: String },
    #[error("invalid response from document source: {0}")]
    Decode(String),
}

impl From<TransportError> for SourceError {
    fn from(err: TransportError) -> Self {
        Self::Request(RequestError::Transport(err))
    }
}

/// Remote store of versioned documents.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// List every version of a document, in source order.
    async fn list_versions(
        &self,
        doc: &DocumentRef,
        cancel: &CancellationToken,
    ) -> Result<Vec<VersionDescriptor>, SourceError>;

    /// Fetch the bytes of one version. `is_latest` selects the current-content endpoint.
    async fn download(
        &self,
        doc: &DocumentRef,
        version_id: &str,
        is_latest: bool,
        cancel: &CancellationToken,
    ) -> Result<Bytes, SourceError>;

    /// Extract schema-bound metadata, one record per version in source order.
    async fn extract_metadata(
        &self,
        doc: &DocumentRef,
        variant: SchemaVariant,
        cancel: &CancellationToken,
    ) -> Result<Vec<MetadataRecord>, SourceError>;

    /// Delete the document at the source. `false` means the source refused.
    async fn delete_document(
        &self,
        doc: &DocumentRef,
        cancel: &CancellationToken,
    ) -> Result<bool, SourceError>;
}
