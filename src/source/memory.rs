//! In-process document source for dry runs and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::{
    DocumentRef, DocumentSource, MetadataRecord, SchemaVariant, SourceError, VersionDescriptor,
};
use crate::http_client::RequestError;

/// A call observed by [`InMemoryDocumentSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceCall {
    ListVersions(DocumentRef),
    Download {
        doc: DocumentRef,
        version_id: String,
        is_latest: bool,
    },
    ExtractMetadata(DocumentRef, SchemaVariant),
    Delete(DocumentRef),
}

#[derive(Debug, Clone)]
struct StoredDocument {
    versions: Vec<(VersionDescriptor, Bytes)>,
    metadata: Option<Vec<MetadataRecord>>,
    download_error: Option<SourceError>,
}

#[derive(Debug, Default)]
struct State {
    documents: HashMap<DocumentRef, StoredDocument>,
    calls: Vec<SourceCall>,
    refuse_delete: bool,
}

/// Document source backed by a map, with failure injection and a call log.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentSource {
    state: Arc<Mutex<State>>,
}

impl InMemoryDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a document. Versions are kept in the given (source) order.
    pub async fn add_document(&self, doc: DocumentRef, versions: Vec<(VersionDescriptor, Bytes)>) {
        let mut state = self.state.lock().await;
        state.documents.insert(
            doc,
            StoredDocument {
                versions,
                metadata: None,
                download_error: None,
            },
        );
    }

    /// Override the extracted metadata for a document.
    pub async fn set_metadata(&self, doc: &DocumentRef, records: Vec<MetadataRecord>) {
        let mut state = self.state.lock().await;
        if let Some(stored) = state.documents.get_mut(doc) {
            stored.metadata = Some(records);
        }
    }

    /// Make every download of `doc` fail with `error`.
    pub async fn fail_downloads(&self, doc: &DocumentRef, error: SourceError) {
        let mut state = self.state.lock().await;
        if let Some(stored) = state.documents.get_mut(doc) {
            stored.download_error = Some(error);
        }
    }

    /// Make deletions report failure.
    pub async fn refuse_deletes(&self) {
        self.state.lock().await.refuse_delete = true;
    }

    pub async fn contains(&self, doc: &DocumentRef) -> bool {
        self.state.lock().await.documents.contains_key(doc)
    }

    pub async fn calls(&self) -> Vec<SourceCall> {
        self.state.lock().await.calls.clone()
    }

    /// Object id the default extractor assigns to a document.
    pub fn default_object_id(doc: &DocumentRef) -> String {
        format!("{}:{}:{}", doc.tenant_id, doc.collection, doc.relative_path)
    }
}

fn check_cancel(cancel: &CancellationToken) -> Result<(), SourceError> {
    if cancel.is_cancelled() {
        Err(SourceError::Request(RequestError::Cancelled))
    } else {
        Ok(())
    }
}

#[async_trait]
impl DocumentSource for InMemoryDocumentSource {
    async fn list_versions(
        &self,
        doc: &DocumentRef,
        cancel: &CancellationToken,
    ) -> Result<Vec<VersionDescriptor>, SourceError> {
        check_cancel(cancel)?;
        let mut state = self.state.lock().await;
        state.calls.push(SourceCall::ListVersions(doc.clone()));
        state
            .documents
            .get(doc)
            .map(|stored| stored.versions.iter().map(|(v, _)| v.clone()).collect())
            .ok_or_else(|| SourceError::NotFound(doc.to_string()))
    }

    async fn download(
        &self,
        doc: &DocumentRef,
        version_id: &str,
        is_latest: bool,
        cancel: &CancellationToken,
    ) -> Result<Bytes, SourceError> {
        check_cancel(cancel)?;
        let mut state = self.state.lock().await;
        state.calls.push(SourceCall::Download {
            doc: doc.clone(),
            version_id: version_id.to_string(),
            is_latest,
        });
        let stored = state
            .documents
            .get(doc)
            .ok_or_else(|| SourceError::NotFound(doc.to_string()))?;
        if let Some(err) = &stored.download_error {
            return Err(err.clone());
        }
        stored
            .versions
            .iter()
            .find(|(v, _)| v.id == version_id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| SourceError::NotFound(format!("{}@{}", doc, version_id)))
    }

    async fn extract_metadata(
        &self,
        doc: &DocumentRef,
        variant: SchemaVariant,
        cancel: &CancellationToken,
    ) -> Result<Vec<MetadataRecord>, SourceError> {
        check_cancel(cancel)?;
        let mut state = self.state.lock().await;
        state
            .calls
            .push(SourceCall::ExtractMetadata(doc.clone(), variant));
        let stored = state
            .documents
            .get(doc)
            .ok_or_else(|| SourceError::NotFound(doc.to_string()))?;
        if let Some(records) = &stored.metadata {
            return Ok(records.clone());
        }
        let object_id = Self::default_object_id(doc);
        Ok(stored
            .versions
            .iter()
            .map(|(v, _)| MetadataRecord {
                object_id: object_id.clone(),
                version_id: Some(v.id.clone()),
                fields: serde_json::json!({ "schema": variant.as_str() }),
                security: serde_json::json!({ "tenant": doc.tenant_id }),
            })
            .collect())
    }

    async fn delete_document(
        &self,
        doc: &DocumentRef,
        cancel: &CancellationToken,
    ) -> Result<bool, SourceError> {
        check_cancel(cancel)?;
        let mut state = self.state.lock().await;
        state.calls.push(SourceCall::Delete(doc.clone()));
        if state.refuse_delete {
            return Ok(false);
        }
        Ok(state.documents.remove(doc).is_some())
    }
}
