//! Version-ordered replication of one document.
//!
//! Versions are copied oldest to newest onto a single destination key so the
//! object store's native versioning mirrors the source history. Each write is
//! recorded in the version ledger. A failure part-way leaves the already
//! copied prefix in place; nothing is rolled back.

mod lineage;

pub use lineage::{pair_metadata, plan_versions, LineageError, PlannedVersion};

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::http_client::RequestError;
use crate::models::VersionRecord;
use crate::object_store::{ObjectStore, ObjectStoreError};
use crate::rate_limit::ApiClass;
use crate::repository::{ArchiveLedger, DieselError};
use crate::source::{DocumentRef, DocumentSource, SchemaVariant, SourceError};

#[derive(Debug, Error)]
pub enum ReplicationError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{api_class} request still throttled after {attempts} attempts")]
    ThrottleExceeded { api_class: ApiClass, attempts: u32 },
    #[error("replication cancelled")]
    Cancelled,
    #[error("version lineage mismatch: {0}")]
    LineageMismatch(#[from] LineageError),
    #[error("version record for {destination_key} (source version {source_version_id}) was not inserted")]
    InsertFailed {
        destination_key: String,
        source_version_id: String,
    },
    #[error("source deletion failed: {0}")]
    DeleteFailed(String),
    #[error("document source error: {0}")]
    Source(SourceError),
    #[error(transparent)]
    Storage(#[from] ObjectStoreError),
    #[error("database error: {0}")]
    Database(#[from] DieselError),
}

impl ReplicationError {
    /// HTTP-style code reported in batch outcomes.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::ThrottleExceeded { .. } => 429,
            Self::Cancelled => 499,
            Self::LineageMismatch(_) => 422,
            Self::InsertFailed { .. }
            | Self::DeleteFailed(_)
            | Self::Storage(_)
            | Self::Database(_) => 500,
            Self::Source(_) => 502,
        }
    }
}

impl From<SourceError> for ReplicationError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound(what) => Self::NotFound(what),
            SourceError::Request(RequestError::ThrottleExceeded {
                api_class,
                attempts,
            }) => Self::ThrottleExceeded {
                api_class,
                attempts,
            },
            SourceError::Request(RequestError::Cancelled) => Self::Cancelled,
            other => Self::Source(other),
        }
    }
}

/// What to replicate and where.
#[derive(Debug, Clone)]
pub struct ReplicationRequest {
    pub doc: DocumentRef,
    pub destination_key: String,
    pub variant: SchemaVariant,
    pub replicate_all_versions: bool,
    pub delete_source_after: bool,
    pub queue_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationStatus {
    Archived { versions: usize },
    AlreadyArchived,
}

impl ReplicationStatus {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Archived { .. } => 200,
            Self::AlreadyArchived => 201,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Archived { versions: 1 } => "archived 1 version".to_string(),
            Self::Archived { versions } => format!("archived {} versions", versions),
            Self::AlreadyArchived => "already archived".to_string(),
        }
    }
}

/// Copies documents from the source into the object store and records lineage.
#[derive(Clone)]
pub struct ReplicationEngine {
    source: Arc<dyn DocumentSource>,
    objects: Arc<dyn ObjectStore>,
    ledger: Arc<dyn ArchiveLedger>,
}

impl ReplicationEngine {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        objects: Arc<dyn ObjectStore>,
        ledger: Arc<dyn ArchiveLedger>,
    ) -> Self {
        Self {
            source,
            objects,
            ledger,
        }
    }

    /// Replicate one document.
    ///
    /// If anything already exists at the destination key the call returns
    /// [`ReplicationStatus::AlreadyArchived`] without writing.
    pub async fn replicate(
        &self,
        request: &ReplicationRequest,
        cancel: &CancellationToken,
    ) -> Result<ReplicationStatus, ReplicationError> {
        let doc = &request.doc;
        let key = request.destination_key.as_str();

        let versions = self.source.list_versions(doc, cancel).await?;
        if versions.is_empty() {
            return Err(ReplicationError::NotFound(format!(
                "{} has no versions",
                doc
            )));
        }
        let records = self
            .source
            .extract_metadata(doc, request.variant, cancel)
            .await?;

        if self.objects.exists(key).await? {
            info!("{} already archived at {}", doc, key);
            return Ok(ReplicationStatus::AlreadyArchived);
        }

        let paired = pair_metadata(&versions, records)?;
        let plan = plan_versions(paired, request.replicate_all_versions);

        let published_object_id = plan
            .last()
            .map(|p| p.metadata.object_id.clone())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        info!(
            "Replicating {} version(s) of {} to {}",
            plan.len(),
            doc,
            key
        );

        for planned in &plan {
            if cancel.is_cancelled() {
                warn!("Replication of {} cancelled mid-history", doc);
                return Err(ReplicationError::Cancelled);
            }
            self.replicate_version(request, planned, &published_object_id, cancel)
                .await?;
        }

        if request.delete_source_after {
            self.delete_source(doc, key, cancel).await?;
        }

        Ok(ReplicationStatus::Archived {
            versions: plan.len(),
        })
    }

    async fn replicate_version(
        &self,
        request: &ReplicationRequest,
        planned: &PlannedVersion,
        published_object_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ReplicationError> {
        let version = &planned.descriptor;
        let bytes = self
            .source
            .download(&request.doc, &version.id, planned.is_latest, cancel)
            .await?;
        let content_hash = VersionRecord::compute_hash(&bytes);
        let size = bytes.len() as u64;

        let put = self.objects.put(&request.destination_key, bytes).await?;
        debug!(
            "Uploaded {} version {} as {} ({} bytes)",
            request.doc, version.id, put.version_id, size
        );

        let record = VersionRecord {
            object_id: if planned.metadata.object_id.is_empty() {
                published_object_id.to_string()
            } else {
                planned.metadata.object_id.clone()
            },
            destination_key: request.destination_key.clone(),
            storage_version_id: put.version_id,
            source_version_id: version.id.clone(),
            version_modified_at: version.modified_at,
            is_published: planned.is_latest,
            published_object_id: if planned.is_latest {
                None
            } else {
                Some(published_object_id.to_string())
            },
            content_hash,
            size,
            metadata: planned.metadata.fields.clone(),
            security: planned.metadata.security.clone(),
            queue_id: request.queue_id.clone(),
            archived_at: Utc::now(),
        };

        if self.ledger.insert(&record).await? == 0 {
            warn!(
                "Version record for {} ({}) was not inserted",
                request.destination_key, version.id
            );
            return Err(ReplicationError::InsertFailed {
                destination_key: request.destination_key.clone(),
                source_version_id: version.id.clone(),
            });
        }
        Ok(())
    }

    async fn delete_source(
        &self,
        doc: &DocumentRef,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<(), ReplicationError> {
        if !self.objects.exists(key).await? {
            return Err(ReplicationError::DeleteFailed(format!(
                "{} missing from object store after upload",
                key
            )));
        }
        if !self.source.delete_document(doc, cancel).await? {
            return Err(ReplicationError::DeleteFailed(format!(
                "document source refused to delete {}",
                doc
            )));
        }
        info!("Deleted {} from document source", doc);
        Ok(())
    }
}
