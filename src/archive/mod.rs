//! Archive orchestration for a single queue entry.
//!
//! Resolves the entry's source path into a document address, schema variant
//! and destination key, runs replication, and records the terminal status on
//! the queue entry. Status writes are best effort: a failed write is logged
//! and the replication result still stands.

mod path;

pub use path::{PathError, SourcePath};

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::{QueueEntry, QueueStatus};
use crate::replication::{
    ReplicationEngine, ReplicationError, ReplicationRequest, ReplicationStatus,
};
use crate::repository::QueueStore;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    InvalidPath(PathError),
    #[error(transparent)]
    UnknownVariant(PathError),
    #[error(transparent)]
    Replication(#[from] ReplicationError),
}

impl ArchiveError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidPath(_) => 400,
            Self::UnknownVariant(_) => 404,
            Self::Replication(e) => e.status_code(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Replication(ReplicationError::Cancelled))
    }
}

impl From<PathError> for ArchiveError {
    fn from(err: PathError) -> Self {
        match err {
            PathError::UnknownVariant { .. } => Self::UnknownVariant(err),
            PathError::Malformed(_) => Self::InvalidPath(err),
        }
    }
}

/// Per-run replication switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveOptions {
    pub replicate_all_versions: bool,
    pub delete_source_after: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            replicate_all_versions: true,
            delete_source_after: false,
        }
    }
}

#[derive(Clone)]
pub struct ArchiveOrchestrator {
    engine: ReplicationEngine,
    queue: Arc<dyn QueueStore>,
}

impl ArchiveOrchestrator {
    pub fn new(engine: ReplicationEngine, queue: Arc<dyn QueueStore>) -> Self {
        Self { engine, queue }
    }

    /// Archive one queue entry and record its terminal status.
    ///
    /// Cancellation leaves the entry untouched so it is picked up again.
    pub async fn process_one(
        &self,
        entry: &QueueEntry,
        country: &str,
        options: ArchiveOptions,
        cancel: &CancellationToken,
    ) -> Result<ReplicationStatus, ArchiveError> {
        let result = self.run(entry, country, options, cancel).await;

        match &result {
            Ok(status) => {
                info!("{}: {}", entry.source_path, status.message());
                self.record_status(entry, QueueStatus::Success, "", false)
                    .await;
            }
            Err(e) if e.is_cancelled() => {
                info!("{}: cancelled, leaving queue entry as is", entry.source_path);
            }
            Err(e) => {
                warn!("{}: {}", entry.source_path, e);
                self.record_status(entry, QueueStatus::Failed, &e.to_string(), true)
                    .await;
            }
        }

        result
    }

    async fn run(
        &self,
        entry: &QueueEntry,
        country: &str,
        options: ArchiveOptions,
        cancel: &CancellationToken,
    ) -> Result<ReplicationStatus, ArchiveError> {
        let path = SourcePath::parse(&entry.source_path)?;
        let variant = path.variant()?;

        let request = ReplicationRequest {
            doc: path.document(),
            destination_key: path.destination_key(country),
            variant,
            replicate_all_versions: options.replicate_all_versions,
            delete_source_after: options.delete_source_after,
            queue_id: Some(entry.id.clone()),
        };
        debug!(
            "Archiving {} as {} ({})",
            entry.source_path, request.destination_key, variant
        );

        Ok(self.engine.replicate(&request, cancel).await?)
    }

    async fn record_status(&self, entry: &QueueEntry, status: QueueStatus, log: &str, bump: bool) {
        match self.queue.update_status(&entry.id, status, log, bump).await {
            Ok(true) => debug!("Queue entry {} -> {}", entry.id, status),
            Ok(false) => warn!(
                "Queue entry {} not updated to {} (missing or already terminal)",
                entry.id, status
            ),
            Err(e) => warn!(
                "Failed to record status {} for queue entry {}: {}",
                status, entry.id, e
            ),
        }
    }
}
