//! Batch fan-out over the archive orchestrator.
//!
//! Each document identifier becomes one independent task. A failing item
//! only ever produces its own outcome; the batch call itself fails only on
//! batch-level validation.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveOptions, ArchiveOrchestrator};
use crate::models::{QueueStatus, ReplicationOutcome};
use crate::repository::QueueStore;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("country '{0}' is not allowed")]
    InvalidCountry(String),
    #[error("no document identifiers given")]
    EmptyBatch,
}

impl BatchError {
    pub fn status_code(&self) -> u16 {
        400
    }
}

/// Default archive policy values.
pub fn default_disallowed_extensions() -> Vec<String> {
    [".exe", ".dll", ".bat", ".cmd", ".msi", ".lnk", ".tmp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub fn default_allowed_countries() -> Vec<String> {
    ["US", "GB", "DE", "FR", "IN", "AU", "CA"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Which batches and documents are accepted, and how wide to fan out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchPolicy {
    pub allowed_countries: Vec<String>,
    pub disallowed_extensions: Vec<String>,
    /// Documents processed at once; 0 means unbounded.
    pub max_concurrency: usize,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            allowed_countries: default_allowed_countries(),
            disallowed_extensions: default_disallowed_extensions(),
            max_concurrency: crate::config::DEFAULT_MAX_CONCURRENCY,
        }
    }
}

impl DispatchPolicy {
    pub fn is_country_allowed(&self, country: &str) -> bool {
        self.allowed_countries
            .iter()
            .any(|c| c.eq_ignore_ascii_case(country))
    }

    /// Whether the path ends in a disallowed extension (case-insensitive).
    pub fn is_disallowed(&self, source_path: &str) -> bool {
        let lower = source_path.to_lowercase();
        self.disallowed_extensions.iter().any(|ext| {
            let ext = ext.to_lowercase();
            let ext = if ext.starts_with('.') {
                ext
            } else {
                format!(".{}", ext)
            };
            lower.ends_with(&ext)
        })
    }
}

#[derive(Clone)]
pub struct BatchDispatcher {
    orchestrator: Arc<ArchiveOrchestrator>,
    queue: Arc<dyn QueueStore>,
    policy: DispatchPolicy,
}

impl BatchDispatcher {
    pub fn new(
        orchestrator: Arc<ArchiveOrchestrator>,
        queue: Arc<dyn QueueStore>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            orchestrator,
            queue,
            policy,
        }
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Process a batch of document identifiers (queue source paths).
    ///
    /// Returns one outcome per distinct identifier, in completion order.
    pub async fn process_batch(
        &self,
        document_ids: &[String],
        country: &str,
        options: ArchiveOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<ReplicationOutcome>, BatchError> {
        if !self.policy.is_country_allowed(country) {
            return Err(BatchError::InvalidCountry(country.to_string()));
        }
        if document_ids.is_empty() {
            return Err(BatchError::EmptyBatch);
        }

        let country = country.to_uppercase();
        let outcomes = Arc::new(Mutex::new(Vec::with_capacity(document_ids.len())));
        let limit = match self.policy.max_concurrency {
            0 => None,
            n => Some(Arc::new(Semaphore::new(n))),
        };

        // Repeats of an identifier would race each other on one destination key.
        let mut seen = HashSet::new();
        let mut handles = Vec::new();
        for source_path in document_ids {
            if !seen.insert(source_path.as_str()) {
                debug!("Skipping repeated identifier {}", source_path);
                continue;
            }
            let Some(entry) = self.screen(source_path, &outcomes).await else {
                continue;
            };

            let orchestrator = self.orchestrator.clone();
            let outcomes = outcomes.clone();
            let limit = limit.clone();
            let country = country.clone();
            let cancel = cancel.clone();
            let path = source_path.clone();

            let handle = tokio::spawn(async move {
                let _permit = match &limit {
                    Some(sem) => sem.clone().acquire_owned().await.ok(),
                    None => None,
                };
                let outcome = match orchestrator
                    .process_one(&entry, &country, options, &cancel)
                    .await
                {
                    Ok(status) => ReplicationOutcome::success(
                        Some(entry.id.clone()),
                        &entry.source_path,
                        status.status_code(),
                        &status.message(),
                    ),
                    Err(e) => ReplicationOutcome::failure(
                        Some(entry.id.clone()),
                        &entry.source_path,
                        e.status_code(),
                        &e.to_string(),
                    ),
                };
                outcomes.lock().await.push(outcome);
            });
            handles.push((path, handle));
        }

        for (path, handle) in handles {
            if let Err(e) = handle.await {
                error!("Archive task for {} panicked: {}", path, e);
                outcomes.lock().await.push(ReplicationOutcome::failure(
                    None,
                    &path,
                    500,
                    &format!("archive task failed: {}", e),
                ));
            }
        }

        let outcomes = std::mem::take(&mut *outcomes.lock().await);
        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(
            "Batch finished: {}/{} documents succeeded",
            succeeded,
            outcomes.len()
        );
        Ok(outcomes)
    }

    /// Resolve an identifier to a processable queue entry, or record why not.
    async fn screen(
        &self,
        source_path: &str,
        outcomes: &Mutex<Vec<ReplicationOutcome>>,
    ) -> Option<crate::models::QueueEntry> {
        let entry = match self.queue.get_by_source_path(source_path).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                outcomes.lock().await.push(ReplicationOutcome::failure(
                    None,
                    source_path,
                    404,
                    "no queue entry for document",
                ));
                return None;
            }
            Err(e) => {
                warn!("Queue lookup for {} failed: {}", source_path, e);
                outcomes.lock().await.push(ReplicationOutcome::failure(
                    None,
                    source_path,
                    500,
                    &format!("queue lookup failed: {}", e),
                ));
                return None;
            }
        };

        let short_circuit = match entry.status {
            QueueStatus::Success => Some(ReplicationOutcome::success(
                Some(entry.id.clone()),
                source_path,
                201,
                "already archived",
            )),
            QueueStatus::Restricted => Some(ReplicationOutcome::failure(
                Some(entry.id.clone()),
                source_path,
                405,
                "document type is restricted",
            )),
            _ if self.policy.is_disallowed(source_path) => {
                if let Err(e) = self
                    .queue
                    .update_status(
                        &entry.id,
                        QueueStatus::Restricted,
                        "disallowed file extension",
                        false,
                    )
                    .await
                {
                    warn!("Failed to mark {} restricted: {}", source_path, e);
                }
                Some(ReplicationOutcome::failure(
                    Some(entry.id.clone()),
                    source_path,
                    405,
                    "disallowed file extension",
                ))
            }
            _ => None,
        };

        match short_circuit {
            Some(outcome) => {
                outcomes.lock().await.push(outcome);
                None
            }
            None => Some(entry),
        }
    }
}
