//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM over SQLite. The replication pipeline
//! depends on the [`QueueStore`] and [`ArchiveLedger`] seams rather than the
//! concrete repositories.

pub mod archive;
pub mod context;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod queue;
pub mod util;

use async_trait::async_trait;

pub use archive::DieselArchiveRepository;
pub use context::DbContext;
pub use migrations::run_migrations;
pub use pool::{AsyncSqlitePool, DieselError};
pub use queue::DieselQueueRepository;
pub use util::{parse_datetime, to_diesel_error};

use crate::models::{QueueEntry, QueueStatus, VersionRecord};

/// Queue operations used while processing a batch.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn get_by_source_path(
        &self,
        source_path: &str,
    ) -> Result<Option<QueueEntry>, DieselError>;

    /// Update status if the entry is still `new` or `failed`.
    async fn update_status(
        &self,
        id: &str,
        status: QueueStatus,
        log: &str,
        bump_retry: bool,
    ) -> Result<bool, DieselError>;
}

/// Version ledger writes used by replication.
#[async_trait]
pub trait ArchiveLedger: Send + Sync {
    /// Insert a record, returning affected rows.
    async fn insert(&self, record: &VersionRecord) -> Result<usize, DieselError>;
}
