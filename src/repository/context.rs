//! Database context for repository access.

use std::path::Path;

use super::archive::DieselArchiveRepository;
use super::migrations::run_migrations;
use super::pool::{AsyncSqlitePool, DieselError};
use super::queue::DieselQueueRepository;

/// Entry point for database operations. Create one per command or service.
#[derive(Clone, Debug)]
pub struct DbContext {
    pool: AsyncSqlitePool,
}

impl DbContext {
    pub fn new(db_path: &Path) -> Self {
        Self {
            pool: AsyncSqlitePool::from_path(db_path),
        }
    }

    pub fn from_url(database_url: &str) -> Self {
        Self {
            pool: AsyncSqlitePool::new(database_url),
        }
    }

    pub fn pool(&self) -> &AsyncSqlitePool {
        &self.pool
    }

    pub fn queue(&self) -> DieselQueueRepository {
        DieselQueueRepository::new(self.pool.clone())
    }

    pub fn archive(&self) -> DieselArchiveRepository {
        DieselArchiveRepository::new(self.pool.clone())
    }

    /// Apply pending migrations.
    pub async fn init_schema(&self) -> Result<Vec<String>, DieselError> {
        run_migrations(self.pool.database_url()).await
    }
}
