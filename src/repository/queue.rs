//! Diesel-based archive queue repository.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{NewQueueEntry, QueueRecord};
use super::pool::{AsyncSqlitePool, DieselError};
use super::util::parse_datetime;
use super::QueueStore;
use crate::models::{QueueEntry, QueueStatus};
use crate::schema::archive_queue;

/// Convert a database record to a domain model.
impl From<QueueRecord> for QueueEntry {
    fn from(record: QueueRecord) -> Self {
        QueueEntry {
            id: record.id,
            source_path: record.source_path,
            rule_id: record.rule_id,
            status: QueueStatus::from_str(&record.status).unwrap_or(QueueStatus::New),
            log: record.log,
            retry_count: record.retry_count.max(0) as u32,
            created_at: parse_datetime(&record.created_at),
            updated_at: parse_datetime(&record.updated_at),
        }
    }
}

/// Queue table access.
#[derive(Clone)]
pub struct DieselQueueRepository {
    pool: AsyncSqlitePool,
}

impl DieselQueueRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new entry.
    pub async fn insert(&self, entry: &QueueEntry) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        let created_at = entry.created_at.to_rfc3339();
        let updated_at = entry.updated_at.to_rfc3339();

        diesel::insert_into(archive_queue::table)
            .values(NewQueueEntry {
                id: &entry.id,
                source_path: &entry.source_path,
                rule_id: &entry.rule_id,
                status: entry.status.as_str(),
                log: &entry.log,
                retry_count: entry.retry_count as i32,
                created_at: &created_at,
                updated_at: &updated_at,
            })
            .execute(&mut conn)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<QueueEntry>, DieselError> {
        let mut conn = self.pool.get().await?;
        let record = archive_queue::table
            .find(id)
            .select(QueueRecord::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(QueueEntry::from))
    }

    pub async fn get_by_source_path(
        &self,
        source_path: &str,
    ) -> Result<Option<QueueEntry>, DieselError> {
        let mut conn = self.pool.get().await?;
        let record = archive_queue::table
            .filter(archive_queue::source_path.eq(source_path))
            .select(QueueRecord::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(QueueEntry::from))
    }

    /// List entries, optionally filtered by rule and status, oldest first.
    pub async fn list(
        &self,
        rule_id: Option<&str>,
        status: Option<QueueStatus>,
    ) -> Result<Vec<QueueEntry>, DieselError> {
        let mut conn = self.pool.get().await?;
        let mut query = archive_queue::table
            .select(QueueRecord::as_select())
            .order((archive_queue::created_at.asc(), archive_queue::id.asc()))
            .into_boxed();
        if let Some(rule_id) = rule_id {
            query = query.filter(archive_queue::rule_id.eq(rule_id.to_string()));
        }
        if let Some(status) = status {
            query = query.filter(archive_queue::status.eq(status.as_str()));
        }

        let records = query.load::<QueueRecord>(&mut conn).await?;
        Ok(records.into_iter().map(QueueEntry::from).collect())
    }

    /// Record the outcome of processing.
    ///
    /// Only entries that are still `new` or `failed` are updated, so a
    /// terminal status is never overwritten. Returns whether a row changed.
    pub async fn update_status(
        &self,
        id: &str,
        status: QueueStatus,
        log: &str,
        bump_retry: bool,
    ) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().to_rfc3339();
        let bump = if bump_retry { 1 } else { 0 };

        let rows = diesel::update(
            archive_queue::table
                .filter(archive_queue::id.eq(id))
                .filter(
                    archive_queue::status
                        .eq_any(vec![QueueStatus::New.as_str(), QueueStatus::Failed.as_str()]),
                ),
        )
        .set((
            archive_queue::status.eq(status.as_str()),
            archive_queue::log.eq(log),
            archive_queue::retry_count.eq(archive_queue::retry_count + bump),
            archive_queue::updated_at.eq(&now),
        ))
        .execute(&mut conn)
        .await?;
        Ok(rows > 0)
    }

    /// Put an entry back to `new` for an explicit re-run.
    pub async fn reset(&self, id: &str) -> Result<bool, DieselError> {
        let mut conn = self.pool.get().await?;
        let now = Utc::now().to_rfc3339();
        let rows = diesel::update(archive_queue::table.find(id))
            .set((
                archive_queue::status.eq(QueueStatus::New.as_str()),
                archive_queue::log.eq(""),
                archive_queue::updated_at.eq(&now),
            ))
            .execute(&mut conn)
            .await?;
        Ok(rows > 0)
    }
}

#[async_trait]
impl QueueStore for DieselQueueRepository {
    async fn get_by_source_path(
        &self,
        source_path: &str,
    ) -> Result<Option<QueueEntry>, DieselError> {
        DieselQueueRepository::get_by_source_path(self, source_path).await
    }

    async fn update_status(
        &self,
        id: &str,
        status: QueueStatus,
        log: &str,
        bump_retry: bool,
    ) -> Result<bool, DieselError> {
        DieselQueueRepository::update_status(self, id, status, log, bump_retry).await
    }
}
