//! Diesel-based archive version ledger.

use async_trait::async_trait;
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{ArchiveVersionRecord, NewArchiveVersion};
use super::pool::{AsyncSqlitePool, DieselError};
use super::util::parse_datetime;
use super::ArchiveLedger;
use crate::models::VersionRecord;
use crate::schema::archive_versions;

impl From<ArchiveVersionRecord> for VersionRecord {
    fn from(record: ArchiveVersionRecord) -> Self {
        VersionRecord {
            object_id: record.object_id,
            destination_key: record.destination_key,
            storage_version_id: record.storage_version_id,
            source_version_id: record.source_version_id,
            version_modified_at: parse_datetime(&record.version_modified_at),
            is_published: record.is_published != 0,
            published_object_id: record.published_object_id,
            content_hash: record.content_hash,
            size: record.size.max(0) as u64,
            metadata: serde_json::from_str(&record.metadata).unwrap_or_default(),
            security: serde_json::from_str(&record.security).unwrap_or_default(),
            queue_id: record.queue_id,
            archived_at: parse_datetime(&record.archived_at),
        }
    }
}

/// Append-only ledger of replicated versions.
#[derive(Clone)]
pub struct DieselArchiveRepository {
    pool: AsyncSqlitePool,
}

impl DieselArchiveRepository {
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a version record. Returns the number of rows written.
    ///
    /// A record for an already-recorded `(destination_key, storage_version_id)`
    /// is ignored and reports zero rows.
    pub async fn insert(&self, record: &VersionRecord) -> Result<usize, DieselError> {
        let mut conn = self.pool.get().await?;
        let version_modified_at = record.version_modified_at.to_rfc3339();
        let archived_at = record.archived_at.to_rfc3339();
        let metadata =
            serde_json::to_string(&record.metadata).unwrap_or_else(|_| "{}".to_string());
        let security =
            serde_json::to_string(&record.security).unwrap_or_else(|_| "{}".to_string());

        diesel::insert_or_ignore_into(archive_versions::table)
            .values(NewArchiveVersion {
                object_id: &record.object_id,
                destination_key: &record.destination_key,
                storage_version_id: &record.storage_version_id,
                source_version_id: &record.source_version_id,
                version_modified_at: &version_modified_at,
                is_published: record.is_published as i32,
                published_object_id: record.published_object_id.as_deref(),
                content_hash: &record.content_hash,
                size: record.size as i64,
                metadata: &metadata,
                security: &security,
                queue_id: record.queue_id.as_deref(),
                archived_at: &archived_at,
            })
            .execute(&mut conn)
            .await
    }

    /// All records for a destination key in insertion order.
    pub async fn list_by_destination(
        &self,
        destination_key: &str,
    ) -> Result<Vec<VersionRecord>, DieselError> {
        let mut conn = self.pool.get().await?;
        let records = archive_versions::table
            .filter(archive_versions::destination_key.eq(destination_key))
            .order(archive_versions::id.asc())
            .select(ArchiveVersionRecord::as_select())
            .load(&mut conn)
            .await?;
        Ok(records.into_iter().map(VersionRecord::from).collect())
    }

    /// The published record for a destination key, if any.
    pub async fn published(
        &self,
        destination_key: &str,
    ) -> Result<Option<VersionRecord>, DieselError> {
        let mut conn = self.pool.get().await?;
        let record = archive_versions::table
            .filter(archive_versions::destination_key.eq(destination_key))
            .filter(archive_versions::is_published.eq(1))
            .order(archive_versions::id.desc())
            .select(ArchiveVersionRecord::as_select())
            .first(&mut conn)
            .await
            .optional()?;
        Ok(record.map(VersionRecord::from))
    }

    pub async fn count(&self) -> Result<u64, DieselError> {
        let mut conn = self.pool.get().await?;
        let count: i64 = archive_versions::table
            .select(count_star())
            .first(&mut conn)
            .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl ArchiveLedger for DieselArchiveRepository {
    async fn insert(&self, record: &VersionRecord) -> Result<usize, DieselError> {
        DieselArchiveRepository::insert(self, record).await
    }
}
