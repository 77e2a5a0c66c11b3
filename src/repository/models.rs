//! Diesel ORM models for database tables.

use diesel::prelude::*;

use crate::schema;

/// Queue entry record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::archive_queue)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QueueRecord {
    pub id: String,
    pub source_path: String,
    pub rule_id: String,
    pub status: String,
    pub log: String,
    pub retry_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

/// New queue entry for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::archive_queue)]
pub struct NewQueueEntry<'a> {
    pub id: &'a str,
    pub source_path: &'a str,
    pub rule_id: &'a str,
    pub status: &'a str,
    pub log: &'a str,
    pub retry_count: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Archived version record from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::archive_versions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ArchiveVersionRecord {
    pub id: i32,
    pub object_id: String,
    pub destination_key: String,
    pub storage_version_id: String,
    pub source_version_id: String,
    pub version_modified_at: String,
    pub is_published: i32,
    pub published_object_id: Option<String>,
    pub content_hash: String,
    pub size: i64,
    pub metadata: String,
    pub security: String,
    pub queue_id: Option<String>,
    pub archived_at: String,
}

/// New archived version for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::archive_versions)]
pub struct NewArchiveVersion<'a> {
    pub object_id: &'a str,
    pub destination_key: &'a str,
    pub storage_version_id: &'a str,
    pub source_version_id: &'a str,
    pub version_modified_at: &'a str,
    pub is_published: i32,
    pub published_object_id: Option<&'a str>,
    pub content_hash: &'a str,
    pub size: i64,
    pub metadata: &'a str,
    pub security: &'a str,
    pub queue_id: Option<&'a str>,
    pub archived_at: &'a str,
}
