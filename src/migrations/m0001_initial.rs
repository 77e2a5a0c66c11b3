use cetane::prelude::*;

pub fn migration() -> Migration {
    Migration::new("0001_initial")
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS archive_queue (
    id TEXT PRIMARY KEY NOT NULL,
    source_path TEXT NOT NULL,
    rule_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'new',
    log TEXT NOT NULL DEFAULT '',
    retry_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_archive_queue_source_path ON archive_queue(source_path)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX IF NOT EXISTS idx_archive_queue_rule_status ON archive_queue(rule_id, status)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            r#"CREATE TABLE IF NOT EXISTS archive_versions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    object_id TEXT NOT NULL,
    destination_key TEXT NOT NULL,
    storage_version_id TEXT NOT NULL,
    source_version_id TEXT NOT NULL,
    version_modified_at TEXT NOT NULL,
    is_published INTEGER NOT NULL DEFAULT 0,
    published_object_id TEXT,
    content_hash TEXT NOT NULL,
    size BIGINT NOT NULL DEFAULT 0,
    metadata TEXT NOT NULL DEFAULT '{}',
    security TEXT NOT NULL DEFAULT '{}',
    queue_id TEXT,
    archived_at TEXT NOT NULL
)"#,
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_archive_versions_storage ON archive_versions(destination_key, storage_version_id)",
        ))
        .operation(RunSql::portable().for_backend(
            "sqlite",
            "CREATE INDEX IF NOT EXISTS idx_archive_versions_object ON archive_versions(object_id)",
        ))
}
