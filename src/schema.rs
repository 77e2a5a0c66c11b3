// Kept in sync with the migrations in `crate::migrations`.

diesel::table! {
    archive_queue (id) {
        id -> Text,
        source_path -> Text,
        rule_id -> Text,
        status -> Text,
        log -> Text,
        retry_count -> Integer,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    archive_versions (id) {
        id -> Integer,
        object_id -> Text,
        destination_key -> Text,
        storage_version_id -> Text,
        source_version_id -> Text,
        version_modified_at -> Text,
        is_published -> Integer,
        published_object_id -> Nullable<Text>,
        content_hash -> Text,
        size -> BigInt,
        metadata -> Text,
        security -> Text,
        queue_id -> Nullable<Text>,
        archived_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(archive_queue, archive_versions);
