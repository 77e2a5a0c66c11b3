//! Replicated version lineage records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One replicated (document, version) pair. Append-only.
///
/// Among the records written for one destination key in a run, exactly one is
/// published (`is_published` and no `published_object_id`); the rest point at
/// the published record's `object_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Logical identity of the document, stable across its versions.
    pub object_id: String,
    pub destination_key: String,
    /// Version id the object store assigned to this write.
    pub storage_version_id: String,
    pub source_version_id: String,
    pub version_modified_at: DateTime<Utc>,
    pub is_published: bool,
    pub published_object_id: Option<String>,
    /// SHA-256 of the uploaded bytes.
    pub content_hash: String,
    pub size: u64,
    pub metadata: serde_json::Value,
    pub security: serde_json::Value,
    pub queue_id: Option<String>,
    pub archived_at: DateTime<Utc>,
}

impl VersionRecord {
    /// Compute SHA-256 hash of content.
    pub fn compute_hash(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_hash() {
        assert_eq!(
            VersionRecord::compute_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
