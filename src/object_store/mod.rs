//! Natively-versioned object store collaborator.
//!
//! Every `put` to a key keeps the previous bytes as a historical version and
//! returns a fresh storage version id, so overwriting one key repeatedly
//! preserves a document's whole history.

mod fs;
mod memory;

pub use fs::FilesystemObjectStore;
pub use memory::InMemoryObjectStore;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("object store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResult {
    /// Identifier the store assigned to this write; distinct per write.
    pub version_id: String,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError>;

    async fn put(&self, key: &str, bytes: Bytes) -> Result<PutResult, ObjectStoreError>;

    /// Version ids written to `key`, oldest first.
    async fn list_versions(&self, key: &str) -> Result<Vec<String>, ObjectStoreError>;
}

/// Reject keys that could escape the store root or collide with its bookkeeping.
pub fn validate_key(key: &str) -> Result<(), ObjectStoreError> {
    if key.is_empty() || key.starts_with('/') || key.contains('\\') {
        return Err(ObjectStoreError::InvalidKey(key.to_string()));
    }
    for (i, segment) in key.split('/').enumerate() {
        let reserved = i == 0 && segment == fs::VERSIONS_DIR;
        if segment.is_empty() || segment == "." || segment == ".." || reserved {
            return Err(ObjectStoreError::InvalidKey(key.to_string()));
        }
    }
    Ok(())
}
