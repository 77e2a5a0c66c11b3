//! Object store on the local filesystem.
//!
//! Layout under the root:
//! `{root}/{key}` holds the current bytes and
//! `{root}/.versions/{key}/{seq:08}-{uuid}` holds every write.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::debug;

use super::{validate_key, ObjectStore, ObjectStoreError, PutResult};

pub(crate) const VERSIONS_DIR: &str = ".versions";

#[derive(Debug, Clone)]
pub struct FilesystemObjectStore {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FilesystemObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn current_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    fn versions_dir(&self, key: &str) -> PathBuf {
        self.root.join(VERSIONS_DIR).join(key)
    }

    /// Read the bytes of one historical version.
    pub async fn read_version(&self, key: &str, version_id: &str) -> Result<Bytes, ObjectStoreError> {
        validate_key(key)?;
        if version_id.contains('/') || version_id.contains("..") {
            return Err(ObjectStoreError::InvalidKey(version_id.to_string()));
        }
        let data = tokio::fs::read(self.versions_dir(key).join(version_id)).await?;
        Ok(Bytes::from(data))
    }
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ObjectStoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

async fn version_entries(dir: &Path) -> Result<Vec<String>, ObjectStoreError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if !name.contains(".tmp-") {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

#[async_trait]
impl ObjectStore for FilesystemObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        validate_key(key)?;
        match tokio::fs::metadata(self.current_path(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, bytes: Bytes) -> Result<PutResult, ObjectStoreError> {
        validate_key(key)?;
        let _guard = self.write_lock.lock().await;

        let versions_dir = self.versions_dir(key);
        let seq = version_entries(&versions_dir).await?.len() + 1;
        let version_id = format!("{:08}-{}", seq, uuid::Uuid::new_v4().simple());

        write_atomic(&versions_dir.join(&version_id), &bytes).await?;
        write_atomic(&self.current_path(key), &bytes).await?;

        debug!("Stored {} ({} bytes) as version {}", key, bytes.len(), version_id);
        Ok(PutResult { version_id })
    }

    async fn list_versions(&self, key: &str) -> Result<Vec<String>, ObjectStoreError> {
        validate_key(key)?;
        version_entries(&self.versions_dir(key)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_keeps_history() {
        let dir = tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path());
        let key = "US/acme/reports/q3.pdf";

        assert!(!store.exists(key).await.unwrap());

        let first = store.put(key, Bytes::from_static(b"v1")).await.unwrap();
        let second = store.put(key, Bytes::from_static(b"v2")).await.unwrap();
        assert_ne!(first.version_id, second.version_id);

        assert!(store.exists(key).await.unwrap());
        assert_eq!(
            tokio::fs::read(dir.path().join(key)).await.unwrap(),
            b"v2".to_vec()
        );

        let versions = store.list_versions(key).await.unwrap();
        assert_eq!(versions, vec![first.version_id.clone(), second.version_id]);
        assert_eq!(
            store.read_version(key, &first.version_id).await.unwrap(),
            Bytes::from_static(b"v1")
        );
    }

    #[tokio::test]
    async fn test_rejects_escaping_keys() {
        let dir = tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path());
        assert!(matches!(
            store.put("../outside", Bytes::new()).await,
            Err(ObjectStoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_list_versions_of_missing_key() {
        let dir = tempdir().unwrap();
        let store = FilesystemObjectStore::new(dir.path());
        assert!(store.list_versions("US/none").await.unwrap().is_empty());
    }
}
