//! In-memory object store with the same versioning semantics.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use super::{validate_key, ObjectStore, ObjectStoreError, PutResult};

#[derive(Debug, Default)]
struct State {
    objects: HashMap<String, Vec<(String, Bytes)>>,
    writes: Vec<(String, String)>,
}

/// Object store held in memory. Records every write in order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryObjectStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(key, version_id)` for every write, in the order they happened.
    pub async fn writes(&self) -> Vec<(String, String)> {
        self.state.read().await.writes.clone()
    }

    /// Current bytes at `key`.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let state = self.state.read().await;
        state
            .objects
            .get(key)
            .and_then(|versions| versions.last())
            .map(|(_, bytes)| bytes.clone())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        validate_key(key)?;
        Ok(self.state.read().await.objects.contains_key(key))
    }

    async fn put(&self, key: &str, bytes: Bytes) -> Result<PutResult, ObjectStoreError> {
        validate_key(key)?;
        let mut state = self.state.write().await;
        let versions = state.objects.entry(key.to_string()).or_default();
        let version_id = format!("{:08}-{}", versions.len() + 1, uuid::Uuid::new_v4().simple());
        versions.push((version_id.clone(), bytes));
        state.writes.push((key.to_string(), version_id.clone()));
        Ok(PutResult { version_id })
    }

    async fn list_versions(&self, key: &str) -> Result<Vec<String>, ObjectStoreError> {
        validate_key(key)?;
        let state = self.state.read().await;
        Ok(state
            .objects
            .get(key)
            .map(|versions| versions.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default())
    }
}
