//! In-process store for tests and dev mode.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{BlobStore, StoreError, WriteReport};

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    fail_writes: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose writes all fail with a remote error.
    pub fn with_failing_writes() -> Self {
        let store = Self::default();
        store.set_failing_writes(true);
        store
    }

    pub fn set_failing_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Seed a document directly.
    pub async fn insert(&self, key: &str, bytes: impl Into<Vec<u8>>) {
        self.blobs.write().await.insert(key.to_string(), bytes.into());
    }

    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(key).cloned()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn id(&self) -> &str {
        "memory"
    }

    async fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.get(key).await)
    }

    async fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<WriteReport, StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Remote(format!("write rejected for {}", key)));
        }
        self.insert(key, bytes).await;
        Ok(WriteReport::local())
    }
}
