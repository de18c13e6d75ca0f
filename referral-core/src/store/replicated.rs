//! Local store mirrored to a remote one.
//!
//! Reads prefer the remote copy when it holds valid JSON, otherwise the
//! local file. Writes land locally first; the remote push is a second,
//! independent step whose failure is reported, never rolled back.
//!
//! A key whose last push failed is read from the local copy until a later
//! push succeeds, so the stale remote copy never shadows a local write.

use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{BlobStore, ReplicaStatus, StoreError, WriteReport};

pub struct ReplicatedBlobStore<L, R> {
    local: L,
    remote: R,
    /// Keys whose remote copy is behind the local one
    unpushed: RwLock<HashSet<String>>,
}

impl<L: BlobStore, R: BlobStore> ReplicatedBlobStore<L, R> {
    pub fn new(local: L, remote: R) -> Self {
        Self {
            local,
            remote,
            unpushed: RwLock::new(HashSet::new()),
        }
    }

    /// True while the remote copy of `key` misses a local write.
    pub async fn is_unpushed(&self, key: &str) -> bool {
        self.unpushed.read().await.contains(key)
    }
}

#[async_trait]
impl<L: BlobStore, R: BlobStore> BlobStore for ReplicatedBlobStore<L, R> {
    fn id(&self) -> &str {
        "replicated"
    }

    async fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        if self.is_unpushed(key).await {
            debug!(key = %key, "Remote copy is behind, reading local");
            return self.local.read_blob(key).await;
        }

        match self.remote.read_blob(key).await {
            Ok(Some(bytes)) if serde_json::from_slice::<serde_json::Value>(&bytes).is_ok() => {
                return Ok(Some(bytes));
            }
            Ok(Some(_)) => warn!(key = %key, remote = self.remote.id(), "Remote copy is not valid JSON"),
            Ok(None) => debug!(key = %key, remote = self.remote.id(), "No remote copy"),
            Err(e) => debug!(key = %key, remote = self.remote.id(), error = %e, "Remote read failed"),
        }
        self.local.read_blob(key).await
    }

    async fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<WriteReport, StoreError> {
        self.local.write_blob(key, bytes).await?;

        let replica = match self.remote.write_blob(key, bytes).await {
            Ok(_) => {
                if self.unpushed.write().await.remove(key) {
                    info!(key = %key, remote = self.remote.id(), "Remote copy caught up");
                }
                ReplicaStatus::Pushed
            }
            Err(e) => {
                warn!(key = %key, remote = self.remote.id(), error = %e, "Remote push failed, local copy kept");
                self.unpushed.write().await.insert(key.to_string());
                ReplicaStatus::Failed(e.to_string())
            }
        };
        Ok(WriteReport { replica })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBlobStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_remote_failure_keeps_local_write() {
        let local = Arc::new(MemoryBlobStore::new());
        let remote = Arc::new(MemoryBlobStore::with_failing_writes());
        let store = ReplicatedBlobStore::new(local.clone(), remote.clone());

        let report = store.write_blob("data.json", b"[]").await.unwrap();
        assert!(report.replica_failed());
        assert_eq!(local.get("data.json").await.unwrap(), b"[]");
        assert!(remote.get("data.json").await.is_none());
    }

    #[tokio::test]
    async fn test_local_failure_is_an_error() {
        let store = ReplicatedBlobStore::new(
            MemoryBlobStore::with_failing_writes(),
            MemoryBlobStore::new(),
        );
        assert!(store.write_blob("data.json", b"[]").await.is_err());
    }

    #[tokio::test]
    async fn test_reads_prefer_valid_remote() {
        let local = Arc::new(MemoryBlobStore::new());
        let remote = Arc::new(MemoryBlobStore::new());
        local.insert("referrals.json", r#"{"local":true}"#).await;
        let store = ReplicatedBlobStore::new(local.clone(), remote.clone());

        assert_eq!(store.read_blob("referrals.json").await.unwrap().unwrap(), br#"{"local":true}"#);

        remote.insert("referrals.json", "not json").await;
        assert_eq!(store.read_blob("referrals.json").await.unwrap().unwrap(), br#"{"local":true}"#);

        remote.insert("referrals.json", r#"{"remote":true}"#).await;
        assert_eq!(store.read_blob("referrals.json").await.unwrap().unwrap(), br#"{"remote":true}"#);
    }

    #[tokio::test]
    async fn test_failed_push_reads_local_until_caught_up() {
        let local = Arc::new(MemoryBlobStore::new());
        let remote = Arc::new(MemoryBlobStore::new());
        let store = ReplicatedBlobStore::new(local.clone(), remote.clone());

        store.write_blob("data.json", b"[1]").await.unwrap();
        remote.set_failing_writes(true);
        assert!(store.write_blob("data.json", b"[1,2]").await.unwrap().replica_failed());
        assert!(store.is_unpushed("data.json").await);

        // Remote still holds the older, valid copy
        assert_eq!(remote.get("data.json").await.unwrap(), b"[1]");
        assert_eq!(store.read_blob("data.json").await.unwrap().unwrap(), b"[1,2]");

        remote.set_failing_writes(false);
        store.write_blob("data.json", b"[1,2,3]").await.unwrap();
        assert!(!store.is_unpushed("data.json").await);
        assert_eq!(store.read_blob("data.json").await.unwrap().unwrap(), b"[1,2,3]");
    }
}
