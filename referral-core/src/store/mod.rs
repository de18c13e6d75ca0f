//! Blob persistence
//!
//! The roster, aggregate and history are each one JSON document addressed
//! by a key (its file name). [`BlobStore`] is the raw byte seam with
//! several backends; [`ReferralStore`] is the typed facade on top.

pub mod file;
pub mod github;
pub mod memory;
pub mod referral;
pub mod replicated;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

pub use file::FileBlobStore;
pub use github::{GithubBlobStore, GithubConfig};
pub use memory::MemoryBlobStore;
pub use referral::{ReferralStore, StoreKeys};
pub use replicated::ReplicatedBlobStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Store not configured: {0}")]
    NotConfigured(String),
}

/// What happened to the secondary copy of a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplicaStatus {
    /// No secondary store
    Skipped,
    Pushed,
    /// Primary write kept; secondary failed
    Failed(String),
}

/// Outcome of a successful primary write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub replica: ReplicaStatus,
}

impl WriteReport {
    pub fn local() -> Self {
        Self {
            replica: ReplicaStatus::Skipped,
        }
    }

    pub fn replica_failed(&self) -> bool {
        matches!(self.replica, ReplicaStatus::Failed(_))
    }
}

/// Key/value byte storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Backend name for logs
    fn id(&self) -> &str;

    /// `Ok(None)` when the key has never been written.
    async fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<WriteReport, StoreError>;
}

#[async_trait]
impl<T: BlobStore + ?Sized> BlobStore for Arc<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    async fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).read_blob(key).await
    }

    async fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<WriteReport, StoreError> {
        (**self).write_blob(key, bytes).await
    }
}
