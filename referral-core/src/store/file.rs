//! Documents as files under a data directory.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{BlobStore, StoreError, WriteReport};

pub struct FileBlobStore {
    root_dir: PathBuf,
}

impl FileBlobStore {
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    fn id(&self) -> &str {
        "file"
    }

    async fn read_blob(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_blob(&self, key: &str, bytes: &[u8]) -> Result<WriteReport, StoreError> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so readers never see a half-written document
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), size = bytes.len(), "Wrote document");
        Ok(WriteReport::local())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_reads_none() {
        let dir = TempDir::new().unwrap();
        let store = FileBlobStore::new(dir.path());
        assert!(store.read_blob("data.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_creates_directories() {
        let dir = TempDir::new().unwrap();
        let store = FileBlobStore::new(dir.path().join("nested/data"));

        let report = store.write_blob("referrals.json", b"{}").await.unwrap();
        assert!(!report.replica_failed());
        assert_eq!(store.read_blob("referrals.json").await.unwrap().unwrap(), b"{}");
    }
}
