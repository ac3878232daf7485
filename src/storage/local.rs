use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::StorageProvider;

/// Filesystem-backed blob store. Keys map directly to paths under the base
/// directory, so the `{owner}/{millis}-{name}` key layout becomes one
/// directory per owner.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        self.base_path.join(key)
    }

    /// Remove now-empty directories between a deleted blob and the base,
    /// so an owner with no files leaves no directory behind.
    async fn prune_empty_dirs(&self, from: &Path) {
        let mut dir = from.parent();
        while let Some(current) = dir {
            if current == self.base_path {
                break;
            }
            if fs::remove_dir(current).await.is_err() {
                break; // not empty, or already gone
            }
            dir = current.parent();
        }
    }
}

#[async_trait]
impl StorageProvider for LocalStorage {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.blob_path(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Keys are write-once; an existing blob must never be replaced
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(AppError::Storage(format!("Blob already exists: {}", key)));
            }
            Err(e) => return Err(e.into()),
        };

        file.write_all(&data).await?;
        file.flush().await?;
        tracing::debug!(key, bytes = data.len(), "Blob written");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        match fs::read(self.blob_path(key)).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("Blob not found: {}", key)))
            }
            Err(e) => Err(AppError::Storage(format!("Failed to read blob: {}", e))),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.blob_path(key);
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key, "Blob deleted");
                self.prune_empty_dirs(&path).await;
                Ok(())
            }
            // Missing blobs are not an error; delete is idempotent
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to delete blob: {}", e))),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(fs::try_exists(self.blob_path(key)).await?)
    }

    fn storage_type(&self) -> &'static str {
        "local"
    }
}
