use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Blob store behind the file repository. Keys are opaque, append-only
/// locators; one blob per FileRecord.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Write a blob under the given key. Keys are write-once: a key that
    /// already holds a blob is refused, never overwritten.
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Read a blob back
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Delete a blob. Missing blobs are not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check whether a blob exists
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Get the storage type name
    fn storage_type(&self) -> &'static str;
}
