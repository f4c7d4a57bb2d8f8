//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use scanvault_core::StorageLocator;
use std::pin::Pin;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked object body.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// One instance addresses one container. Callers pass object keys relative
/// to that container.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Bucket name or logical name of the local directory.
    fn container(&self) -> &str;

    /// Get the backend type
    fn backend_type(&self) -> StorageBackend;

    /// Upload data to a specific storage key.
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<StorageLocator>;

    /// Upload a chunked body to a specific storage key. Returns the number of bytes written.
    async fn upload_stream(&self, storage_key: &str, body: ByteStream) -> StorageResult<u64>;

    /// Download a file by its storage key
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Download a file as a stream of chunks
    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream>;

    /// Check if a file exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Delete a file by its storage key. Deleting a missing key is not an error.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Copy an object from this container into `destination` under the same key.
    ///
    /// Works across backends, so a local raw store can promote into S3 and
    /// the other way round.
    async fn copy_to(
        &self,
        storage_key: &str,
        destination: &dyn Storage,
    ) -> StorageResult<StorageLocator> {
        let start = std::time::Instant::now();
        let body = self.download_stream(storage_key).await?;
        let size = destination.upload_stream(storage_key, body).await?;

        tracing::info!(
            from = %self.container(),
            to = %destination.container(),
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Cross-container copy successful"
        );

        Ok(StorageLocator::new(destination.container(), storage_key))
    }
}

/// Reject keys that could escape a container.
pub(crate) fn validate_key(storage_key: &str) -> StorageResult<()> {
    if storage_key.is_empty() || storage_key.contains("..") || storage_key.starts_with('/') {
        return Err(StorageError::InvalidKey(
            "Storage key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}
