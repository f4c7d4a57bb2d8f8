#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use scanvault_core::Config;
use std::sync::Arc;

fn region(config: &Config) -> StorageResult<String> {
    config
        .s3_region()
        .or_else(|| config.aws_region())
        .map(String::from)
        .ok_or_else(|| {
            StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
        })
}

/// Create the raw intake store based on configuration
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend() {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config.upload_bucket().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("UPLOAD_BUCKET or S3_BUCKET not configured".to_string())
            })?;
            let endpoint = config.s3_endpoint().map(String::from);

            let storage = S3Storage::new(bucket, region(config)?, endpoint).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;

            let storage = LocalStorage::new(base_path, config.local_storage_container()).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

/// Create the trusted destination for CLEAN objects, if one is configured.
///
/// `TRUSTED_BUCKET` takes precedence over `TRUSTED_LOCAL_STORAGE_PATH`.
pub async fn create_trusted_storage(config: &Config) -> StorageResult<Option<Arc<dyn Storage>>> {
    if let Some(bucket) = config.trusted_bucket() {
        #[cfg(feature = "storage-s3")]
        {
            let endpoint = config.s3_endpoint().map(String::from);
            let storage = S3Storage::new(bucket.to_string(), region(config)?, endpoint).await?;
            return Ok(Some(Arc::new(storage)));
        }

        #[cfg(not(feature = "storage-s3"))]
        {
            return Err(StorageError::ConfigError(format!(
                "TRUSTED_BUCKET={} requires the storage-s3 feature",
                bucket
            )));
        }
    }

    #[cfg(feature = "storage-local")]
    if let Some(path) = config.trusted_local_storage_path() {
        let storage = LocalStorage::new(path, config.trusted_local_container()).await?;
        return Ok(Some(Arc::new(storage)));
    }

    Ok(None)
}
