//! Storage doubles for intake ordering tests.

use async_trait::async_trait;
use scanvault_core::{StorageBackend, StorageLocator, StorageNotification};
use scanvault_services::{EngineError, EngineOutput, ScanEngine};
use scanvault_storage::{ByteStream, LocalStorage, Storage, StorageError, StorageResult};
use scanvault_worker::{ProcessOutcome, ScanPipeline};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Engine that reports every file clean.
#[derive(Default)]
pub struct CleanEngine {
    calls: AtomicUsize,
}

impl CleanEngine {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScanEngine for CleanEngine {
    fn name(&self) -> &str {
        "clean"
    }

    async fn run(&self, _path: &Path, _timeout: Duration) -> Result<EngineOutput, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EngineOutput::new(0, "", ""))
    }
}

/// Raw store whose object-created event is processed before the write returns,
/// the way a fast storage notification can overtake the intake handler.
pub struct EagerNotifyStorage {
    inner: Arc<LocalStorage>,
    pipeline: Arc<ScanPipeline>,
    outcomes: Mutex<Vec<ProcessOutcome>>,
}

impl EagerNotifyStorage {
    pub fn new(inner: Arc<LocalStorage>, pipeline: Arc<ScanPipeline>) -> Self {
        Self {
            inner,
            pipeline,
            outcomes: Mutex::new(Vec::new()),
        }
    }

    pub fn outcomes(&self) -> Vec<ProcessOutcome> {
        self.outcomes.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for EagerNotifyStorage {
    fn container(&self) -> &str {
        self.inner.container()
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }

    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<StorageLocator> {
        let locator = self
            .inner
            .upload_with_key(storage_key, data, content_type)
            .await?;
        let outcome = self
            .pipeline
            .process(&StorageNotification::new(
                locator.container.clone(),
                locator.key.clone(),
            ))
            .await;
        self.outcomes.lock().unwrap().push(outcome);
        Ok(locator)
    }

    async fn upload_stream(&self, storage_key: &str, body: ByteStream) -> StorageResult<u64> {
        self.inner.upload_stream(storage_key, body).await
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        self.inner.download(storage_key).await
    }

    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream> {
        self.inner.download_stream(storage_key).await
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        self.inner.exists(storage_key).await
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        self.inner.delete(storage_key).await
    }
}

/// Raw store that rejects every write, remembering the key it was asked for.
#[derive(Default)]
pub struct RejectingStorage {
    attempted: Mutex<Option<String>>,
}

impl RejectingStorage {
    pub fn attempted_key(&self) -> Option<String> {
        self.attempted.lock().unwrap().clone()
    }
}

#[async_trait]
impl Storage for RejectingStorage {
    fn container(&self) -> &str {
        "raw-uploads"
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }

    async fn upload_with_key(
        &self,
        storage_key: &str,
        _data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<StorageLocator> {
        *self.attempted.lock().unwrap() = Some(storage_key.to_string());
        Err(StorageError::UploadFailed("bucket unavailable".to_string()))
    }

    async fn upload_stream(&self, _storage_key: &str, _body: ByteStream) -> StorageResult<u64> {
        Err(StorageError::UploadFailed("bucket unavailable".to_string()))
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        Err(StorageError::NotFound(storage_key.to_string()))
    }

    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream> {
        Err(StorageError::NotFound(storage_key.to_string()))
    }

    async fn exists(&self, _storage_key: &str) -> StorageResult<bool> {
        Ok(false)
    }

    async fn delete(&self, _storage_key: &str) -> StorageResult<()> {
        Ok(())
    }
}
