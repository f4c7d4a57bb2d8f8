//! Test harness: in-memory ledger, local stores in a temp dir and a scripted engine.
//!
//! Run from workspace root: `cargo test -p scanvault-worker --test pipeline_test`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scanvault_core::{
    revision_now, EventLogEntry, LedgerFields, RecordKey, ScanRecord, ScanStatus, StorageBackend,
    StorageLocator, StorageNotification,
};
use scanvault_db::{InMemoryScanLedger, LedgerError, LedgerResult, ScanLedger};
use scanvault_services::{EngineError, EngineOutput, ExecutorSettings, ScanEngine};
use scanvault_storage::{ByteStream, LocalStorage, Storage, StorageError, StorageResult};
use scanvault_worker::{ScanPipeline, WorkerContext};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const RAW: &str = "raw-uploads";
pub const TRUSTED: &str = "trusted-files";

/// Engine returning a fixed result, recording every call.
pub struct FakeEngine {
    result: Result<EngineOutput, EngineError>,
    delay: Duration,
    calls: AtomicUsize,
    paths: Mutex<Vec<PathBuf>>,
}

impl FakeEngine {
    pub fn exits(code: i32, stdout: &str, stderr: &str) -> Arc<Self> {
        Self::with_result(Ok(EngineOutput::new(code, stdout, stderr)))
    }

    pub fn fails(error: EngineError) -> Arc<Self> {
        Self::with_result(Err(error))
    }

    fn with_result(result: Result<EngineOutput, EngineError>) -> Arc<Self> {
        Arc::new(Self {
            result,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            paths: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(code: i32, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(EngineOutput::new(code, "", "")),
            delay,
            calls: AtomicUsize::new(0),
            paths: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn scanned_paths(&self) -> Vec<PathBuf> {
        self.paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl ScanEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn run(&self, path: &Path, _timeout: Duration) -> Result<EngineOutput, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.paths.lock().unwrap().push(path.to_path_buf());
        assert!(path.exists(), "scratch copy must exist while the engine runs");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

/// Ledger wrapper that can be told to fail final status writes.
pub struct FailingLedger {
    inner: InMemoryScanLedger,
    fail_terminal_writes: AtomicBool,
    fail_appends_to_existing: AtomicBool,
}

impl FailingLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryScanLedger::new(),
            fail_terminal_writes: AtomicBool::new(false),
            fail_appends_to_existing: AtomicBool::new(false),
        })
    }

    pub fn fail_terminal_writes(&self) {
        self.fail_terminal_writes.store(true, Ordering::SeqCst);
    }

    pub fn fail_event_appends(&self) {
        self.fail_appends_to_existing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ScanLedger for FailingLedger {
    async fn append(
        &self,
        object_id: &str,
        revision_timestamp: DateTime<Utc>,
        fields: LedgerFields,
    ) -> LedgerResult<ScanRecord> {
        if fields.storage_locator.is_none() && self.fail_appends_to_existing.load(Ordering::SeqCst) {
            return Err(LedgerError::Decode("simulated write failure".to_string()));
        }
        self.inner.append(object_id, revision_timestamp, fields).await
    }

    async fn latest(&self, object_id: &str) -> LedgerResult<Option<ScanRecord>> {
        self.inner.latest(object_id).await
    }

    async fn update_status(
        &self,
        key: &RecordKey,
        status: ScanStatus,
        detail: &str,
        extra_events: Vec<EventLogEntry>,
    ) -> LedgerResult<ScanRecord> {
        if status.is_terminal() && self.fail_terminal_writes.load(Ordering::SeqCst) {
            return Err(LedgerError::Decode("simulated write failure".to_string()));
        }
        self.inner.update_status(key, status, detail, extra_events).await
    }
}

/// Store that rejects every operation.
pub struct BrokenStorage;

#[async_trait]
impl Storage for BrokenStorage {
    fn container(&self) -> &str {
        "broken"
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }

    async fn upload_with_key(
        &self,
        _storage_key: &str,
        _data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<StorageLocator> {
        Err(StorageError::UploadFailed("store unavailable".to_string()))
    }

    async fn upload_stream(&self, _storage_key: &str, _body: ByteStream) -> StorageResult<u64> {
        Err(StorageError::UploadFailed("store unavailable".to_string()))
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

/// Everything a pipeline test needs, with the temp dirs kept alive.
pub struct TestEnv {
    pub ledger: Arc<dyn ScanLedger>,
    pub raw: Arc<LocalStorage>,
    pub trusted: Option<Arc<dyn Storage>>,
    pub scratch: TempDir,
    _root: TempDir,
}

impl TestEnv {
    pub async fn new(ledger: Arc<dyn ScanLedger>) -> Self {
        let root = tempfile::tempdir().unwrap();
        let raw = Arc::new(LocalStorage::new(root.path().join("raw"), RAW).await.unwrap());
        let trusted: Arc<dyn Storage> = Arc::new(
            LocalStorage::new(root.path().join("trusted"), TRUSTED)
                .await
                .unwrap(),
        );
        Self {
            ledger,
            raw,
            trusted: Some(trusted),
            scratch: tempfile::tempdir().unwrap(),
            _root: root,
        }
    }

    pub async fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryScanLedger::new())).await
    }

    pub fn without_trusted(mut self) -> Self {
        self.trusted = None;
        self
    }

    pub fn with_trusted(mut self, trusted: Arc<dyn Storage>) -> Self {
        self.trusted = Some(trusted);
        self
    }

    pub fn context(&self, engine: Arc<dyn ScanEngine>) -> WorkerContext {
        WorkerContext::new(
            self.ledger.clone(),
            self.raw.clone(),
            self.trusted.clone(),
            engine,
            ExecutorSettings {
                scan_timeout: Duration::from_secs(5),
                max_output_chars: 256,
                scratch_dir: Some(self.scratch.path().to_path_buf()),
            },
        )
    }

    pub fn pipeline(&self, engine: Arc<dyn ScanEngine>) -> ScanPipeline {
        ScanPipeline::new(&self.context(engine))
    }

    /// Store an object and write its PENDING record the way intake does.
    pub async fn intake(&self, object_id: &str, filename: &str, body: &[u8]) -> StorageNotification {
        let key = format!("uploads/{}/{}", object_id, filename);
        self.raw
            .upload_with_key(&key, body.to_vec(), "application/octet-stream")
            .await
            .unwrap();
        self.ledger
            .append(
                object_id,
                revision_now(),
                LedgerFields::pending(StorageLocator::new(RAW, key.clone()), "upload received"),
            )
            .await
            .unwrap();
        StorageNotification::new(RAW, key)
    }

    pub async fn latest(&self, object_id: &str) -> ScanRecord {
        self.ledger.latest(object_id).await.unwrap().unwrap()
    }

    pub fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch.path()).unwrap().next().is_none()
    }
}

pub fn messages(record: &ScanRecord) -> Vec<&str> {
    record.event_log.iter().map(|e| e.message.as_str()).collect()
}
