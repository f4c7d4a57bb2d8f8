use crate::engine::{EngineOutput, ScanEngine};
use crate::scan::verdict::{interpret, truncate_output};
use futures::StreamExt;
use scanvault_core::{
    revision_now, Config, EventLogEntry, LedgerFields, PipelineError, RecordKey, ScanJob,
    ScanRecord, ScanStatus,
};
use scanvault_db::{LedgerError, ScanLedger};
use scanvault_storage::Storage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub scan_timeout: Duration,
    pub max_output_chars: usize,
    /// Directory for scoped local copies; the system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            scan_timeout: Duration::from_secs(120),
            max_output_chars: 2048,
            scratch_dir: None,
        }
    }
}

impl ExecutorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            scan_timeout: Duration::from_secs(config.scan_timeout_secs()),
            max_output_chars: config.max_engine_output_chars(),
            scratch_dir: config.scan_scratch_dir().cloned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job wrote a terminal status.
    Completed(ScanRecord),
    /// Another delivery already claimed the record.
    Duplicate { current: ScanStatus },
}

/// Drives one object through `PENDING -> SCANNING -> terminal`.
#[derive(Clone)]
pub struct ScanExecutor {
    ledger: Arc<dyn ScanLedger>,
    storage: Arc<dyn Storage>,
    engine: Arc<dyn ScanEngine>,
    settings: ExecutorSettings,
}

impl ScanExecutor {
    pub fn new(
        ledger: Arc<dyn ScanLedger>,
        storage: Arc<dyn Storage>,
        engine: Arc<dyn ScanEngine>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            ledger,
            storage,
            engine,
            settings,
        }
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Run the scan for `job`.
    ///
    /// `current` is the record the guard saw; when it is `None` a PENDING
    /// revision is created first from the notification's locator.
    #[tracing::instrument(skip(self, job, current), fields(object_id = %job.object_id, key = %job.key))]
    pub async fn execute(
        &self,
        job: &ScanJob,
        current: Option<ScanRecord>,
    ) -> Result<JobOutcome, PipelineError> {
        let start = Instant::now();

        let record = match current {
            Some(record) => record,
            None => {
                tracing::warn!("No intake record found, creating one from the notification");
                self.ledger
                    .append(
                        &job.object_id,
                        revision_now(),
                        LedgerFields::pending(
                            job.locator(),
                            "notification received without intake record",
                        ),
                    )
                    .await
                    .map_err(|e| PipelineError::LedgerWriteFailure(e.to_string()))?
            }
        };
        let key = record.key();

        match self
            .ledger
            .update_status(
                &key,
                ScanStatus::Scanning,
                "scan in progress",
                vec![EventLogEntry::new("scan started")],
            )
            .await
        {
            Ok(_) => {}
            Err(LedgerError::InvalidTransition { current, .. }) => {
                tracing::info!(status = %current, "Record already claimed, skipping duplicate delivery");
                return Ok(JobOutcome::Duplicate { current });
            }
            Err(e) => return Err(PipelineError::LedgerWriteFailure(e.to_string())),
        }

        let scratch = match self.fetch(&job.key).await {
            Ok(file) => file,
            Err(e) => {
                tracing::error!(error = %e, kind = e.kind(), "Download failed, recording ERROR");
                let detail = format!("download failed: {}", e);
                let record = self
                    .finish(&key, ScanStatus::Error, &detail, vec![EventLogEntry::new(detail.clone())])
                    .await?;
                return Ok(JobOutcome::Completed(record));
            }
        };

        let result = self
            .engine
            .run(scratch.path(), self.settings.scan_timeout)
            .await;
        // Release the local copy before touching the ledger again.
        drop(scratch);

        let verdict = interpret(&result);
        let mut events = Vec::new();
        match &result {
            Ok(output) => events.extend(self.output_events(output)),
            Err(e) => {
                let err = PipelineError::EngineError(e.to_string());
                tracing::error!(error = %err, kind = err.kind(), engine = self.engine.name(), "Scan engine failed");
            }
        }
        events.push(EventLogEntry::new(format!(
            "scan finished: {}",
            verdict.status
        )));

        let record = self
            .finish(&key, verdict.status, &verdict.detail, events)
            .await?;

        tracing::info!(
            status = %record.status,
            engine = self.engine.name(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Scan completed"
        );

        Ok(JobOutcome::Completed(record))
    }

    async fn finish(
        &self,
        key: &RecordKey,
        status: ScanStatus,
        detail: &str,
        events: Vec<EventLogEntry>,
    ) -> Result<ScanRecord, PipelineError> {
        self.ledger
            .update_status(key, status, detail, events)
            .await
            .map_err(|e| PipelineError::LedgerWriteFailure(e.to_string()))
    }

    /// Stream the object into a scratch file that is removed on drop.
    async fn fetch(&self, storage_key: &str) -> Result<NamedTempFile, PipelineError> {
        let scratch = match &self.settings.scratch_dir {
            Some(dir) => tempfile::Builder::new().prefix("scan-").tempfile_in(dir),
            None => tempfile::Builder::new().prefix("scan-").tempfile(),
        }
        .map_err(infra)?;

        let mut body = self
            .storage
            .download_stream(storage_key)
            .await
            .map_err(infra)?;

        let mut file = tokio::fs::File::from_std(scratch.reopen().map_err(infra)?);
        let mut size = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(infra)?;
            size += chunk.len() as u64;
            file.write_all(&chunk).await.map_err(infra)?;
        }
        file.flush().await.map_err(infra)?;

        tracing::debug!(size_bytes = size, path = %scratch.path().display(), "Object copied to scratch file");
        Ok(scratch)
    }

    fn output_events(&self, output: &EngineOutput) -> Vec<EventLogEntry> {
        let limit = self.settings.max_output_chars;
        [("engine stdout", &output.stdout), ("engine stderr", &output.stderr)]
            .into_iter()
            .filter(|(_, text)| !text.trim().is_empty())
            .map(|(label, text)| {
                EventLogEntry::new(format!("{}: {}", label, truncate_output(text, limit)))
            })
            .collect()
    }
}

fn infra(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::TransientInfra(e.to_string())
}
