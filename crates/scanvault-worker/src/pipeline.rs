//! One notification, end to end: adapter, executor, publisher.

use crate::adapter::{AdapterDecision, TriggerAdapter};
use crate::context::WorkerContext;
use scanvault_core::{LogLevel, PipelineError, ScanRecord, ScanStatus, StorageNotification};
use scanvault_services::{
    IdempotencyGuard, JobOutcome, PublishOutcome, ResultPublisher, ScanExecutor,
};
use std::time::Instant;

/// What happened to a single notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Rejected before any ledger write.
    Dropped(PipelineError),
    /// The object already had a final verdict; nothing was written.
    AlreadyTerminal(ScanRecord),
    /// Another delivery owns the scan.
    Duplicate(ScanStatus),
    /// A terminal status was written.
    Completed {
        record: ScanRecord,
        publish: PublishOutcome,
    },
    /// The job failed after it started writing.
    Failed(PipelineError),
}

#[derive(Clone)]
pub struct ScanPipeline {
    adapter: TriggerAdapter,
    executor: ScanExecutor,
    publisher: ResultPublisher,
}

impl ScanPipeline {
    pub fn new(context: &WorkerContext) -> Self {
        let guard = IdempotencyGuard::new(context.ledger.clone());
        Self {
            adapter: TriggerAdapter::new(context.raw_storage.container(), guard),
            executor: ScanExecutor::new(
                context.ledger.clone(),
                context.raw_storage.clone(),
                context.engine.clone(),
                context.settings.clone(),
            ),
            publisher: ResultPublisher::new(
                context.ledger.clone(),
                context.raw_storage.clone(),
                context.trusted_storage.clone(),
            ),
        }
    }

    /// Process one notification. Every failure is logged and folded into the outcome.
    #[tracing::instrument(skip(self), fields(container = %notification.container, key = %notification.key))]
    pub async fn process(&self, notification: &StorageNotification) -> ProcessOutcome {
        let start = Instant::now();

        let (job, current) = match self.adapter.handle(notification).await {
            Ok(AdapterDecision::Dispatch { job, current }) => (job, current),
            Ok(AdapterDecision::Discard(record)) => {
                tracing::info!(
                    object_id = %record.object_id,
                    status = %record.status,
                    "Object already scanned, notification discarded"
                );
                return ProcessOutcome::AlreadyTerminal(record);
            }
            Err(e) => {
                log_pipeline_error(&e, "Notification dropped");
                return ProcessOutcome::Dropped(e);
            }
        };

        let outcome = match self.executor.execute(&job, current).await {
            Ok(JobOutcome::Completed(record)) => {
                let publish = self.publisher.publish(&record).await;
                ProcessOutcome::Completed { record, publish }
            }
            Ok(JobOutcome::Duplicate { current }) => ProcessOutcome::Duplicate(current),
            Err(e) => {
                log_pipeline_error(&e, "Scan job failed");
                ProcessOutcome::Failed(e)
            }
        };

        tracing::debug!(
            object_id = %job.object_id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Notification processed"
        );

        outcome
    }

    /// Process notifications independently; one failure never stops the rest.
    pub async fn process_batch(&self, notifications: &[StorageNotification]) -> Vec<ProcessOutcome> {
        let mut outcomes = Vec::with_capacity(notifications.len());
        for notification in notifications {
            outcomes.push(self.process(notification).await);
        }
        outcomes
    }
}

fn log_pipeline_error(err: &PipelineError, message: &str) {
    match err.log_level() {
        LogLevel::Error => tracing::error!(error = %err, kind = err.kind(), "{}", message),
        LogLevel::Warn => tracing::warn!(error = %err, kind = err.kind(), "{}", message),
        LogLevel::Debug => tracing::debug!(error = %err, kind = err.kind(), "{}", message),
    }
}
