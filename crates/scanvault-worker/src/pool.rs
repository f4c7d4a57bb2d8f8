//! Worker pool: receive loop, bounded fan-out and shutdown.
//!
//! [`ScanWorker::shutdown`] stops the receive loop; jobs already dispatched
//! run to completion (or their engine timeout). [`ScanWorker::join`] waits
//! for both.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

use crate::pipeline::{ProcessOutcome, ScanPipeline};
use crate::source::{Delivery, NotificationError, NotificationSource};

#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub max_concurrency: usize,
    /// Pause after a failed receive before trying again.
    pub receive_backoff: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            receive_backoff: Duration::from_secs(5),
        }
    }
}

/// Semaphore size for `requested` jobs, clamped so the whole pool can be
/// re-acquired with one `acquire_many` at shutdown.
fn permit_count(requested: usize) -> u32 {
    let capped = requested.clamp(1, Semaphore::MAX_PERMITS);
    u32::try_from(capped).unwrap_or(u32::MAX)
}

pub struct ScanWorker {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl ScanWorker {
    /// Spawn the receive loop.
    pub fn start(
        pipeline: Arc<ScanPipeline>,
        source: Arc<dyn NotificationSource>,
        settings: WorkerSettings,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(Self::run(pipeline, source, settings, shutdown_rx));
        Self {
            shutdown_tx,
            handle,
        }
    }

    async fn run(
        pipeline: Arc<ScanPipeline>,
        source: Arc<dyn NotificationSource>,
        settings: WorkerSettings,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        let permits = permit_count(settings.max_concurrency);
        let max_concurrency = permits as usize;
        tracing::info!(
            source = source.name(),
            max_concurrency,
            "Scan worker started"
        );

        let semaphore = Arc::new(Semaphore::new(max_concurrency));

        loop {
            let deliveries = tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Scan worker shutting down");
                    break;
                }
                received = source.receive() => received,
            };

            match deliveries {
                Ok(deliveries) => {
                    for delivery in deliveries {
                        let permit = match semaphore.clone().acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => break,
                        };
                        let pipeline = pipeline.clone();
                        let source = source.clone();
                        tokio::spawn(async move {
                            let _permit = permit;
                            Self::handle_delivery(&pipeline, source.as_ref(), delivery).await;
                        });
                    }
                }
                Err(NotificationError::Closed) => {
                    tracing::info!(source = source.name(), "Notification source closed");
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        backoff_secs = settings.receive_backoff.as_secs_f64(),
                        "Failed to receive notifications, backing off"
                    );
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(settings.receive_backoff) => {}
                    }
                }
            }
        }

        // Every permit back means every dispatched job has finished.
        if semaphore
            .acquire_many(permits)
            .await
            .is_ok()
        {
            tracing::info!("Scan worker stopped");
        }
    }

    async fn handle_delivery(
        pipeline: &ScanPipeline,
        source: &dyn NotificationSource,
        delivery: Delivery,
    ) {
        let outcomes = pipeline.process_batch(&delivery.notifications).await;
        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, ProcessOutcome::Failed(_)))
            .count();

        tracing::debug!(
            delivery_id = %delivery.id,
            notifications = outcomes.len(),
            failed,
            "Delivery processed"
        );

        if let Err(e) = source.acknowledge(&delivery).await {
            tracing::error!(error = %e, delivery_id = %delivery.id, "Failed to acknowledge delivery");
        }
    }

    /// Stop receiving new notifications. Returns immediately.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating scan worker shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }

    /// Wait for the receive loop and all dispatched jobs to finish.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Scan worker task panicked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permit_count_is_clamped() {
        assert_eq!(permit_count(0), 1);
        assert_eq!(permit_count(4), 4);
        assert!(permit_count(usize::MAX) as usize <= Semaphore::MAX_PERMITS);
        assert_eq!(permit_count(1 << 20), 1 << 20);
    }
}
