use anyhow::Context;
use scanvault_core::{Config, NotificationSourceKind};
use scanvault_worker::{
    init_tracing, shutdown_signal, NotificationSource, ScanPipeline, ScanWorker, WorkerContext,
    WorkerSettings,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;
    init_tracing(config.log_format())?;
    config.validate().context("Invalid configuration")?;

    let context = WorkerContext::from_config(&config).await?;
    let source = create_source(&config).await?;

    let worker = ScanWorker::start(
        Arc::new(ScanPipeline::new(&context)),
        source,
        WorkerSettings {
            max_concurrency: config.worker_max_concurrency(),
            receive_backoff: Duration::from_secs(5),
        },
    );

    shutdown_signal().await;
    worker.shutdown().await;
    worker.join().await;

    Ok(())
}

#[cfg(feature = "source-sqs")]
async fn create_source(config: &Config) -> anyhow::Result<Arc<dyn NotificationSource>> {
    match config.notification_source() {
        NotificationSourceKind::Sqs => Ok(Arc::new(
            scanvault_worker::SqsNotificationSource::from_config(config).await?,
        )),
        NotificationSourceKind::Inline => Err(anyhow::anyhow!(
            "NOTIFICATION_SOURCE=inline runs inside the API process (INLINE_WORKER=true)"
        )),
    }
}

#[cfg(not(feature = "source-sqs"))]
async fn create_source(config: &Config) -> anyhow::Result<Arc<dyn NotificationSource>> {
    Err(anyhow::anyhow!(
        "notification source {:?} not available (source-sqs feature not enabled)",
        config.notification_source()
    ))
}
