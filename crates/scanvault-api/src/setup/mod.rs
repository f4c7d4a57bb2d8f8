//! Application setup and initialization

pub mod routes;
pub mod server;

use crate::constants::INLINE_QUEUE_CAPACITY;
use crate::state::AppState;
use anyhow::{Context, Result};
use axum::Router;
use scanvault_core::Config;
use scanvault_db::create_ledger;
use scanvault_storage::create_storage;
use scanvault_worker::{
    ChannelNotificationSource, ScanPipeline, ScanWorker, WorkerContext, WorkerSettings,
};
use std::sync::Arc;
use std::time::Duration;

pub struct App {
    pub state: Arc<AppState>,
    pub router: Router,
    /// Present when `INLINE_WORKER=true`.
    pub worker: Option<ScanWorker>,
}

/// Build the ledger, raw store, optional inline worker and router.
///
/// Tracing must already be initialized.
pub async fn initialize_app(config: Config) -> Result<App> {
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        environment = %config.environment(),
        ledger_backend = %config.ledger_backend(),
        storage_backend = %config.storage_backend(),
        "Initializing ScanVault API"
    );

    let ledger = create_ledger(&config).await?;
    let storage = create_storage(&config).await?;

    let mut state = AppState::new(config.clone(), ledger.clone(), storage.clone());

    let worker = if config.inline_worker() {
        let context = WorkerContext::with_ledger_and_storage(&config, ledger, storage).await?;
        let max_concurrency = config.worker_max_concurrency();
        let (notifier, source) =
            ChannelNotificationSource::channel(INLINE_QUEUE_CAPACITY, max_concurrency);
        state = state.with_notifier(notifier);

        Some(ScanWorker::start(
            Arc::new(ScanPipeline::new(&context)),
            Arc::new(source),
            WorkerSettings {
                max_concurrency,
                receive_backoff: Duration::from_secs(1),
            },
        ))
    } else {
        None
    };

    let state = Arc::new(state);
    let router = routes::setup_routes(&config, state.clone())?;

    Ok(App {
        state,
        router,
        worker,
    })
}
