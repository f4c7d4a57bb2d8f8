//! Process-wide worker context.
//!
//! Built once per worker lifetime and shared by every job. Nothing here is
//! mutated after construction.

use anyhow::Result;
use scanvault_core::Config;
use scanvault_db::{create_ledger, ScanLedger};
use scanvault_services::{create_engine, ExecutorSettings, ScanEngine};
use scanvault_storage::{create_storage, create_trusted_storage, Storage};
use std::sync::Arc;

#[derive(Clone)]
pub struct WorkerContext {
    pub ledger: Arc<dyn ScanLedger>,
    pub raw_storage: Arc<dyn Storage>,
    pub trusted_storage: Option<Arc<dyn Storage>>,
    pub engine: Arc<dyn ScanEngine>,
    pub settings: ExecutorSettings,
}

impl WorkerContext {
    pub fn new(
        ledger: Arc<dyn ScanLedger>,
        raw_storage: Arc<dyn Storage>,
        trusted_storage: Option<Arc<dyn Storage>>,
        engine: Arc<dyn ScanEngine>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            ledger,
            raw_storage,
            trusted_storage,
            engine,
            settings,
        }
    }

    /// Build every collaborator from configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let ledger = create_ledger(config).await?;
        let raw_storage = create_storage(config).await?;
        Self::with_ledger_and_storage(config, ledger, raw_storage).await
    }

    /// Build the remaining collaborators around an existing ledger and raw store.
    ///
    /// The API uses this to share its own ledger and store with an inline worker.
    pub async fn with_ledger_and_storage(
        config: &Config,
        ledger: Arc<dyn ScanLedger>,
        raw_storage: Arc<dyn Storage>,
    ) -> Result<Self> {
        let trusted_storage = create_trusted_storage(config).await?;
        let engine = create_engine(config)?;

        tracing::info!(
            ledger_backend = %config.ledger_backend(),
            raw_container = %raw_storage.container(),
            trusted_container = trusted_storage.as_ref().map(|s| s.container()).unwrap_or("none"),
            engine = engine.name(),
            "Worker context initialized"
        );

        Ok(Self::new(
            ledger,
            raw_storage,
            trusted_storage,
            engine,
            ExecutorSettings::from_config(config),
        ))
    }
}
