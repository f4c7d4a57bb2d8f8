use crate::ledger::{InMemoryScanLedger, PgScanLedger, ScanLedger};
use crate::pool::setup_database;
use anyhow::Result;
use scanvault_core::{Config, LedgerBackend};
use std::sync::Arc;

/// Create the ledger selected by `LEDGER_BACKEND`.
pub async fn create_ledger(config: &Config) -> Result<Arc<dyn ScanLedger>> {
    match config.ledger_backend() {
        LedgerBackend::Postgres => {
            let pool = setup_database(config).await?;
            Ok(Arc::new(PgScanLedger::new(pool)))
        }
        LedgerBackend::Memory => {
            tracing::warn!("Using in-memory scan ledger; records are lost on restart");
            Ok(Arc::new(InMemoryScanLedger::new()))
        }
    }
}
