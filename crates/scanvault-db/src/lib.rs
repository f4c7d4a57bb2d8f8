//! ScanVault database layer: connection setup and the status ledger.

pub mod factory;
pub mod ledger;
pub mod pool;

pub use factory::create_ledger;
pub use ledger::{InMemoryScanLedger, LedgerError, LedgerResult, PgScanLedger, ScanLedger};
pub use pool::setup_database;
