use scanvault_core::Config;
use scanvault_db::ScanLedger;
use scanvault_storage::Storage;
use scanvault_worker::NotificationSender;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub ledger: Arc<dyn ScanLedger>,
    /// Raw intake store.
    pub storage: Arc<dyn Storage>,
    /// Feeds the inline worker, when one runs in this process.
    pub notifier: Option<NotificationSender>,
}

impl AppState {
    pub fn new(config: Config, ledger: Arc<dyn ScanLedger>, storage: Arc<dyn Storage>) -> Self {
        Self {
            config,
            ledger,
            storage,
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: NotificationSender) -> Self {
        self.notifier = Some(notifier);
        self
    }
}
