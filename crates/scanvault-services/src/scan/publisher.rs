use scanvault_core::{EventLogEntry, LedgerFields, PipelineError, ScanRecord, ScanStatus, StorageLocator};
use scanvault_db::ScanLedger;
use scanvault_storage::Storage;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Promoted(StorageLocator),
    /// No trusted store is configured.
    Skipped,
    /// Copy failed; the CLEAN verdict stands.
    Failed(String),
    /// The record is not CLEAN.
    NotApplicable,
}

/// Copies CLEAN objects from the raw store into the trusted store.
#[derive(Clone)]
pub struct ResultPublisher {
    ledger: Arc<dyn ScanLedger>,
    source: Arc<dyn Storage>,
    trusted: Option<Arc<dyn Storage>>,
}

impl ResultPublisher {
    pub fn new(
        ledger: Arc<dyn ScanLedger>,
        source: Arc<dyn Storage>,
        trusted: Option<Arc<dyn Storage>>,
    ) -> Self {
        Self {
            ledger,
            source,
            trusted,
        }
    }

    /// Promote `record` and note the result in its event log.
    ///
    /// Never changes the recorded status.
    #[tracing::instrument(skip(self, record), fields(object_id = %record.object_id, key = %record.storage_locator.key))]
    pub async fn publish(&self, record: &ScanRecord) -> PublishOutcome {
        if record.status != ScanStatus::Clean {
            return PublishOutcome::NotApplicable;
        }

        let Some(trusted) = &self.trusted else {
            tracing::info!("No trusted store configured, promotion skipped");
            return PublishOutcome::Skipped;
        };

        let key = &record.storage_locator.key;
        let (outcome, message) = match self.source.copy_to(key, trusted.as_ref()).await {
            Ok(locator) => {
                tracing::info!(destination = %locator, "Object promoted to trusted store");
                let message = format!("promoted to trusted store {}", locator);
                (PublishOutcome::Promoted(locator), message)
            }
            Err(e) => {
                let err = PipelineError::PublishFailure(e.to_string());
                tracing::warn!(error = %err, kind = err.kind(), "Promotion failed, verdict unchanged");
                (
                    PublishOutcome::Failed(e.to_string()),
                    format!("promotion ERROR: {}", e),
                )
            }
        };

        if let Err(e) = self
            .ledger
            .append(
                &record.object_id,
                record.revision_timestamp,
                LedgerFields::events(vec![EventLogEntry::new(message)]),
            )
            .await
        {
            let err = PipelineError::LedgerWriteFailure(e.to_string());
            tracing::error!(error = %err, kind = err.kind(), "Failed to record promotion result");
        }

        outcome
    }
}
