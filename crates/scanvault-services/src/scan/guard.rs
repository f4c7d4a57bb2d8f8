use scanvault_core::{PipelineError, ScanRecord};
use scanvault_db::ScanLedger;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// No terminal verdict yet; carries the current record if one exists.
    Proceed(Option<ScanRecord>),
    /// The latest record already holds a final verdict.
    AlreadyTerminal(ScanRecord),
}

/// Re-trigger guard, evaluated before any mutation for a notification.
#[derive(Clone)]
pub struct IdempotencyGuard {
    ledger: Arc<dyn ScanLedger>,
}

impl IdempotencyGuard {
    pub fn new(ledger: Arc<dyn ScanLedger>) -> Self {
        Self { ledger }
    }

    #[tracing::instrument(skip(self))]
    pub async fn check(&self, object_id: &str) -> Result<GuardDecision, PipelineError> {
        let current = self
            .ledger
            .latest(object_id)
            .await
            .map_err(|e| PipelineError::LedgerFailure(e.to_string()))?;

        match current {
            Some(record) if record.status.is_terminal() => {
                tracing::debug!(status = %record.status, "Record already terminal");
                Ok(GuardDecision::AlreadyTerminal(record))
            }
            other => Ok(GuardDecision::Proceed(other)),
        }
    }
}
