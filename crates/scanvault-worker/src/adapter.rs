//! Ingestion trigger adapter: turns a storage notification into a scan job.

use scanvault_core::{parse_upload_key, PipelineError, ScanJob, ScanRecord, StorageNotification};
use scanvault_services::{GuardDecision, IdempotencyGuard};
use std::borrow::Cow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterDecision {
    /// Hand the job to the executor along with the record the guard saw.
    Dispatch {
        job: ScanJob,
        current: Option<ScanRecord>,
    },
    /// The object already has a final verdict.
    Discard(ScanRecord),
}

/// Validates notifications and consults the guard. Never writes to the ledger.
#[derive(Clone)]
pub struct TriggerAdapter {
    raw_container: String,
    guard: IdempotencyGuard,
}

impl TriggerAdapter {
    pub fn new(raw_container: impl Into<String>, guard: IdempotencyGuard) -> Self {
        Self {
            raw_container: raw_container.into(),
            guard,
        }
    }

    pub async fn handle(
        &self,
        notification: &StorageNotification,
    ) -> Result<AdapterDecision, PipelineError> {
        if notification.container != self.raw_container {
            return Err(PipelineError::UnknownContainer {
                container: notification.container.clone(),
            });
        }

        let key = decode_key(&notification.key)?;
        let object_id = parse_upload_key(&key)?.object_id.to_string();

        match self.guard.check(&object_id).await? {
            GuardDecision::AlreadyTerminal(record) => Ok(AdapterDecision::Discard(record)),
            GuardDecision::Proceed(current) => Ok(AdapterDecision::Dispatch {
                job: ScanJob {
                    object_id,
                    container: notification.container.clone(),
                    key: key.into_owned(),
                },
                current,
            }),
        }
    }
}

/// Undo the form encoding S3 applies to keys in event notifications.
pub fn decode_key(raw: &str) -> Result<Cow<'_, str>, PipelineError> {
    if !raw.contains(['+', '%']) {
        return Ok(Cow::Borrowed(raw));
    }
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| Cow::Owned(decoded.into_owned()))
        .map_err(|_| PipelineError::MalformedKey(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanvault_core::{revision_now, LedgerFields, RecordKey, ScanStatus, StorageLocator};
    use scanvault_db::{InMemoryScanLedger, ScanLedger};
    use std::sync::Arc;

    fn adapter(ledger: Arc<InMemoryScanLedger>) -> TriggerAdapter {
        TriggerAdapter::new("raw", IdempotencyGuard::new(ledger))
    }

    #[test]
    fn test_decode_key() {
        assert_eq!(decode_key("uploads/a/report.pdf").unwrap(), "uploads/a/report.pdf");
        assert_eq!(
            decode_key("uploads/a/annual+report%282024%29.pdf").unwrap(),
            "uploads/a/annual report(2024).pdf"
        );
        assert_eq!(decode_key("uploads/a/r%C3%A9sum%C3%A9.pdf").unwrap(), "uploads/a/résumé.pdf");
        assert!(matches!(
            decode_key("uploads/a/%FF.pdf"),
            Err(PipelineError::MalformedKey(_))
        ));
    }

    #[tokio::test]
    async fn test_dispatches_job_for_new_object() {
        let adapter = adapter(Arc::new(InMemoryScanLedger::new()));
        let decision = adapter
            .handle(&StorageNotification::new("raw", "uploads/abc/my+file.pdf"))
            .await
            .unwrap();

        assert_eq!(
            decision,
            AdapterDecision::Dispatch {
                job: ScanJob {
                    object_id: "abc".to_string(),
                    container: "raw".to_string(),
                    key: "uploads/abc/my file.pdf".to_string(),
                },
                current: None,
            }
        );
    }

    #[tokio::test]
    async fn test_malformed_keys_are_rejected() {
        let adapter = adapter(Arc::new(InMemoryScanLedger::new()));
        for key in ["report.pdf", "uploads/abc", "other/abc/report.pdf", "uploads/abc/x/y.pdf"] {
            let err = adapter
                .handle(&StorageNotification::new("raw", key))
                .await
                .unwrap_err();
            assert!(matches!(err, PipelineError::MalformedKey(_)), "key {key}");
        }
    }

    #[tokio::test]
    async fn test_unknown_container_is_rejected() {
        let adapter = adapter(Arc::new(InMemoryScanLedger::new()));
        let err = adapter
            .handle(&StorageNotification::new("elsewhere", "uploads/abc/report.pdf"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            PipelineError::UnknownContainer {
                container: "elsewhere".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_terminal_record_is_discarded_without_writes() {
        let ledger = Arc::new(InMemoryScanLedger::new());
        let ts = revision_now();
        ledger
            .append(
                "abc",
                ts,
                LedgerFields::pending(StorageLocator::new("raw", "uploads/abc/r.pdf"), "upload received"),
            )
            .await
            .unwrap();
        let key = RecordKey::new("abc", ts);
        ledger
            .update_status(&key, ScanStatus::Scanning, "scan in progress", vec![])
            .await
            .unwrap();
        let clean = ledger
            .update_status(&key, ScanStatus::Clean, "no threats detected", vec![])
            .await
            .unwrap();

        let decision = adapter(ledger.clone())
            .handle(&StorageNotification::new("raw", "uploads/abc/r.pdf"))
            .await
            .unwrap();

        assert_eq!(decision, AdapterDecision::Discard(clean.clone()));
        assert_eq!(ledger.latest("abc").await.unwrap(), Some(clean));
    }
}
