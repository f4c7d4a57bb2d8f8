//! Status ledger: versioned scan records keyed by object identity.
//!
//! Every implementation follows the same read rule: the current record of an
//! object is the revision with the greatest `revision_timestamp`. Writes are
//! additive; `event_log` entries are only ever concatenated.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scanvault_core::{EventLogEntry, LedgerFields, RecordKey, ScanRecord, ScanStatus};
use thiserror::Error;

pub use memory::InMemoryScanLedger;
pub use postgres::PgScanLedger;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("scan record not found: {0}")]
    NotFound(String),

    #[error("invalid status transition for {key}: {current} -> {requested}")]
    InvalidTransition {
        key: String,
        current: ScanStatus,
        requested: ScanStatus,
    },

    #[error("cannot create revision {key} without {field}")]
    MissingField { key: String, field: &'static str },

    /// The indexed read path cannot serve this ledger; callers fall back to a scan.
    #[error("ledger index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("corrupt ledger row: {0}")]
    Decode(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl LedgerError {
    /// Losing a conditional write race is expected under concurrent delivery.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, LedgerError::InvalidTransition { .. })
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Versioned status record store.
#[async_trait]
pub trait ScanLedger: Send + Sync {
    /// Create the revision `(object_id, revision_timestamp)` or append to it.
    ///
    /// A new revision starts as PENDING and needs `fields.storage_locator`.
    /// On an existing revision the events are concatenated after the ones
    /// already recorded and the status is left untouched.
    async fn append(
        &self,
        object_id: &str,
        revision_timestamp: DateTime<Utc>,
        fields: LedgerFields,
    ) -> LedgerResult<ScanRecord>;

    /// Revision with the greatest `revision_timestamp` for `object_id`.
    async fn latest(&self, object_id: &str) -> LedgerResult<Option<ScanRecord>>;

    /// Conditionally move a revision to `status`.
    ///
    /// Sets `status`, `detail` and `updated_at` and appends `extra_events` in
    /// one atomic step, but only if the stored status may transition to
    /// `status`. Otherwise nothing is written and
    /// `LedgerError::InvalidTransition` is returned.
    async fn update_status(
        &self,
        key: &RecordKey,
        status: ScanStatus,
        detail: &str,
        extra_events: Vec<EventLogEntry>,
    ) -> LedgerResult<ScanRecord>;
}

/// Pick the current record out of an unordered set of revisions.
pub(crate) fn newest<I>(revisions: I) -> Option<ScanRecord>
where
    I: IntoIterator<Item = ScanRecord>,
{
    revisions
        .into_iter()
        .max_by_key(|record| record.revision_timestamp)
}
