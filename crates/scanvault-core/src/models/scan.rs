use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

/// Scan disposition of an uploaded object.
///
/// `Pending -> Scanning -> {Clean, Infected, Error}`. The three end states
/// are absorbing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScanStatus {
    Pending,
    Scanning,
    Clean,
    Infected,
    Error,
}

impl ScanStatus {
    pub const ALL: [ScanStatus; 5] = [
        ScanStatus::Pending,
        ScanStatus::Scanning,
        ScanStatus::Clean,
        ScanStatus::Infected,
        ScanStatus::Error,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Clean | ScanStatus::Infected | ScanStatus::Error
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    ///
    /// Self transitions are rejected, which is what makes the SCANNING claim
    /// exclusive between concurrent workers. A verdict can only follow a
    /// SCANNING claim; PENDING goes straight to ERROR only when intake fails.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        match self {
            ScanStatus::Pending => matches!(next, ScanStatus::Scanning | ScanStatus::Error),
            ScanStatus::Scanning => next.is_terminal(),
            ScanStatus::Clean | ScanStatus::Infected | ScanStatus::Error => false,
        }
    }

    /// Statuses from which `next` may be reached.
    pub fn allowed_predecessors(next: ScanStatus) -> Vec<ScanStatus> {
        Self::ALL
            .into_iter()
            .filter(|prior| prior.can_transition_to(next))
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Pending => "PENDING",
            ScanStatus::Scanning => "SCANNING",
            ScanStatus::Clean => "CLEAN",
            ScanStatus::Infected => "INFECTED",
            ScanStatus::Error => "ERROR",
        }
    }
}

impl Display for ScanStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ScanStatus::Pending),
            "SCANNING" => Ok(ScanStatus::Scanning),
            "CLEAN" => Ok(ScanStatus::Clean),
            "INFECTED" => Ok(ScanStatus::Infected),
            "ERROR" => Ok(ScanStatus::Error),
            _ => Err(anyhow::anyhow!("Invalid scan status: {}", s)),
        }
    }
}

/// One entry of a record's append-only audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct EventLogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl EventLogEntry {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }
}

/// Points at the bytes of a stored object.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
pub struct StorageLocator {
    pub container: String,
    pub key: String,
}

impl StorageLocator {
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }
}

impl Display for StorageLocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.container, self.key)
    }
}

/// Address of a single ledger revision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub object_id: String,
    pub revision_timestamp: DateTime<Utc>,
}

impl RecordKey {
    pub fn new(object_id: impl Into<String>, revision_timestamp: DateTime<Utc>) -> Self {
        Self {
            object_id: object_id.into(),
            revision_timestamp,
        }
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{}@{}",
            self.object_id,
            self.revision_timestamp.to_rfc3339()
        )
    }
}

/// One physical revision of an object's scan record.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ScanRecord {
    pub object_id: String,
    pub revision_timestamp: DateTime<Utc>,
    pub status: ScanStatus,
    pub detail: String,
    pub event_log: Vec<EventLogEntry>,
    pub storage_locator: StorageLocator,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScanRecord {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.object_id.clone(), self.revision_timestamp)
    }

    /// Original file name, taken from the last segment of the storage key.
    pub fn original_filename(&self) -> Option<&str> {
        self.storage_locator
            .key
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
    }
}

/// Fields written by `ScanLedger::append`.
///
/// A revision created by `append` always starts as PENDING and requires a
/// `storage_locator`. Appending to an existing revision only concatenates
/// `events`; `detail` and `storage_locator` are filled in when given.
#[derive(Debug, Clone, Default)]
pub struct LedgerFields {
    pub detail: Option<String>,
    pub storage_locator: Option<StorageLocator>,
    pub events: Vec<EventLogEntry>,
}

impl LedgerFields {
    pub fn pending(storage_locator: StorageLocator, event: impl Into<String>) -> Self {
        Self {
            detail: Some("awaiting scan".to_string()),
            storage_locator: Some(storage_locator),
            events: vec![EventLogEntry::new(event)],
        }
    }

    pub fn events(events: Vec<EventLogEntry>) -> Self {
        Self {
            events,
            ..Default::default()
        }
    }
}

/// Timestamp for a new revision, truncated to the microsecond precision the
/// Postgres ledger stores.
pub fn revision_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
