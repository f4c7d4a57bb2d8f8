use super::{newest, LedgerError, LedgerResult, ScanLedger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scanvault_core::{EventLogEntry, LedgerFields, RecordKey, ScanRecord, ScanStatus};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct Table {
    rows: Vec<ScanRecord>,
    /// object_id -> revision_timestamp -> position in `rows`
    index: Option<HashMap<String, BTreeMap<DateTime<Utc>, usize>>>,
}

impl Table {
    fn position(&self, object_id: &str, revision_timestamp: DateTime<Utc>) -> Option<usize> {
        match &self.index {
            Some(index) => index
                .get(object_id)
                .and_then(|revisions| revisions.get(&revision_timestamp))
                .copied(),
            None => self.rows.iter().position(|row| {
                row.object_id == object_id && row.revision_timestamp == revision_timestamp
            }),
        }
    }

    fn insert(&mut self, record: ScanRecord) -> usize {
        let position = self.rows.len();
        if let Some(index) = self.index.as_mut() {
            index
                .entry(record.object_id.clone())
                .or_default()
                .insert(record.revision_timestamp, position);
        }
        self.rows.push(record);
        position
    }
}

/// Process-local ledger.
///
/// `new()` keeps a per-object index ordered by revision timestamp, so
/// `latest` is served by the indexed path. `unindexed()` keeps only a flat row
/// list and every `latest` call goes through the filtering scan, which is how
/// a ledger without the expected index behaves.
pub struct InMemoryScanLedger {
    table: RwLock<Table>,
}

impl InMemoryScanLedger {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table {
                rows: Vec::new(),
                index: Some(HashMap::new()),
            }),
        }
    }

    pub fn unindexed() -> Self {
        Self {
            table: RwLock::new(Table::default()),
        }
    }

    /// All revisions of `object_id`, oldest first.
    pub async fn revisions(&self, object_id: &str) -> Vec<ScanRecord> {
        let table = self.table.read().await;
        let mut revisions: Vec<ScanRecord> = table
            .rows
            .iter()
            .filter(|row| row.object_id == object_id)
            .cloned()
            .collect();
        revisions.sort_by_key(|row| row.revision_timestamp);
        revisions
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.rows.is_empty()
    }

    async fn latest_indexed(&self, object_id: &str) -> LedgerResult<Option<ScanRecord>> {
        let table = self.table.read().await;
        let index = table.index.as_ref().ok_or_else(|| {
            LedgerError::IndexUnavailable("in-memory ledger built without an index".to_string())
        })?;

        Ok(index
            .get(object_id)
            .and_then(|revisions| revisions.last_key_value())
            .map(|(_, position)| table.rows[*position].clone()))
    }

    async fn latest_by_scan(&self, object_id: &str) -> Option<ScanRecord> {
        let table = self.table.read().await;
        newest(
            table
                .rows
                .iter()
                .filter(|row| row.object_id == object_id)
                .cloned(),
        )
    }
}

impl Default for InMemoryScanLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScanLedger for InMemoryScanLedger {
    async fn append(
        &self,
        object_id: &str,
        revision_timestamp: DateTime<Utc>,
        fields: LedgerFields,
    ) -> LedgerResult<ScanRecord> {
        let mut table = self.table.write().await;
        let now = Utc::now();

        if let Some(position) = table.position(object_id, revision_timestamp) {
            let row = &mut table.rows[position];
            row.event_log.extend(fields.events);
            if let Some(detail) = fields.detail {
                row.detail = detail;
            }
            if let Some(locator) = fields.storage_locator {
                row.storage_locator = locator;
            }
            row.updated_at = now;
            return Ok(row.clone());
        }

        let storage_locator = fields.storage_locator.ok_or_else(|| LedgerError::MissingField {
            key: RecordKey::new(object_id, revision_timestamp).to_string(),
            field: "storage_locator",
        })?;

        let record = ScanRecord {
            object_id: object_id.to_string(),
            revision_timestamp,
            status: ScanStatus::Pending,
            detail: fields.detail.unwrap_or_default(),
            event_log: fields.events,
            storage_locator,
            created_at: now,
            updated_at: now,
        };
        table.insert(record.clone());

        tracing::debug!(
            object_id = %object_id,
            revision_timestamp = %revision_timestamp.to_rfc3339(),
            "Created ledger revision"
        );

        Ok(record)
    }

    async fn latest(&self, object_id: &str) -> LedgerResult<Option<ScanRecord>> {
        match self.latest_indexed(object_id).await {
            Err(LedgerError::IndexUnavailable(reason)) => {
                tracing::warn!(
                    object_id = %object_id,
                    reason = %reason,
                    "Indexed lookup unavailable, scanning all ledger rows"
                );
                Ok(self.latest_by_scan(object_id).await)
            }
            other => other,
        }
    }

    async fn update_status(
        &self,
        key: &RecordKey,
        status: ScanStatus,
        detail: &str,
        extra_events: Vec<EventLogEntry>,
    ) -> LedgerResult<ScanRecord> {
        let mut table = self.table.write().await;
        let position = table
            .position(&key.object_id, key.revision_timestamp)
            .ok_or_else(|| LedgerError::NotFound(key.to_string()))?;

        let row = &mut table.rows[position];
        if !row.status.can_transition_to(status) {
            return Err(LedgerError::InvalidTransition {
                key: key.to_string(),
                current: row.status,
                requested: status,
            });
        }

        row.status = status;
        row.detail = detail.to_string();
        row.event_log.extend(extra_events);
        row.updated_at = Utc::now();

        Ok(row.clone())
    }
}
