//! Postgres ledger backed by the `scan_records` table.

use super::{newest, LedgerError, LedgerResult, ScanLedger};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scanvault_core::{
    EventLogEntry, LedgerFields, RecordKey, ScanRecord, ScanStatus, StorageLocator,
};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};

const RECORD_COLUMNS: &str = "object_id, revision_timestamp, status, detail, event_log, \
     storage_container, storage_key, created_at, updated_at";

/// SQLSTATEs meaning the table does not have the shape the indexed query expects.
const SCHEMA_MISMATCH_CODES: &[&str] = &[
    "42P01", // undefined_table
    "42703", // undefined_column
    "42883", // undefined_function
    "42804", // datatype_mismatch
    "42P10", // invalid_column_reference
];

/// Row type for scan_records table (for FromRow).
#[derive(Debug, sqlx::FromRow)]
pub struct ScanRecordRow {
    pub object_id: String,
    pub revision_timestamp: DateTime<Utc>,
    pub status: String,
    pub detail: String,
    pub event_log: Json<Vec<EventLogEntry>>,
    pub storage_container: String,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScanRecordRow {
    pub fn to_scan_record(self) -> LedgerResult<ScanRecord> {
        let status = self
            .status
            .parse::<ScanStatus>()
            .map_err(|e| LedgerError::Decode(e.to_string()))?;
        Ok(ScanRecord {
            object_id: self.object_id,
            revision_timestamp: self.revision_timestamp,
            status,
            detail: self.detail,
            event_log: self.event_log.0,
            storage_locator: StorageLocator::new(self.storage_container, self.storage_key),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Text projection of a row, readable from both the current table and
/// legacy tables that kept timestamps as ISO-8601 strings.
#[derive(Debug, sqlx::FromRow)]
pub struct LegacyScanRecordRow {
    pub object_id: String,
    pub revision_timestamp: String,
    pub status: String,
    pub detail: Option<String>,
    pub event_log: Option<String>,
    pub storage_container: Option<String>,
    pub storage_key: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl LegacyScanRecordRow {
    pub fn to_scan_record(self) -> LedgerResult<ScanRecord> {
        let revision_timestamp = parse_ledger_timestamp(&self.revision_timestamp).ok_or_else(|| {
            LedgerError::Decode(format!(
                "unreadable revision_timestamp {:?}",
                self.revision_timestamp
            ))
        })?;
        let status = self
            .status
            .parse::<ScanStatus>()
            .map_err(|e| LedgerError::Decode(e.to_string()))?;
        let event_log = match self.event_log.as_deref() {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(raw)
                .map_err(|e| LedgerError::Decode(format!("event_log: {}", e)))?,
            _ => Vec::new(),
        };
        let created_at = self
            .created_at
            .as_deref()
            .and_then(parse_ledger_timestamp)
            .unwrap_or(revision_timestamp);
        let updated_at = self
            .updated_at
            .as_deref()
            .and_then(parse_ledger_timestamp)
            .unwrap_or(created_at);

        Ok(ScanRecord {
            object_id: self.object_id,
            revision_timestamp,
            status,
            detail: self.detail.unwrap_or_default(),
            event_log,
            storage_locator: StorageLocator::new(
                self.storage_container.unwrap_or_default(),
                self.storage_key.unwrap_or_default(),
            ),
            created_at,
            updated_at,
        })
    }
}

/// Parse RFC 3339 strings and Postgres' `timestamptz::text` rendering.
pub fn parse_ledger_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z"))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

pub fn is_schema_mismatch_code(code: &str) -> bool {
    SCHEMA_MISMATCH_CODES.contains(&code)
}

/// Whether `err` means the indexed query does not fit the table's schema.
pub fn is_schema_mismatch(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .map(|code| is_schema_mismatch_code(&code))
            .unwrap_or(false),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => true,
        _ => false,
    }
}

/// Ledger stored in Postgres.
#[derive(Clone)]
pub struct PgScanLedger {
    pool: PgPool,
}

impl PgScanLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Primary key lookup, newest revision first.
    #[tracing::instrument(skip(self), fields(db.table = "scan_records"))]
    async fn latest_indexed(&self, object_id: &str) -> LedgerResult<Option<ScanRecord>> {
        let query = format!(
            "SELECT {} FROM scan_records WHERE object_id = $1 \
             ORDER BY revision_timestamp DESC LIMIT 1",
            RECORD_COLUMNS
        );
        let row: Option<ScanRecordRow> = sqlx::query_as::<Postgres, ScanRecordRow>(&query)
            .bind(object_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_schema_mismatch(&e) {
                    LedgerError::IndexUnavailable(e.to_string())
                } else {
                    LedgerError::Database(e)
                }
            })?;
        row.map(ScanRecordRow::to_scan_record).transpose()
    }

    /// Degraded path: read every revision of the object as text, order in process.
    #[tracing::instrument(skip(self), fields(db.table = "scan_records"))]
    async fn latest_by_scan(&self, object_id: &str) -> LedgerResult<Option<ScanRecord>> {
        let rows: Vec<LegacyScanRecordRow> = sqlx::query_as::<Postgres, LegacyScanRecordRow>(
            r#"
            SELECT object_id,
                   revision_timestamp::text AS revision_timestamp,
                   status::text AS status,
                   detail::text AS detail,
                   event_log::text AS event_log,
                   storage_container::text AS storage_container,
                   storage_key::text AS storage_key,
                   created_at::text AS created_at,
                   updated_at::text AS updated_at
            FROM scan_records
            WHERE object_id = $1
            "#,
        )
        .bind(object_id)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            match row.to_scan_record() {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(
                    object_id = %object_id,
                    error = %e,
                    "Skipping unreadable ledger row"
                ),
            }
        }
        Ok(newest(records))
    }

    #[tracing::instrument(skip(self), fields(db.table = "scan_records"))]
    async fn current_status(&self, key: &RecordKey) -> LedgerResult<Option<ScanStatus>> {
        let status: Option<String> = sqlx::query_scalar::<Postgres, String>(
            "SELECT status FROM scan_records WHERE object_id = $1 AND revision_timestamp = $2",
        )
        .bind(&key.object_id)
        .bind(key.revision_timestamp)
        .fetch_optional(&self.pool)
        .await?;

        status
            .map(|s| s.parse::<ScanStatus>())
            .transpose()
            .map_err(|e| LedgerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ScanLedger for PgScanLedger {
    #[tracing::instrument(skip(self, fields), fields(db.table = "scan_records"))]
    async fn append(
        &self,
        object_id: &str,
        revision_timestamp: DateTime<Utc>,
        fields: LedgerFields,
    ) -> LedgerResult<ScanRecord> {
        let row: Option<ScanRecordRow> = match &fields.storage_locator {
            Some(locator) => {
                let query = format!(
                    r#"
                    INSERT INTO scan_records
                        (object_id, revision_timestamp, status, detail, event_log,
                         storage_container, storage_key, created_at, updated_at)
                    VALUES ($1, $2, 'PENDING', COALESCE($3, ''), $4, $5, $6, NOW(), NOW())
                    ON CONFLICT (object_id, revision_timestamp) DO UPDATE SET
                        event_log = scan_records.event_log || EXCLUDED.event_log,
                        detail = COALESCE($3, scan_records.detail),
                        storage_container = EXCLUDED.storage_container,
                        storage_key = EXCLUDED.storage_key,
                        updated_at = NOW()
                    RETURNING {}
                    "#,
                    RECORD_COLUMNS
                );
                sqlx::query_as::<Postgres, ScanRecordRow>(&query)
                    .bind(object_id)
                    .bind(revision_timestamp)
                    .bind(fields.detail.as_deref())
                    .bind(Json(&fields.events))
                    .bind(&locator.container)
                    .bind(&locator.key)
                    .fetch_optional(&self.pool)
                    .await?
            }
            None => {
                let query = format!(
                    r#"
                    UPDATE scan_records SET
                        event_log = event_log || $3,
                        detail = COALESCE($4, detail),
                        updated_at = NOW()
                    WHERE object_id = $1 AND revision_timestamp = $2
                    RETURNING {}
                    "#,
                    RECORD_COLUMNS
                );
                sqlx::query_as::<Postgres, ScanRecordRow>(&query)
                    .bind(object_id)
                    .bind(revision_timestamp)
                    .bind(Json(&fields.events))
                    .bind(fields.detail.as_deref())
                    .fetch_optional(&self.pool)
                    .await?
            }
        };

        let row = row.ok_or_else(|| LedgerError::MissingField {
            key: RecordKey::new(object_id, revision_timestamp).to_string(),
            field: "storage_locator",
        })?;
        row.to_scan_record()
    }

    async fn latest(&self, object_id: &str) -> LedgerResult<Option<ScanRecord>> {
        match self.latest_indexed(object_id).await {
            Err(LedgerError::IndexUnavailable(reason)) => {
                tracing::warn!(
                    object_id = %object_id,
                    reason = %reason,
                    "Indexed ledger lookup failed, falling back to filtered scan"
                );
                self.latest_by_scan(object_id).await
            }
            other => other,
        }
    }

    #[tracing::instrument(
        skip(self, detail, extra_events),
        fields(db.table = "scan_records", object_id = %key.object_id, status = %status)
    )]
    async fn update_status(
        &self,
        key: &RecordKey,
        status: ScanStatus,
        detail: &str,
        extra_events: Vec<EventLogEntry>,
    ) -> LedgerResult<ScanRecord> {
        let allowed_prior: Vec<String> = ScanStatus::allowed_predecessors(status)
            .iter()
            .map(|s| s.to_string())
            .collect();

        let query = format!(
            r#"
            UPDATE scan_records SET
                status = $3,
                detail = $4,
                event_log = event_log || $5,
                updated_at = NOW()
            WHERE object_id = $1
              AND revision_timestamp = $2
              AND status = ANY($6)
            RETURNING {}
            "#,
            RECORD_COLUMNS
        );
        let row: Option<ScanRecordRow> = sqlx::query_as::<Postgres, ScanRecordRow>(&query)
            .bind(&key.object_id)
            .bind(key.revision_timestamp)
            .bind(status.as_str())
            .bind(detail)
            .bind(Json(&extra_events))
            .bind(allowed_prior)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.to_scan_record(),
            None => match self.current_status(key).await? {
                Some(current) => Err(LedgerError::InvalidTransition {
                    key: key.to_string(),
                    current,
                    requested: status,
                }),
                None => Err(LedgerError::NotFound(key.to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_ledger_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(
            parse_ledger_timestamp("2024-05-01T12:30:00Z"),
            Some(expected)
        );
        assert_eq!(
            parse_ledger_timestamp("2024-05-01T14:30:00+02:00"),
            Some(expected)
        );
        assert_eq!(
            parse_ledger_timestamp("2024-05-01 12:30:00+00"),
            Some(expected)
        );
        assert_eq!(
            parse_ledger_timestamp("2024-05-01 12:30:00.250000+00").map(|t| t.timestamp_subsec_millis()),
            Some(250)
        );
        assert_eq!(parse_ledger_timestamp("yesterday"), None);
    }

    #[test]
    fn test_schema_mismatch_classification() {
        assert!(is_schema_mismatch(&sqlx::Error::ColumnNotFound(
            "revision_timestamp".to_string()
        )));
        assert!(!is_schema_mismatch(&sqlx::Error::PoolClosed));
        assert!(!is_schema_mismatch(&sqlx::Error::RowNotFound));

        for code in ["42P01", "42703", "42883", "42804", "42P10"] {
            assert!(is_schema_mismatch_code(code), "{code}");
        }
        // unique_violation and connection failures are real errors
        assert!(!is_schema_mismatch_code("23505"));
        assert!(!is_schema_mismatch_code("08006"));
    }

    #[test]
    fn test_legacy_row_decoding() {
        let row = LegacyScanRecordRow {
            object_id: "abc".to_string(),
            revision_timestamp: "2024-05-01T12:30:00Z".to_string(),
            status: "INFECTED".to_string(),
            detail: Some("threat detected: Eicar-Test-Signature FOUND".to_string()),
            event_log: Some(
                r#"[{"timestamp":"2024-05-01T12:30:01Z","message":"scan started"}]"#.to_string(),
            ),
            storage_container: Some("raw".to_string()),
            storage_key: Some("uploads/abc/x.zip".to_string()),
            created_at: None,
            updated_at: None,
        };
        let record = row.to_scan_record().unwrap();
        assert_eq!(record.status, ScanStatus::Infected);
        assert_eq!(record.event_log.len(), 1);
        assert_eq!(record.created_at, record.revision_timestamp);
        assert_eq!(record.original_filename(), Some("x.zip"));
    }

    #[test]
    fn test_legacy_row_with_bad_status_rejected() {
        let row = LegacyScanRecordRow {
            object_id: "abc".to_string(),
            revision_timestamp: "2024-05-01T12:30:00Z".to_string(),
            status: "QUARANTINED".to_string(),
            detail: None,
            event_log: None,
            storage_container: None,
            storage_key: None,
            created_at: None,
            updated_at: None,
        };
        assert!(matches!(row.to_scan_record(), Err(LedgerError::Decode(_))));
    }
}
