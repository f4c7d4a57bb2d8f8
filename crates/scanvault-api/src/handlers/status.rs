use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use scanvault_core::{AppError, EventLogEntry, ScanRecord, ScanStatus, StorageLocator};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct FileStatusResponse {
    pub file_id: String,
    pub scan_status: ScanStatus,
    pub detail: String,
    pub original_filename: Option<String>,
    pub event_log: Vec<EventLogEntry>,
    pub storage_locator: StorageLocator,
    pub revision_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When this response was produced.
    pub last_checked: DateTime<Utc>,
}

impl From<ScanRecord> for FileStatusResponse {
    fn from(record: ScanRecord) -> Self {
        Self {
            original_filename: record.original_filename().map(String::from),
            file_id: record.object_id,
            scan_status: record.status,
            detail: record.detail,
            event_log: record.event_log,
            storage_locator: record.storage_locator,
            revision_timestamp: record.revision_timestamp,
            created_at: record.created_at,
            updated_at: record.updated_at,
            last_checked: Utc::now(),
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/file-status/{file_id}",
    tag = "files",
    params(
        ("file_id" = String, Path, description = "Identifier returned by the upload endpoint")
    ),
    responses(
        (status = 200, description = "Latest scan record", body = FileStatusResponse),
        (status = 404, description = "No record for this file", body = ErrorResponse),
        (status = 500, description = "Ledger failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_file_status(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<FileStatusResponse>, HttpAppError> {
    let record = state
        .ledger
        .latest(&file_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("File {} not found", file_id)))?;

    Ok(Json(record.into()))
}
