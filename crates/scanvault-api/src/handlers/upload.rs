use crate::constants::UPLOAD_FIELD;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;
use crate::validation::{validate_extension, validate_filename};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use scanvault_core::{
    revision_now, upload_key, AppError, EventLogEntry, LedgerFields, ScanStatus,
    StorageLocator, StorageNotification,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadResponse {
    pub file_id: String,
    pub message: String,
}

struct ReceivedFile {
    filename: String,
    content_type: String,
    data: Vec<u8>,
}

/// Read the `file` field, enforcing the upload size limit while streaming.
async fn read_upload(
    multipart: &mut Multipart,
    max_size: usize,
    allowed_extensions: &[String],
) -> Result<ReceivedFile, HttpAppError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let filename = validate_filename(field.file_name())?;
        validate_extension(&filename, allowed_extensions)?;
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let mut data = Vec::new();
        while let Some(chunk) = field.chunk().await? {
            if data.len() + chunk.len() > max_size {
                return Err(AppError::PayloadTooLarge(format!(
                    "File exceeds the maximum upload size of {} bytes",
                    max_size
                ))
                .into());
            }
            data.extend_from_slice(&chunk);
        }

        if data.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".to_string()).into());
        }

        return Ok(ReceivedFile {
            filename,
            content_type,
            data,
        });
    }

    Err(AppError::BadRequest(format!("Missing multipart field '{}'", UPLOAD_FIELD)).into())
}

#[utoipa::path(
    post,
    path = "/api/upload",
    tag = "files",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "File accepted and queued for scanning", body = UploadResponse),
        (status = 400, description = "Missing file, bad filename, empty file or unsupported extension", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Storage or ledger failure", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let file = read_upload(
        &mut multipart,
        state.config.max_upload_size_bytes(),
        state.config.allowed_extensions(),
    )
    .await?;

    let file_id = Uuid::new_v4().to_string();
    let key = upload_key(&file_id, &file.filename);
    let locator = StorageLocator::new(state.storage.container(), key.clone());
    let size = file.data.len();

    // PENDING first: the object-created event can reach a worker before this
    // handler resumes.
    let pending = state
        .ledger
        .append(
            &file_id,
            revision_now(),
            LedgerFields::pending(locator.clone(), "upload received"),
        )
        .await?;

    if let Err(e) = state
        .storage
        .upload_with_key(&key, file.data, &file.content_type)
        .await
    {
        let detail = format!("upload failed: {}", e);
        if let Err(ledger_err) = state
            .ledger
            .update_status(
                &pending.key(),
                ScanStatus::Error,
                &detail,
                vec![EventLogEntry::new(detail.clone())],
            )
            .await
        {
            tracing::error!(
                error = %ledger_err,
                file_id = %file_id,
                "Failed to record upload failure"
            );
        }
        return Err(e.into());
    }

    tracing::info!(
        file_id = %file_id,
        filename = %file.filename,
        size,
        container = %locator.container,
        "File accepted for scanning"
    );

    if let Some(notifier) = &state.notifier {
        let notification = StorageNotification::new(locator.container, locator.key);
        if let Err(e) = notifier.send(notification).await {
            tracing::error!(error = %e, file_id = %file_id, "Inline worker is not accepting notifications");
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            file_id,
            message: format!("{} uploaded and queued for scanning", file.filename),
        }),
    ))
}
