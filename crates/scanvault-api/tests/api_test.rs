//! Intake and status API integration tests.
//!
//! Run with: `cargo test -p scanvault-api --test api_test`

mod helpers;

use helpers::storage::{CleanEngine, EagerNotifyStorage, RejectingStorage};
use helpers::{
    api_path, base_vars, file_form, setup_test_app, setup_with_parts, setup_with_vars, upload,
};
use scanvault_core::{parse_upload_key, ScanStatus, StorageNotification};
use scanvault_db::{InMemoryScanLedger, ScanLedger};
use scanvault_services::ExecutorSettings;
use scanvault_storage::LocalStorage;
use scanvault_worker::{ProcessOutcome, ScanPipeline, WorkerContext};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_health() {
    let app = setup_test_app().await;
    let response = app.client().get(&api_path("/health")).await;

    assert_eq!(response.status_code(), 200);
    let json: serde_json::Value = response.json();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_ready_with_memory_ledger() {
    let app = setup_test_app().await;
    let response = app.client().get(&api_path("/ready")).await;

    assert_eq!(response.status_code(), 200);
    let json: serde_json::Value = response.json();
    assert_eq!(json["ledger"], "ready");
}

#[tokio::test]
async fn test_upload_writes_pending_record() {
    let app = setup_test_app().await;
    let client = app.client();

    let file_id = upload(client, "annual report.pdf", b"%PDF-1.7 test").await;
    assert!(uuid::Uuid::parse_str(&file_id).is_ok());

    let record = app.state.ledger.latest(&file_id).await.unwrap().unwrap();
    assert_eq!(record.status, ScanStatus::Pending);
    assert_eq!(record.storage_locator.container, "raw-uploads");
    assert_eq!(
        record.storage_locator.key,
        format!("uploads/{}/annual report.pdf", file_id)
    );
    assert_eq!(record.event_log[0].message, "upload received");

    let stored = app
        .state
        .storage
        .download(&record.storage_locator.key)
        .await
        .unwrap();
    assert_eq!(stored, b"%PDF-1.7 test");
}

#[tokio::test]
async fn test_file_status() {
    let app = setup_test_app().await;
    let client = app.client();

    let file_id = upload(client, "sheet.xlsx", b"cells").await;

    let response = client
        .get(&api_path(&format!("/file-status/{}", file_id)))
        .await;
    assert_eq!(response.status_code(), 200);

    let json: serde_json::Value = response.json();
    assert_eq!(json["file_id"], file_id.as_str());
    assert_eq!(json["scan_status"], "PENDING");
    assert_eq!(json["original_filename"], "sheet.xlsx");
    assert_eq!(json["event_log"][0]["message"], "upload received");
    assert!(json["last_checked"].is_string());
}

#[tokio::test]
async fn test_file_status_not_found() {
    let app = setup_test_app().await;
    let response = app
        .client()
        .get(&api_path("/file-status/00000000-0000-0000-0000-000000000000"))
        .await;

    assert_eq!(response.status_code(), 404);
    let json: serde_json::Value = response.json();
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_upload_rejects_unsupported_extension() {
    let app = setup_test_app().await;
    let response = app
        .client()
        .post(&api_path("/upload"))
        .multipart(file_form("setup.exe", b"MZ"))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_upload_rejects_empty_file() {
    let app = setup_test_app().await;
    let response = app
        .client()
        .post(&api_path("/upload"))
        .multipart(file_form("empty.pdf", b""))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_upload_rejects_missing_filename() {
    let app = setup_test_app().await;
    let response = app
        .client()
        .post(&api_path("/upload"))
        .multipart(file_form("", b"data"))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_upload_rejects_missing_field() {
    let app = setup_test_app().await;
    let form = axum_test::multipart::MultipartForm::new().add_text("note", "no file here");
    let response = app.client().post(&api_path("/upload")).multipart(form).await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_upload_rejects_oversized_file() {
    let app = setup_test_app().await;
    let body = vec![b'a'; 1024 * 1024 + 1];
    let response = app
        .client()
        .post(&api_path("/upload"))
        .multipart(file_form("big.zip", &body))
        .await;

    assert_eq!(response.status_code(), 413);
}

#[tokio::test]
async fn test_upload_forwards_to_inline_worker() {
    let dir = tempfile::tempdir().unwrap();
    let mut vars = base_vars(&dir);
    vars.insert("INLINE_WORKER".to_string(), "true".to_string());
    vars.insert("SCAN_ENGINE".to_string(), "clamscan".to_string());
    vars.insert(
        "CLAMSCAN_PATH".to_string(),
        dir.path().join("missing-clamscan").display().to_string(),
    );
    let app = setup_with_vars(dir, vars).await;
    assert!(app.worker.is_some());

    let file_id = upload(app.client(), "scan-me.pdf", b"payload").await;

    // The engine binary does not exist, so the scan ends in ERROR.
    let mut record = None;
    for _ in 0..50 {
        let latest = app.state.ledger.latest(&file_id).await.unwrap().unwrap();
        if latest.status.is_terminal() {
            record = Some(latest);
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let record = record.expect("inline worker did not finish the scan");
    assert_eq!(record.status, ScanStatus::Error);
    assert!(record.detail.contains("not found"), "{}", record.detail);
}

#[cfg(unix)]
#[tokio::test]
async fn test_inline_worker_marks_clean_file() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("clamscan");
    std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut vars = base_vars(&dir);
    vars.insert("INLINE_WORKER".to_string(), "true".to_string());
    vars.insert("SCAN_ENGINE".to_string(), "clamscan".to_string());
    vars.insert("CLAMSCAN_PATH".to_string(), script.display().to_string());
    let app = setup_with_vars(dir, vars).await;

    let file_id = upload(app.client(), "clean.docx", b"clean content").await;

    let mut status = ScanStatus::Pending;
    for _ in 0..50 {
        status = app.state.ledger.latest(&file_id).await.unwrap().unwrap().status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(status, ScanStatus::Clean);

    let response = app
        .client()
        .get(&api_path(&format!("/file-status/{}", file_id)))
        .await;
    let json: serde_json::Value = response.json();
    assert_eq!(json["scan_status"], "CLEAN");
    assert_eq!(json["detail"], "no threats detected");
}

#[tokio::test]
async fn test_notification_for_foreign_container_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let mut vars = base_vars(&dir);
    vars.insert("INLINE_WORKER".to_string(), "true".to_string());
    let app = setup_with_vars(dir, vars).await;

    let notifier = app.state.notifier.clone().unwrap();
    notifier
        .send(StorageNotification::new(
            "someone-elses-bucket",
            "uploads/11111111-1111-1111-1111-111111111111/x.pdf",
        ))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let record = app
        .state
        .ledger
        .latest("11111111-1111-1111-1111-111111111111")
        .await
        .unwrap();
    assert!(record.is_none());
}

#[tokio::test]
async fn test_notification_racing_intake_keeps_verdict_latest() {
    let dir = tempfile::tempdir().unwrap();
    let ledger: Arc<dyn ScanLedger> = Arc::new(InMemoryScanLedger::new());
    let raw = Arc::new(
        LocalStorage::new(dir.path().join("raw"), "raw-uploads")
            .await
            .unwrap(),
    );
    let engine = Arc::new(CleanEngine::default());
    let context = WorkerContext::new(
        ledger.clone(),
        raw.clone(),
        None,
        engine.clone(),
        ExecutorSettings::default(),
    );
    let pipeline = Arc::new(ScanPipeline::new(&context));
    let storage = Arc::new(EagerNotifyStorage::new(raw, pipeline.clone()));
    let app = setup_with_parts(dir, ledger.clone(), storage.clone());

    let file_id = upload(app.client(), "report.pdf", b"quarterly numbers").await;

    // The scan finished while the handler was still storing the bytes.
    let outcomes = storage.outcomes();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0], ProcessOutcome::Completed { .. }));

    let latest = ledger.latest(&file_id).await.unwrap().unwrap();
    assert_eq!(latest.status, ScanStatus::Clean);
    let messages: Vec<&str> = latest.event_log.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(messages[0], "upload received");
    assert!(!messages
        .iter()
        .any(|m| m.contains("without intake record")));

    // A redelivered notification finds the verdict and does not scan again.
    let redelivered = pipeline
        .process(&StorageNotification::new(
            latest.storage_locator.container.clone(),
            latest.storage_locator.key.clone(),
        ))
        .await;
    assert!(matches!(redelivered, ProcessOutcome::AlreadyTerminal(_)));
    assert_eq!(engine.calls(), 1);
    assert_eq!(ledger.latest(&file_id).await.unwrap().unwrap(), latest);
}

#[tokio::test]
async fn test_failed_store_closes_pending_revision() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Arc::new(InMemoryScanLedger::new());
    let storage = Arc::new(RejectingStorage::default());
    let app = setup_with_parts(dir, ledger.clone(), storage.clone());

    let response = app
        .client()
        .post(&api_path("/upload"))
        .multipart(file_form("lost.pdf", b"payload"))
        .await;
    assert_eq!(response.status_code(), 500);
    let json: serde_json::Value = response.json();
    assert_eq!(json["code"], "STORAGE_ERROR");

    let key = storage.attempted_key().expect("no write was attempted");
    let object_id = parse_upload_key(&key).unwrap().object_id.to_string();

    // The PENDING revision was written before the store was touched.
    let record = ledger.latest(&object_id).await.unwrap().unwrap();
    assert_eq!(record.status, ScanStatus::Error);
    assert!(record.detail.starts_with("upload failed"), "{}", record.detail);
    assert_eq!(record.event_log[0].message, "upload received");
    assert_eq!(ledger.len().await, 1);
}
