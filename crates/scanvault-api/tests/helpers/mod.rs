//! Test helpers: build the router over an in-memory ledger and a temp-dir store.
//!
//! Run from workspace root: `cargo test -p scanvault-api --test api_test`.

pub mod storage;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use bytes::Bytes;
use scanvault_api::constants::{API_PREFIX, UPLOAD_FIELD};
use scanvault_api::setup::{initialize_app, routes, App};
use scanvault_api::state::AppState;
use scanvault_core::Config;
use scanvault_db::ScanLedger;
use scanvault_storage::Storage;
use scanvault_worker::ScanWorker;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;

/// API path prefix for tests (e.g. `/api/upload`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", API_PREFIX, path)
}

/// Test application: server, state and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub worker: Option<ScanWorker>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

/// Variables for a local store and in-memory ledger rooted in `dir`.
pub fn base_vars(dir: &TempDir) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("ENVIRONMENT".to_string(), "test".to_string());
    vars.insert("LEDGER_BACKEND".to_string(), "memory".to_string());
    vars.insert("STORAGE_BACKEND".to_string(), "local".to_string());
    vars.insert(
        "LOCAL_STORAGE_PATH".to_string(),
        dir.path().join("raw").display().to_string(),
    );
    vars.insert("LOCAL_STORAGE_CONTAINER".to_string(), "raw-uploads".to_string());
    vars.insert("MAX_UPLOAD_SIZE_MB".to_string(), "1".to_string());
    vars
}

pub async fn setup_with_vars(dir: TempDir, vars: HashMap<String, String>) -> TestApp {
    let config = Config::from_vars(&vars).expect("Failed to build test config");
    let App {
        state,
        router,
        worker,
    } = initialize_app(config).await.expect("Failed to initialize app");

    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        state,
        worker,
        _temp_dir: dir,
    }
}

/// App over caller-supplied ledger and raw store, without an inline worker.
pub fn setup_with_parts(
    dir: TempDir,
    ledger: Arc<dyn ScanLedger>,
    storage: Arc<dyn Storage>,
) -> TestApp {
    let config = Config::from_vars(&base_vars(&dir)).expect("Failed to build test config");
    let state = Arc::new(AppState::new(config.clone(), ledger, storage));
    let router = routes::setup_routes(&config, state.clone()).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        state,
        worker: None,
        _temp_dir: dir,
    }
}

/// App without an inline worker: uploads stay PENDING.
pub async fn setup_test_app() -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let vars = base_vars(&dir);
    setup_with_vars(dir, vars).await
}

pub fn file_form(filename: &str, body: &[u8]) -> MultipartForm {
    MultipartForm::new().add_part(
        UPLOAD_FIELD,
        Part::bytes(Bytes::copy_from_slice(body))
            .file_name(filename)
            .mime_type("application/octet-stream"),
    )
}

/// Upload `body` and return the assigned file id.
pub async fn upload(client: &TestServer, filename: &str, body: &[u8]) -> String {
    let response = client
        .post(&api_path("/upload"))
        .multipart(file_form(filename, body))
        .await;
    assert_eq!(response.status_code(), 202, "{}", response.text());
    let json: serde_json::Value = response.json();
    json["file_id"]
        .as_str()
        .expect("file_id missing from upload response")
        .to_string()
}
