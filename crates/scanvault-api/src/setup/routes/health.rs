//! Health check handlers.

use crate::state::AppState;
use axum::{http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;
use std::time::Duration;

/// Object id used to probe the ledger; it never has a record.
const READINESS_PROBE_ID: &str = "readiness-probe";

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// Readiness probe - the ledger answers a lookup.
pub async fn readiness_check(state: Arc<AppState>) -> impl IntoResponse {
    const TIMEOUT: Duration = Duration::from_secs(5);

    let mut response = serde_json::json!({
        "status": "ready",
        "ledger": "unknown",
        "storage": state.storage.backend_type().to_string(),
    });

    let mut overall_ready = true;
    match tokio::time::timeout(TIMEOUT, state.ledger.latest(READINESS_PROBE_ID)).await {
        Ok(Ok(_)) => response["ledger"] = serde_json::json!("ready"),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Ledger readiness check failed");
            response["ledger"] = serde_json::json!(format!("not_ready: {}", e));
            overall_ready = false;
        }
        Err(_) => {
            tracing::error!("Ledger readiness check timed out");
            response["ledger"] = serde_json::json!("timeout");
            overall_ready = false;
        }
    }

    if overall_ready {
        (StatusCode::OK, Json(response))
    } else {
        response["status"] = serde_json::json!("not_ready");
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}
