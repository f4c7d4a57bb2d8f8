use super::{EngineError, EngineOutput, ScanEngine};
use async_trait::async_trait;
use clamav_client::{clean, Tcp};
use std::path::Path;
use std::time::{Duration, Instant};

/// Scans through a running clamd daemon over TCP.
///
/// The daemon response is mapped onto the same exit code contract as the
/// command line scanner so both engines share one interpretation.
#[derive(Debug, Clone)]
pub struct ClamdEngine {
    host: String,
    port: u16,
}

impl ClamdEngine {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[async_trait]
impl ScanEngine for ClamdEngine {
    fn name(&self) -> &str {
        "clamd"
    }

    async fn run(&self, path: &Path, timeout: Duration) -> Result<EngineOutput, EngineError> {
        let start = Instant::now();
        tracing::debug!(host = %self.host, port = %self.port, "Starting clamd scan");

        let address = self.address();
        let path = path.to_path_buf();

        // The sync client keeps the non-Send connection off the async executor.
        let result = tokio::time::timeout(
            timeout,
            tokio::task::spawn_blocking(move || {
                let connection = Tcp {
                    host_address: address.as_str(),
                };
                clamav_client::scan_file(&path, connection, None)
            }),
        )
        .await;

        let response = match result {
            Ok(Ok(Ok(response))) => response,
            Ok(Ok(Err(e))) => {
                tracing::error!(error = %e, "clamd scan failed");
                return Err(EngineError::Launch(format!("clamd scan error: {}", e)));
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "clamd scan task panicked");
                return Err(EngineError::Terminated(format!("scan task join error: {}", e)));
            }
            Err(_) => {
                tracing::error!(timeout_secs = timeout.as_secs_f64(), "clamd scan timeout");
                return Err(EngineError::Timeout(timeout));
            }
        };

        let text = String::from_utf8_lossy(&response)
            .trim_end_matches('\0')
            .trim()
            .to_string();

        let exit_code = match clean(&response) {
            Ok(true) => 0,
            Ok(false) if text.ends_with("FOUND") => 1,
            Ok(false) => 2,
            Err(e) => {
                return Ok(EngineOutput::new(
                    2,
                    String::new(),
                    format!("unreadable clamd response: {}", e),
                ))
            }
        };

        tracing::debug!(
            exit_code,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "clamd scan finished"
        );

        if exit_code == 2 {
            Ok(EngineOutput::new(exit_code, String::new(), text))
        } else {
            Ok(EngineOutput::new(exit_code, text, String::new()))
        }
    }
}
