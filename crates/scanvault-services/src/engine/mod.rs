//! Scanning engine capability.
//!
//! An engine scans one local file and reports the classic exit code
//! contract: `0` clean, `1` infected, anything else an error.

#[cfg(feature = "clamd")]
pub mod clamd;
pub mod clamscan;

use async_trait::async_trait;
use scanvault_core::{Config, EngineKind};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// What an engine run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl EngineOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

/// The engine could not produce an exit code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("scan engine executable not found: {0}")]
    NotInstalled(String),

    #[error("failed to launch scan engine: {0}")]
    Launch(String),

    #[error("scan engine timed out after {0:?}")]
    Timeout(Duration),

    #[error("scan engine terminated abnormally: {0}")]
    Terminated(String),
}

#[async_trait]
pub trait ScanEngine: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Scan the file at `path`, giving up after `timeout`.
    async fn run(&self, path: &Path, timeout: Duration) -> Result<EngineOutput, EngineError>;
}

/// Create the engine selected by `SCAN_ENGINE`.
pub fn create_engine(config: &Config) -> anyhow::Result<Arc<dyn ScanEngine>> {
    match config.scan_engine() {
        EngineKind::ClamScan => Ok(Arc::new(clamscan::ClamScanEngine::new(
            config.clamscan_path(),
            config.clamav_db_path(),
        ))),
        #[cfg(feature = "clamd")]
        EngineKind::Clamd => Ok(Arc::new(clamd::ClamdEngine::new(
            config.clamav_host().to_string(),
            config.clamav_port(),
        ))),
        #[cfg(not(feature = "clamd"))]
        EngineKind::Clamd => Err(anyhow::anyhow!(
            "clamd engine not available (clamd feature not enabled)"
        )),
    }
}
