use super::{EngineError, EngineOutput, ScanEngine};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;

/// Runs a scanner executable once per file.
///
/// The child is spawned with `kill_on_drop`, so when the timeout fires and
/// the wait future is dropped the process is killed rather than left behind.
#[derive(Debug, Clone)]
pub struct ClamScanEngine {
    executable: PathBuf,
    args: Vec<String>,
}

impl ClamScanEngine {
    /// `clamscan --database <database_dir> --stdout --no-summary <file>`
    pub fn new(executable: impl Into<PathBuf>, database_dir: impl Into<String>) -> Self {
        Self::with_args(
            executable,
            vec![
                "--database".to_string(),
                database_dir.into(),
                "--stdout".to_string(),
                "--no-summary".to_string(),
            ],
        )
    }

    /// Any executable honouring the exit code contract; the file path is appended after `args`.
    pub fn with_args(executable: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            executable: executable.into(),
            args,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }
}

#[async_trait]
impl ScanEngine for ClamScanEngine {
    fn name(&self) -> &str {
        "clamscan"
    }

    async fn run(&self, path: &Path, timeout: Duration) -> Result<EngineOutput, EngineError> {
        let start = Instant::now();

        let child = Command::new(&self.executable)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => {
                    EngineError::NotInstalled(self.executable.display().to_string())
                }
                _ => EngineError::Launch(format!("{}: {}", self.executable.display(), e)),
            })?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(EngineError::Launch(format!(
                    "failed to collect engine output: {}",
                    e
                )))
            }
            Err(_) => {
                tracing::error!(
                    executable = %self.executable.display(),
                    timeout_secs = timeout.as_secs_f64(),
                    "Scan engine timed out, process killed"
                );
                return Err(EngineError::Timeout(timeout));
            }
        };

        let Some(exit_code) = output.status.code() else {
            return Err(EngineError::Terminated(output.status.to_string()));
        };

        tracing::debug!(
            executable = %self.executable.display(),
            exit_code,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Scan engine finished"
        );

        Ok(EngineOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
