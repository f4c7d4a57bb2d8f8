use crate::engine::{EngineError, EngineOutput};
use scanvault_core::ScanStatus;

const TRUNCATION_SUFFIX: &str = "…[truncated]";

/// Terminal status and detail derived from one engine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub status: ScanStatus,
    pub detail: String,
}

impl Verdict {
    fn new(status: ScanStatus, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }
}

/// Map an engine run onto a terminal status.
///
/// Exit code `0` is CLEAN, `1` is INFECTED, everything else (including a
/// run that never produced an exit code) is ERROR.
pub fn interpret(result: &Result<EngineOutput, EngineError>) -> Verdict {
    match result {
        Ok(output) => match output.exit_code {
            0 => Verdict::new(ScanStatus::Clean, "no threats detected"),
            1 => {
                let detail = extract_threat_line(&output.stdout)
                    .or_else(|| extract_threat_line(&output.stderr))
                    .map(|line| format!("threat detected: {}", line))
                    .unwrap_or_else(|| "threat detected by scan engine".to_string());
                Verdict::new(ScanStatus::Infected, detail)
            }
            code => {
                let reason = first_line(&output.stderr)
                    .or_else(|| first_line(&output.stdout))
                    .unwrap_or("no diagnostic output");
                Verdict::new(
                    ScanStatus::Error,
                    format!("scan engine exited with code {}: {}", code, reason),
                )
            }
        },
        Err(e) => Verdict::new(ScanStatus::Error, e.to_string()),
    }
}

/// Find a `<path>: <signature> FOUND` line and return it without the path.
pub fn extract_threat_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(|line| line.trim().trim_end_matches('\0').trim_end())
        .find(|line| line.ends_with("FOUND"))
        .map(|line| match line.rsplit_once(": ") {
            Some((_, threat)) => threat.trim().to_string(),
            None => line.to_string(),
        })
}

/// Bound engine output before it goes into the event log.
pub fn truncate_output(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &text[..cut], TRUNCATION_SUFFIX),
        None => text.to_string(),
    }
}

fn first_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|line| !line.is_empty())
}
