//! ScanVault Services Layer
//!
//! Scan engines and the scan orchestration services built on top of the
//! ledger and storage crates: the idempotency guard, the scan executor and
//! the result publisher.

pub mod engine;
pub mod scan;

#[cfg(feature = "clamd")]
pub use engine::clamd::ClamdEngine;
pub use engine::clamscan::ClamScanEngine;
pub use engine::{create_engine, EngineError, EngineOutput, ScanEngine};
pub use scan::executor::{ExecutorSettings, JobOutcome, ScanExecutor};
pub use scan::guard::{GuardDecision, IdempotencyGuard};
pub use scan::publisher::{PublishOutcome, ResultPublisher};
pub use scan::verdict::{extract_threat_line, interpret, truncate_output, Verdict};
