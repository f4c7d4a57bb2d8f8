//! ScanVault worker
//!
//! Consumes "object created" notifications for the raw intake store and runs
//! each through the scan pipeline: trigger adapter, idempotency guard, scan
//! executor and result publisher.

pub mod adapter;
pub mod context;
pub mod pipeline;
pub mod pool;
pub mod signal;
pub mod source;
pub mod telemetry;

pub use adapter::{decode_key, AdapterDecision, TriggerAdapter};
pub use context::WorkerContext;
pub use pipeline::{ProcessOutcome, ScanPipeline};
pub use pool::{ScanWorker, WorkerSettings};
pub use signal::shutdown_signal;
pub use source::channel::{ChannelNotificationSource, NotificationSender};
#[cfg(feature = "source-sqs")]
pub use source::sqs::SqsNotificationSource;
pub use source::{Delivery, NotificationError, NotificationSource};
pub use telemetry::init_tracing;
