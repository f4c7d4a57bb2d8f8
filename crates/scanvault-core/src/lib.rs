//! ScanVault Core Library
//!
//! This crate provides the domain models, key conventions, error types and
//! configuration shared by every ScanVault component.

pub mod config;
pub mod error;
pub mod keys;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, EngineKind, LedgerBackend, LogFormat, NotificationSourceKind, ScanVaultConfig};
pub use error::{AppError, ErrorMetadata, LogLevel, PipelineError};
pub use keys::{parse_upload_key, upload_key, UploadKey};
pub use models::{
    revision_now, EventLogEntry, LedgerFields, RecordKey, ScanJob, ScanRecord, ScanStatus,
    StorageLocator, StorageNotification,
};
pub use storage_types::StorageBackend;
