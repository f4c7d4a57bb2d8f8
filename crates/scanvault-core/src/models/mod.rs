pub mod job;
pub mod scan;

pub use job::{ScanJob, StorageNotification};
pub use scan::{
    revision_now, EventLogEntry, LedgerFields, RecordKey, ScanRecord, ScanStatus, StorageLocator,
};
