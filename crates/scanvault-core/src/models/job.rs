use serde::{Deserialize, Serialize};

use super::scan::StorageLocator;

/// "Object created" notification emitted by the raw intake store.
///
/// `key` is kept exactly as delivered; S3 event notifications URL-encode it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageNotification {
    pub container: String,
    pub key: String,
}

impl StorageNotification {
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }
}

/// Unit of work handed from the trigger adapter to the scan executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanJob {
    pub object_id: String,
    pub container: String,
    pub key: String,
}

impl ScanJob {
    pub fn locator(&self) -> StorageLocator {
        StorageLocator::new(self.container.clone(), self.key.clone())
    }
}
