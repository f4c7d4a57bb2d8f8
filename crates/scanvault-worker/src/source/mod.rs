//! Notification sources feeding the worker pool.

pub mod channel;
#[cfg(feature = "source-sqs")]
pub mod sqs;

use async_trait::async_trait;
use scanvault_core::StorageNotification;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("failed to receive notifications: {0}")]
    Receive(String),

    #[error("failed to acknowledge delivery {id}: {reason}")]
    Acknowledge { id: String, reason: String },

    #[error("invalid notification body: {0}")]
    InvalidBody(String),

    /// The source will never yield again.
    #[error("notification source closed")]
    Closed,
}

/// One message from a source. It may carry zero or more notifications and
/// is acknowledged as a whole once they have all been processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: String,
    pub ack_token: Option<String>,
    pub notifications: Vec<StorageNotification>,
}

impl Delivery {
    pub fn new(id: impl Into<String>, notifications: Vec<StorageNotification>) -> Self {
        Self {
            id: id.into(),
            ack_token: None,
            notifications,
        }
    }
}

#[async_trait]
pub trait NotificationSource: Send + Sync {
    fn name(&self) -> &str;

    /// Wait for the next batch of deliveries. An empty batch is not an error.
    async fn receive(&self) -> Result<Vec<Delivery>, NotificationError>;

    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), NotificationError>;
}
