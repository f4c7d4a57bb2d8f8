use super::{Delivery, NotificationError, NotificationSource};
use async_trait::async_trait;
use scanvault_core::StorageNotification;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, Mutex};

pub type NotificationSender = mpsc::Sender<StorageNotification>;

/// In-process source used by the API's inline worker and by tests.
pub struct ChannelNotificationSource {
    receiver: Mutex<mpsc::Receiver<StorageNotification>>,
    max_batch: usize,
    sequence: AtomicU64,
}

impl ChannelNotificationSource {
    pub fn new(receiver: mpsc::Receiver<StorageNotification>, max_batch: usize) -> Self {
        Self {
            receiver: Mutex::new(receiver),
            max_batch: max_batch.max(1),
            sequence: AtomicU64::new(0),
        }
    }

    /// A bounded channel and the source reading from it.
    pub fn channel(capacity: usize, max_batch: usize) -> (NotificationSender, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx, max_batch))
    }

    fn delivery(&self, notification: StorageNotification) -> Delivery {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        Delivery::new(format!("inline-{}", id), vec![notification])
    }
}

#[async_trait]
impl NotificationSource for ChannelNotificationSource {
    fn name(&self) -> &str {
        "inline"
    }

    async fn receive(&self) -> Result<Vec<Delivery>, NotificationError> {
        let mut receiver = self.receiver.lock().await;

        let first = receiver.recv().await.ok_or(NotificationError::Closed)?;
        let mut batch = vec![self.delivery(first)];
        while batch.len() < self.max_batch {
            match receiver.try_recv() {
                Ok(notification) => batch.push(self.delivery(notification)),
                Err(_) => break,
            }
        }
        Ok(batch)
    }

    async fn acknowledge(&self, _delivery: &Delivery) -> Result<(), NotificationError> {
        Ok(())
    }
}
