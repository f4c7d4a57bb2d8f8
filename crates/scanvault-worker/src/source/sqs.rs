use super::{Delivery, NotificationError, NotificationSource};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client;
use scanvault_core::{Config, StorageNotification};
use serde::Deserialize;

/// Long-polls an SQS queue fed by S3 "object created" event notifications.
pub struct SqsNotificationSource {
    client: Client,
    queue_url: String,
    wait_time_secs: i32,
    max_messages: i32,
}

impl SqsNotificationSource {
    pub fn new(client: Client, queue_url: String, wait_time_secs: i32, max_messages: i32) -> Self {
        Self {
            client,
            queue_url,
            wait_time_secs,
            max_messages,
        }
    }

    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let queue_url = config
            .sqs_queue_url()
            .ok_or_else(|| anyhow::anyhow!("SQS_QUEUE_URL not configured"))?
            .to_string();

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = config.aws_region().or_else(|| config.s3_region()) {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let sdk_config = loader.load().await;

        tracing::info!(queue_url = %queue_url, "SQS notification source configured");

        Ok(Self::new(
            Client::new(&sdk_config),
            queue_url,
            config.sqs_wait_time_secs(),
            config.sqs_max_messages(),
        ))
    }
}

#[async_trait]
impl NotificationSource for SqsNotificationSource {
    fn name(&self) -> &str {
        "sqs"
    }

    async fn receive(&self) -> Result<Vec<Delivery>, NotificationError> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(self.max_messages)
            .wait_time_seconds(self.wait_time_secs)
            .send()
            .await
            .map_err(|e| NotificationError::Receive(DisplayErrorContext(&e).to_string()))?;

        let deliveries = output
            .messages()
            .iter()
            .map(|message| {
                let id = message.message_id().unwrap_or_default().to_string();
                let notifications = match parse_s3_event(message.body().unwrap_or_default()) {
                    Ok(notifications) => notifications,
                    Err(e) => {
                        // Acknowledged anyway: a body that cannot be parsed never will be.
                        tracing::warn!(message_id = %id, error = %e, "Discarding unparseable SQS message");
                        Vec::new()
                    }
                };
                Delivery {
                    id,
                    ack_token: message.receipt_handle().map(String::from),
                    notifications,
                }
            })
            .collect();

        Ok(deliveries)
    }

    async fn acknowledge(&self, delivery: &Delivery) -> Result<(), NotificationError> {
        let Some(receipt_handle) = &delivery.ack_token else {
            return Ok(());
        };

        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| NotificationError::Acknowledge {
                id: delivery.id.clone(),
                reason: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct S3Event {
    #[serde(rename = "Records", default)]
    records: Vec<S3EventRecord>,
}

#[derive(Debug, Deserialize)]
struct S3EventRecord {
    #[serde(rename = "eventName")]
    event_name: String,
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct S3Object {
    key: String,
}

/// Extract object-created notifications from an S3 event body.
///
/// `s3:TestEvent` bodies carry no `Records` and yield nothing. Keys are
/// returned still URL-encoded.
pub fn parse_s3_event(body: &str) -> Result<Vec<StorageNotification>, NotificationError> {
    let event: S3Event =
        serde_json::from_str(body).map_err(|e| NotificationError::InvalidBody(e.to_string()))?;

    Ok(event
        .records
        .into_iter()
        .filter(|record| record.event_name.starts_with("ObjectCreated"))
        .map(|record| StorageNotification::new(record.s3.bucket.name, record.s3.object.key))
        .collect())
}
