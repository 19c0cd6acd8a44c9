//! NATS message consumer for incoming transactions

use anyhow::Result;
use async_nats::{Client, Subscriber};
use tracing::info;

/// Consumer for receiving transactions from NATS
pub struct TransactionConsumer {
    client: Client,
    subject: String,
    queue_group: String,
}

impl TransactionConsumer {
    /// Create a new transaction consumer
    pub fn new(client: Client, subject: &str, queue_group: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            queue_group: queue_group.to_string(),
        }
    }

    /// Join the queue group on the transaction subject so replicas share load
    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = self
            .client
            .queue_subscribe(self.subject.clone(), self.queue_group.clone())
            .await?;
        info!(
            subject = %self.subject,
            queue_group = %self.queue_group,
            "Subscribed to transaction subject"
        );
        Ok(subscriber)
    }

    /// Get the subject name
    pub fn subject(&self) -> &str {
        &self.subject
    }
}
