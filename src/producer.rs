//! NATS publisher for decisions, audit records and alerts

use crate::error::StoreError;
use crate::store::Store;
use crate::types::{AlertRecord, DecisionResult, PredictionRecord};
use async_nats::Client;
use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

/// Publishes records as JSON to their NATS subjects
#[derive(Clone)]
pub struct NatsPublisher {
    client: Client,
    prediction_subject: String,
    alert_subject: String,
}

impl NatsPublisher {
    pub fn new(client: Client, prediction_subject: &str, alert_subject: &str) -> Self {
        Self {
            client,
            prediction_subject: prediction_subject.to_string(),
            alert_subject: alert_subject.to_string(),
        }
    }

    async fn publish_json<T: Serialize>(&self, subject: String, value: &T) -> Result<(), StoreError> {
        let payload = serde_json::to_vec(value)?;
        self.client
            .publish(subject, payload.into())
            .await
            .map_err(|e| StoreError::Publish(e.to_string()))
    }

    /// Answer a request-reply transaction message with its decision
    pub async fn reply(&self, subject: String, decision: &DecisionResult) -> Result<(), StoreError> {
        self.publish_json(subject, decision).await
    }

    /// Answer a request-reply transaction message that was rejected
    pub async fn reply_error(&self, subject: String, reason: &str) -> Result<(), StoreError> {
        self.publish_json(subject, &serde_json::json!({ "error": reason }))
            .await
    }

    pub fn alert_subject(&self) -> &str {
        &self.alert_subject
    }
}

#[async_trait]
impl Store for NatsPublisher {
    async fn record_prediction(&self, record: &PredictionRecord) -> Result<(), StoreError> {
        self.publish_json(self.prediction_subject.clone(), record).await?;
        debug!(
            customer_id = %record.transaction.customer_id,
            risk_score = record.decision.risk_score(),
            "Published prediction record"
        );
        Ok(())
    }

    async fn record_alert(&self, alert: &AlertRecord) -> Result<(), StoreError> {
        self.publish_json(self.alert_subject.clone(), alert).await?;
        debug!(
            alert_id = %alert.alert_id,
            transaction_id = %alert.transaction_id,
            risk_score = alert.risk_score,
            "Published fraud alert"
        );
        Ok(())
    }
}
