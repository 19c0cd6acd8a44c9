//! Append-only persistence of decisions and alerts

use crate::error::StoreError;
use crate::types::{AlertRecord, PredictionRecord};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::RwLock;

/// Largest page served by [`MemoryStore::history`]
pub const MAX_HISTORY_LIMIT: usize = 200;

/// Append-only sink for audit records and alerts
#[async_trait]
pub trait Store: Send + Sync {
    async fn record_prediction(&self, record: &PredictionRecord) -> Result<(), StoreError>;

    async fn record_alert(&self, alert: &AlertRecord) -> Result<(), StoreError>;
}

/// One page of prediction history, newest first
#[derive(Debug, Clone, Serialize)]
pub struct HistoryPage {
    pub data: Vec<PredictionRecord>,
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub has_next: bool,
}

/// In-process store, used in tests and single-node deployments
#[derive(Debug, Default)]
pub struct MemoryStore {
    predictions: RwLock<Vec<PredictionRecord>>,
    alerts: RwLock<Vec<AlertRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn predictions(&self) -> Vec<PredictionRecord> {
        self.predictions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn alerts(&self) -> Vec<AlertRecord> {
        self.alerts.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Paginated history. `page` starts at 1; `limit` is clamped to 1..=200.
    pub fn history(&self, page: usize, limit: usize) -> HistoryPage {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT);
        let skip = (page - 1).saturating_mul(limit);

        let records = self.predictions.read().unwrap_or_else(|e| e.into_inner());
        let total = records.len();

        let mut newest_first: Vec<&PredictionRecord> = records.iter().rev().collect();
        newest_first.sort_by(|a, b| b.processed_at.cmp(&a.processed_at));

        let data: Vec<PredictionRecord> = newest_first
            .into_iter()
            .skip(skip)
            .take(limit)
            .cloned()
            .collect();
        let has_next = skip + data.len() < total;

        HistoryPage {
            data,
            page,
            limit,
            total,
            has_next,
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn record_prediction(&self, record: &PredictionRecord) -> Result<(), StoreError> {
        self.predictions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }

    async fn record_alert(&self, alert: &AlertRecord) -> Result<(), StoreError> {
        self.alerts
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(alert.clone());
        Ok(())
    }
}
