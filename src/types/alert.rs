//! Fraud alert record

use super::decision::RuleTrigger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk level classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Determine risk level from score and thresholds
    pub fn from_score(score: f64, thresholds: &RiskLevelThresholds) -> Self {
        if score >= thresholds.critical {
            RiskLevel::Critical
        } else if score >= thresholds.high {
            RiskLevel::High
        } else if score >= thresholds.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

/// Configurable risk level thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLevelThresholds {
    pub medium: f64,
    pub high: f64,
    pub critical: f64,
}

impl Default for RiskLevelThresholds {
    fn default() -> Self {
        Self {
            medium: 0.5,
            high: 0.75,
            critical: 0.9,
        }
    }
}

/// Alert persisted when the alerting policy fires. Never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Unique alert identifier
    pub alert_id: String,

    /// `customer_id + "_" + timestamp`
    pub transaction_id: String,

    pub customer_id: String,

    /// Fused risk score (0.0 - 1.0)
    pub risk_score: f64,

    pub risk_level: RiskLevel,

    /// Rule identifiers, or rule reason texts when no identifiers exist
    pub reasons: Vec<String>,

    /// Structured rule triggers
    pub details: Vec<RuleTrigger>,

    pub created_at: DateTime<Utc>,
}

impl AlertRecord {
    /// Create a new alert
    pub fn new(
        transaction_id: String,
        customer_id: String,
        risk_score: f64,
        risk_level: RiskLevel,
    ) -> Self {
        Self {
            alert_id: uuid::Uuid::new_v4().to_string(),
            transaction_id,
            customer_id,
            risk_score,
            risk_level,
            reasons: Vec::new(),
            details: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_reasons(mut self, reasons: Vec<String>) -> Self {
        self.reasons = reasons;
        self
    }

    pub fn with_details(mut self, details: Vec<RuleTrigger>) -> Self {
        self.details = details;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::decision::Severity;

    #[test]
    fn test_risk_level_from_score() {
        let thresholds = RiskLevelThresholds::default();

        assert_eq!(RiskLevel::from_score(0.1, &thresholds), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(0.5, &thresholds), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(0.8, &thresholds), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(0.95, &thresholds), RiskLevel::Critical);
    }

    #[test]
    fn test_alert_record_builder() {
        let alert = AlertRecord::new(
            "C-9_2024-03-09T03:00:00".to_string(),
            "C-9".to_string(),
            0.8,
            RiskLevel::High,
        )
        .with_reasons(vec!["ODD_HOUR_TXN".to_string()])
        .with_details(vec![RuleTrigger {
            rule: "ODD_HOUR_TXN".to_string(),
            reason: "Transaction at odd hour: 3:00".to_string(),
            severity: Severity::Medium,
        }]);

        assert_eq!(alert.reasons, vec!["ODD_HOUR_TXN"]);
        assert_eq!(alert.details.len(), 1);
        assert!(uuid::Uuid::parse_str(&alert.alert_id).is_ok());

        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["risk_level"], "high");
        assert_eq!(json["details"][0]["severity"], "medium");
    }
}
