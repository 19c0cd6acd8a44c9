//! Rule triggers, decision results and the audit record

use super::transaction::RawTransaction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity tier of a fired rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        };
        f.write_str(s)
    }
}

/// A fired business rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleTrigger {
    /// Stable rule identifier, e.g. `ODD_HOUR_TXN`
    pub rule: String,
    /// Human-readable reason
    pub reason: String,
    pub severity: Severity,
}

/// Final verdict for one transaction.
///
/// Only the decision fuser builds these; fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    is_fraud: bool,
    risk_score: f64,
    ml_reason: String,
    rule_reasons: Vec<String>,
    combined_reasons: Vec<String>,
}

impl DecisionResult {
    pub(crate) fn new(
        is_fraud: bool,
        risk_score: f64,
        ml_reason: String,
        rule_reasons: Vec<String>,
        combined_reasons: Vec<String>,
    ) -> Self {
        Self {
            is_fraud,
            risk_score,
            ml_reason,
            rule_reasons,
            combined_reasons,
        }
    }

    pub fn is_fraud(&self) -> bool {
        self.is_fraud
    }

    /// Fused risk score in [0, 1]
    pub fn risk_score(&self) -> f64 {
        self.risk_score
    }

    pub fn ml_reason(&self) -> &str {
        &self.ml_reason
    }

    /// Rule reasons in evaluation order. Empty when no rule fired.
    pub fn rule_reasons(&self) -> &[String] {
        &self.rule_reasons
    }

    pub fn combined_reasons(&self) -> &[String] {
        &self.combined_reasons
    }
}

/// Append-only audit record of one decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(flatten)]
    pub transaction: RawTransaction,

    #[serde(flatten)]
    pub decision: DecisionResult,

    /// Identifiers of the rules that fired
    pub rule_triggers: Vec<String>,

    /// Structured rule triggers
    pub rule_details: Vec<RuleTrigger>,

    /// Free-text explanation, when an explainer is configured
    pub explanation: Option<String>,

    pub processed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_serialization() {
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"high\"");
        let sev: Severity = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(sev, Severity::Medium);
        assert_eq!(Severity::Low.to_string(), "low");
    }

    #[test]
    fn test_prediction_record_is_flat() {
        let record = PredictionRecord {
            transaction: RawTransaction::new("C-1", 42.0, "pos", "2024-03-09T10:00:00"),
            decision: DecisionResult::new(
                false,
                0.1,
                "No ML alerts were triggered.".to_string(),
                Vec::new(),
                vec!["No ML alerts were triggered.".to_string()],
            ),
            rule_triggers: Vec::new(),
            rule_details: Vec::new(),
            explanation: None,
            processed_at: Utc::now(),
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["customer_id"], "C-1");
        assert_eq!(value["is_fraud"], false);
        assert_eq!(value["risk_score"], 0.1);
    }
}
