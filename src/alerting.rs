//! Alerting policy.
//!
//! An alert is emitted when the fused score exceeds the alert threshold or
//! the transaction was flagged as fraud. The second condition means a flagged
//! transaction always alerts, even below the alert threshold.

use crate::config::DecisionConfig;
use crate::types::alert::{AlertRecord, RiskLevel, RiskLevelThresholds};
use crate::types::decision::{DecisionResult, RuleTrigger};
use crate::types::transaction::RawTransaction;

#[derive(Debug, Clone)]
pub struct AlertEmitter {
    alert_threshold: f64,
    risk_levels: RiskLevelThresholds,
}

impl AlertEmitter {
    pub fn new(alert_threshold: f64, risk_levels: RiskLevelThresholds) -> Self {
        Self {
            alert_threshold,
            risk_levels,
        }
    }

    pub fn from_config(config: &DecisionConfig) -> Self {
        Self::new(config.alert_threshold, config.risk_levels.clone())
    }

    pub fn should_alert(&self, decision: &DecisionResult) -> bool {
        decision.risk_score() > self.alert_threshold || decision.is_fraud()
    }

    /// Build the alert record for a decision, if the policy fires.
    pub fn maybe_emit(
        &self,
        transaction: &RawTransaction,
        decision: &DecisionResult,
        triggers: &[RuleTrigger],
    ) -> Option<AlertRecord> {
        if !self.should_alert(decision) {
            return None;
        }

        let reasons: Vec<String> = if triggers.is_empty() {
            decision.rule_reasons().to_vec()
        } else {
            triggers.iter().map(|t| t.rule.clone()).collect()
        };

        let alert = AlertRecord::new(
            transaction.transaction_key(),
            transaction.customer_id.clone(),
            decision.risk_score(),
            RiskLevel::from_score(decision.risk_score(), &self.risk_levels),
        )
        .with_reasons(reasons)
        .with_details(triggers.to_vec());

        Some(alert)
    }
}

impl Default for AlertEmitter {
    fn default() -> Self {
        Self::from_config(&DecisionConfig::default())
    }
}
