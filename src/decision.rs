//! Fusion of the model signal and the rule score into one verdict.
//!
//! `final_score = max(model_score, rule_score)`: either signal alone can flag
//! a transaction. The ML reason follows the model's own binary prediction,
//! not the fused score, so it may read "no ML alert" on a rule-flagged
//! transaction and the other way round.

use crate::models::ModelVerdict;
use crate::types::decision::DecisionResult;

pub const ML_POSITIVE_REASON: &str = "ML model predicted high fraud probability.";
pub const ML_NEGATIVE_REASON: &str = "No ML alerts were triggered.";
pub const ML_UNAVAILABLE_REASON: &str =
    "ML model unavailable; decision based on business rules only.";
pub const NO_RULE_ALERTS_REASON: &str = "No rule-based alerts were triggered.";

/// What the model contributed to a decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelSignal {
    Scored(ModelVerdict),
    /// Model missing, failed or timed out; contributes a score of 0
    Unavailable,
}

impl ModelSignal {
    pub fn score(&self) -> f64 {
        match self {
            ModelSignal::Scored(verdict) => verdict.probability,
            ModelSignal::Unavailable => 0.0,
        }
    }

    pub fn ml_reason(&self) -> &'static str {
        match self {
            ModelSignal::Scored(verdict) if verdict.is_fraud => ML_POSITIVE_REASON,
            ModelSignal::Scored(_) => ML_NEGATIVE_REASON,
            ModelSignal::Unavailable => ML_UNAVAILABLE_REASON,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, ModelSignal::Scored(_))
    }
}

/// Fixed fusion policy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionFuser {
    flag_threshold: f64,
}

impl DecisionFuser {
    pub fn new(flag_threshold: f64) -> Self {
        Self { flag_threshold }
    }

    pub fn flag_threshold(&self) -> f64 {
        self.flag_threshold
    }

    /// OR-like fusion of the two signals
    pub fn fuse(model_score: f64, rule_score: f64) -> f64 {
        model_score.max(rule_score)
    }

    pub fn decide(
        &self,
        rule_score: f64,
        rule_reasons: Vec<String>,
        model: ModelSignal,
    ) -> DecisionResult {
        let risk_score = Self::fuse(model.score(), rule_score);
        let is_fraud = risk_score >= self.flag_threshold;
        let ml_reason = model.ml_reason().to_string();

        let mut combined_reasons = Vec::with_capacity(rule_reasons.len() + 1);
        combined_reasons.push(ml_reason.clone());
        if rule_reasons.is_empty() {
            combined_reasons.push(NO_RULE_ALERTS_REASON.to_string());
        } else {
            combined_reasons.extend(rule_reasons.iter().cloned());
        }

        DecisionResult::new(is_fraud, risk_score, ml_reason, rule_reasons, combined_reasons)
    }
}

impl Default for DecisionFuser {
    fn default() -> Self {
        Self::new(0.50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(probability: f64, is_fraud: bool) -> ModelSignal {
        ModelSignal::Scored(ModelVerdict {
            probability,
            is_fraud,
        })
    }

    #[test]
    fn test_model_only_decision() {
        let decision = DecisionFuser::default().decide(0.0, Vec::new(), scored(0.82, true));

        assert!(decision.is_fraud());
        assert_eq!(decision.risk_score(), 0.82);
        assert_eq!(decision.ml_reason(), ML_POSITIVE_REASON);
        assert!(decision.rule_reasons().is_empty());
        assert_eq!(
            decision.combined_reasons(),
            &[ML_POSITIVE_REASON.to_string(), NO_RULE_ALERTS_REASON.to_string()]
        );
    }

    #[test]
    fn test_rules_flag_while_model_is_quiet() {
        let reasons = vec!["Transaction at odd hour: 3:00".to_string()];
        let decision = DecisionFuser::default().decide(0.6, reasons.clone(), scored(0.1, false));

        assert!(decision.is_fraud());
        assert_eq!(decision.risk_score(), 0.6);
        assert_eq!(decision.ml_reason(), ML_NEGATIVE_REASON);
        assert_eq!(decision.rule_reasons(), reasons.as_slice());
        assert_eq!(decision.combined_reasons()[0], ML_NEGATIVE_REASON);
        assert_eq!(decision.combined_reasons()[1], reasons[0]);
    }

    #[test]
    fn test_model_prediction_independent_of_fused_score() {
        // the model predicts fraud but its probability alone stays under the flag threshold
        let decision = DecisionFuser::default().decide(0.0, Vec::new(), scored(0.4, true));
        assert!(!decision.is_fraud());
        assert_eq!(decision.ml_reason(), ML_POSITIVE_REASON);
    }

    #[test]
    fn test_flag_threshold_is_inclusive() {
        let fuser = DecisionFuser::new(0.5);
        assert!(fuser.decide(0.5, vec!["r".to_string()], scored(0.0, false)).is_fraud());
        assert!(!fuser.decide(0.49, vec!["r".to_string()], scored(0.0, false)).is_fraud());
    }

    #[test]
    fn test_unavailable_model_uses_rule_score() {
        let decision = DecisionFuser::default().decide(
            0.3,
            vec!["reason".to_string()],
            ModelSignal::Unavailable,
        );
        assert_eq!(decision.risk_score(), 0.3);
        assert!(!decision.is_fraud());
        assert_eq!(decision.ml_reason(), ML_UNAVAILABLE_REASON);
        assert!(!ModelSignal::Unavailable.is_available());
    }

    #[test]
    fn test_fuse_is_max() {
        assert_eq!(DecisionFuser::fuse(0.2, 0.7), 0.7);
        assert_eq!(DecisionFuser::fuse(0.9, 0.7), 0.9);
        assert_eq!(DecisionFuser::fuse(0.0, 0.0), 0.0);
    }
}
