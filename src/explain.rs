//! Plain-text explanation of a decision.
//!
//! Explanations are best effort. The engine replaces any failure with
//! [`placeholder`] and never lets it affect the decision.

use crate::decision::{ML_POSITIVE_REASON, ML_UNAVAILABLE_REASON};
use crate::error::ExplainError;
use crate::types::transaction::RawTransaction;
use async_trait::async_trait;
use serde::Serialize;

/// Facts an explanation may draw on
#[derive(Debug, Clone, Serialize)]
pub struct ExplanationRequest {
    pub transaction: RawTransaction,
    pub ml_reason: String,
    pub rule_reasons: Vec<String>,
    pub is_fraud: bool,
    pub risk_score: f64,
}

/// Free-text explanation generator
#[async_trait]
pub trait Explainer: Send + Sync {
    async fn explain(&self, request: &ExplanationRequest) -> Result<String, ExplainError>;
}

/// Text used when explanation generation fails
pub fn placeholder(err: &ExplainError) -> String {
    format!("Explanation unavailable: {}", err)
}

/// Deterministic explainer built from the decision facts only
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateExplainer;

impl TemplateExplainer {
    pub fn render(&self, request: &ExplanationRequest) -> String {
        let model_positive = request.ml_reason == ML_POSITIVE_REASON;
        let model_unavailable = request.ml_reason == ML_UNAVAILABLE_REASON;
        let rules_fired = !request.rule_reasons.is_empty();

        let confidence = if (request.risk_score - 0.5).abs() >= 0.3 {
            "high"
        } else {
            "moderate"
        };
        let verdict = if request.is_fraud {
            "was flagged as likely fraud"
        } else {
            "was not flagged as fraud"
        };

        let mut lines = vec![
            format!(
                "Transaction for customer {} {} with a risk score of {:.2} ({} confidence).",
                request.transaction.customer_id, verdict, request.risk_score, confidence
            ),
            String::new(),
            "Key Drivers:".to_string(),
            format!("- {}", request.ml_reason),
        ];
        if rules_fired {
            lines.extend(request.rule_reasons.iter().map(|r| format!("- {}", r)));
        } else {
            lines.push("- No rule-based indicators fired.".to_string());
        }

        lines.push(String::new());
        lines.push("Assessment:".to_string());
        let assessment = match (model_unavailable, model_positive, rules_fired) {
            (true, _, _) => {
                "The model was unavailable, so the verdict rests on business rules alone."
            }
            (false, true, true) => {
                "The model and the business rules both point to fraud, consistent with the risk score."
            }
            (false, true, false) => "The model drove the verdict; no business rule fired.",
            (false, false, true) => {
                "Business rules drove the verdict while the model raised no alert."
            }
            (false, false, false) => {
                "Neither the model nor the business rules raised concerns, consistent with the risk score."
            }
        };
        lines.push(assessment.to_string());

        lines.push(String::new());
        lines.push("Next Actions:".to_string());
        if request.is_fraud {
            lines.push("- Hold the transaction and verify it with the customer.".to_string());
            if !request.transaction.is_kyc_verified() {
                lines.push("- Complete KYC verification before releasing funds.".to_string());
            }
        } else if rules_fired || model_positive {
            lines.push("- Monitor the customer's next transactions.".to_string());
        } else {
            lines.push("No additional action required.".to_string());
        }

        lines.join("\n")
    }
}

#[async_trait]
impl Explainer for TemplateExplainer {
    async fn explain(&self, request: &ExplanationRequest) -> Result<String, ExplainError> {
        Ok(self.render(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::ML_NEGATIVE_REASON;

    fn request(is_fraud: bool, risk_score: f64, ml_reason: &str, rules: &[&str]) -> ExplanationRequest {
        let mut transaction = RawTransaction::new("C-5", 15_000.0, "international", "2024-03-09T03:00:00");
        transaction.kyc_verified = 0;
        ExplanationRequest {
            transaction,
            ml_reason: ml_reason.to_string(),
            rule_reasons: rules.iter().map(|r| r.to_string()).collect(),
            is_fraud,
            risk_score,
        }
    }

    #[tokio::test]
    async fn test_fraud_explanation_sections() {
        let text = TemplateExplainer
            .explain(&request(true, 0.95, ML_POSITIVE_REASON, &["Transaction at odd hour: 3:00"]))
            .await
            .unwrap();

        assert!(text.starts_with("Transaction for customer C-5 was flagged as likely fraud"));
        assert!(text.contains("0.95 (high confidence)"));
        assert!(text.contains("Key Drivers:\n- ML model predicted high fraud probability.\n- Transaction at odd hour: 3:00"));
        assert!(text.contains("both point to fraud"));
        assert!(text.contains("Complete KYC verification"));
        assert!(!text.contains('*'));
    }

    #[test]
    fn test_clean_explanation() {
        let mut req = request(false, 0.05, ML_NEGATIVE_REASON, &[]);
        req.transaction.kyc_verified = 1;
        let text = TemplateExplainer.render(&req);

        assert!(text.contains("was not flagged as fraud"));
        assert!(text.contains("- No rule-based indicators fired."));
        assert!(text.ends_with("No additional action required."));
    }

    #[test]
    fn test_rule_only_explanation() {
        let text = TemplateExplainer.render(&request(true, 0.6, ML_UNAVAILABLE_REASON, &["r"]));
        assert!(text.contains("moderate confidence"));
        assert!(text.contains("rests on business rules alone"));
    }

    #[test]
    fn test_placeholder() {
        let err = ExplainError::Backend("quota exceeded".to_string());
        assert_eq!(
            placeholder(&err),
            "Explanation unavailable: explanation backend failed: quota exceeded"
        );
    }
}
