//! Error taxonomy for the decision path.
//!
//! Only [`DecisionError`] ever reaches a caller. Model, rule, store and
//! explanation failures are absorbed by the engine and turned into fallbacks.

use thiserror::Error;

/// Errors that reject a single request before a decision is made.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecisionError {
    #[error("malformed input in field `{field}`: {reason}")]
    MalformedInput { field: &'static str, reason: String },
}

impl DecisionError {
    pub fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        DecisionError::MalformedInput {
            field,
            reason: reason.into(),
        }
    }
}

/// Failures of the model scorer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("feature schema mismatch: expected {expected:?}, model trained on {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("scoring timed out after {0} ms")]
    Timeout(u64),

    #[error("model returned invalid probability {0}")]
    InvalidOutput(f64),
}

/// Failure of one rule predicate. Never aborts the other rules.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("rule {rule} failed: {reason}")]
pub struct RuleError {
    pub rule: String,
    pub reason: String,
}

impl RuleError {
    pub fn new(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            reason: reason.into(),
        }
    }
}

/// Persistence failures. Logged, never returned to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to publish record: {0}")]
    Publish(String),

    #[error("persistence timed out after {0} ms")]
    Timeout(u64),
}

/// Explanation generator failures. Replaced by a placeholder text.
#[derive(Debug, Error)]
pub enum ExplainError {
    #[error("explanation backend failed: {0}")]
    Backend(String),

    #[error("explanation timed out after {0} ms")]
    Timeout(u64),
}
