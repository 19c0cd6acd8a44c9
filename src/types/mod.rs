//! Type definitions for the decision engine

pub mod alert;
pub mod decision;
pub mod transaction;

pub use alert::{AlertRecord, RiskLevel, RiskLevelThresholds};
pub use decision::{DecisionResult, PredictionRecord, RuleTrigger, Severity};
pub use transaction::{Channel, RawTransaction, TimeParts};
