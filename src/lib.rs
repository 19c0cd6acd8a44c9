//! Fraud Decision Engine Library
//!
//! Real-time fraud decisions for payment transactions. Each transaction is
//! turned into a fixed feature vector, scored by a binary classifier and by a
//! set of business rules, and the two signals are fused into one verdict,
//! optional alert and audit record.

pub mod alerting;
pub mod config;
pub mod consumer;
pub mod decision;
pub mod engine;
pub mod error;
pub mod explain;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod producer;
pub mod profiles;
pub mod rules;
pub mod store;
pub mod types;

pub use alerting::AlertEmitter;
pub use config::AppConfig;
pub use consumer::TransactionConsumer;
pub use decision::{DecisionFuser, ModelSignal};
pub use engine::{Assessment, DecisionEngine};
pub use error::{DecisionError, ModelError};
pub use feature_extractor::{FeatureExtractor, FeatureVector};
pub use models::{ModelLoader, Scorer};
pub use producer::NatsPublisher;
pub use rules::RuleEngine;
pub use store::{MemoryStore, Store};
pub use types::{AlertRecord, DecisionResult, PredictionRecord, RawTransaction};
