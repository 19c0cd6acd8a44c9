//! End-to-end decision flow over the public API

use fraud_decision_engine::config::{AppConfig, ModelConfig, RuleConfig};
use fraud_decision_engine::decision::{
    ModelSignal, ML_NEGATIVE_REASON, ML_POSITIVE_REASON, ML_UNAVAILABLE_REASON,
};
use fraud_decision_engine::error::ModelError;
use fraud_decision_engine::feature_extractor::{FeatureExtractor, FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use fraud_decision_engine::models::{ModelLoader, ModelVerdict, Scorer};
use fraud_decision_engine::rules::{
    RuleEngine, ABSOLUTE_HIGH_AMOUNT, HIGH_RISK_CHANNEL_NO_KYC, NEW_ACCOUNT_HIGH_AMOUNT, ODD_HOUR_TXN,
};
use fraud_decision_engine::store::MemoryStore;
use fraud_decision_engine::types::{RawTransaction, RiskLevel};
use fraud_decision_engine::{DecisionEngine, DecisionFuser};
use proptest::prelude::*;
use std::sync::Arc;

/// Scorer returning a fixed probability
struct StubScorer(f64);

impl Scorer for StubScorer {
    fn name(&self) -> &str {
        "stub"
    }

    fn score(&self, _features: &FeatureVector) -> Result<f64, ModelError> {
        Ok(self.0)
    }
}

fn engine(scorer: Arc<dyn Scorer>) -> (DecisionEngine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = DecisionEngine::new(&AppConfig::default(), scorer, store.clone());
    (engine, store)
}

fn scenario_a() -> RawTransaction {
    let mut tx = RawTransaction::new("CUST001", 500.0, "mobile", "2024-03-06T14:00:00");
    tx.account_age_days = 400;
    tx
}

fn scenario_b() -> RawTransaction {
    RawTransaction {
        customer_id: "CUST002".to_string(),
        kyc_verified: 0,
        account_age_days: 2,
        transaction_amount: 15_000.0,
        channel: "international".to_string(),
        timestamp: "2024-03-06T03:00:00".to_string(),
    }
}

#[tokio::test]
async fn scenario_a_model_score_alone() {
    let (engine, store) = engine(Arc::new(StubScorer(0.23)));
    let tx = scenario_a();

    let assessment = engine.evaluate(&tx).await.unwrap();
    assert!(assessment.rule_triggers.is_empty());
    assert_eq!(assessment.decision.risk_score(), 0.23);
    assert!(!assessment.decision.is_fraud());
    assert_eq!(assessment.decision.ml_reason(), ML_NEGATIVE_REASON);
    assert!(assessment.alert.is_none());

    assert!(engine.persist(&tx, &assessment).await);
    assert_eq!(store.predictions().len(), 1);
    assert!(store.alerts().is_empty());
}

#[tokio::test]
async fn scenario_b_rules_flag_and_alert() {
    let (engine, store) = engine(Arc::new(StubScorer(0.05)));
    let tx = scenario_b();

    let assessment = engine.evaluate(&tx).await.unwrap();
    let fired: Vec<&str> = assessment
        .rule_triggers
        .iter()
        .map(|t| t.rule.as_str())
        .collect();
    assert_eq!(
        fired,
        vec![HIGH_RISK_CHANNEL_NO_KYC, ODD_HOUR_TXN, NEW_ACCOUNT_HIGH_AMOUNT]
    );
    assert!(assessment.decision.risk_score() >= 0.8);
    assert_eq!(assessment.decision.risk_score(), 1.0);
    assert!(assessment.decision.is_fraud());
    assert_eq!(assessment.decision.ml_reason(), ML_NEGATIVE_REASON);

    let alert = assessment.alert.clone().unwrap();
    assert_eq!(alert.transaction_id, "CUST002_2024-03-06T03:00:00");
    assert_eq!(alert.risk_level, RiskLevel::Critical);

    assert!(engine.persist(&tx, &assessment).await);
    assert_eq!(store.alerts().len(), 1);
    assert_eq!(store.predictions()[0].rule_triggers.len(), 3);
}

#[tokio::test]
async fn scenario_c_missing_model_falls_back_to_rules() {
    let dir = tempfile::tempdir().unwrap();
    let config = ModelConfig {
        path: dir.path().join("missing.onnx"),
        schema_path: dir.path().join("missing.json"),
        ..ModelConfig::default()
    };
    let scorer = ModelLoader::default().load_scorer(&config).unwrap();
    let (engine, _store) = engine(scorer);

    let tx = scenario_b();
    let assessment = engine.evaluate(&tx).await.unwrap();
    assert_eq!(assessment.model, ModelSignal::Unavailable);
    assert_eq!(assessment.decision.ml_reason(), ML_UNAVAILABLE_REASON);
    assert_eq!(assessment.decision.risk_score(), 1.0);
    assert!(assessment.decision.is_fraud());

    let quiet = engine.evaluate(&scenario_a()).await.unwrap();
    assert_eq!(quiet.decision.risk_score(), 0.0);
    assert!(!quiet.decision.is_fraud());
}

#[tokio::test]
async fn evaluation_is_idempotent() {
    let (engine, _store) = engine(Arc::new(StubScorer(0.42)));

    for tx in [scenario_a(), scenario_b()] {
        let first = engine.evaluate(&tx).await.unwrap();
        let second = engine.evaluate(&tx).await.unwrap();
        assert_eq!(first.decision, second.decision);
        assert_eq!(first.rule_triggers, second.rule_triggers);
    }
}

#[tokio::test]
async fn flagged_transaction_alerts_below_alert_threshold() {
    let (engine, _store) = engine(Arc::new(StubScorer(0.60)));

    let assessment = engine.evaluate(&scenario_a()).await.unwrap();
    assert_eq!(assessment.decision.risk_score(), 0.60);
    assert!(assessment.decision.is_fraud());
    let alert = assessment.alert.unwrap();
    assert_eq!(alert.risk_level, RiskLevel::Medium);
}

fn transaction_strategy() -> impl Strategy<Value = RawTransaction> {
    (
        0u8..=1,
        0u32..5_000,
        0.0f64..1_000_000.0,
        prop::sample::select(vec!["atm", "mobile", "pos", "web", "international", "wire"]),
        1u32..=28,
        0u32..24,
        0u32..60,
    )
        .prop_map(|(kyc, age, amount, channel, day, hour, minute)| RawTransaction {
            customer_id: "CUST-P".to_string(),
            kyc_verified: kyc,
            account_age_days: age,
            transaction_amount: amount,
            channel: channel.to_string(),
            timestamp: format!("2024-02-{:02}T{:02}:{:02}:00", day, hour, minute),
        })
}

proptest! {
    #[test]
    fn fused_score_is_max_of_signals(model in 0.0f64..=1.0, rule in 0.0f64..=1.0, model_flag: bool) {
        let signal = ModelSignal::Scored(ModelVerdict { probability: model, is_fraud: model_flag });
        let decision = DecisionFuser::default().decide(rule, vec!["r".to_string()], signal);

        prop_assert_eq!(decision.risk_score(), model.max(rule));
        prop_assert_eq!(decision.is_fraud(), model.max(rule) >= 0.5);
        // the ML reason follows the model's own prediction, whatever the verdict
        prop_assert_eq!(decision.ml_reason() == ML_POSITIVE_REASON, model_flag);
    }

    #[test]
    fn amount_above_ceiling_always_fires(mut tx in transaction_strategy(), excess in 0.01f64..1e9) {
        tx.transaction_amount = 200_000.0 + excess;
        let features = FeatureExtractor::default().transform(&tx).unwrap();
        let outcome = RuleEngine::new(&RuleConfig::default()).evaluate(&tx, &features, None);

        prop_assert!(outcome.fired(ABSOLUTE_HIGH_AMOUNT));
        prop_assert!(outcome.score >= 0.5);
    }

    #[test]
    fn feature_schema_is_stable(tx in transaction_strategy()) {
        let features = FeatureExtractor::default().transform(&tx).unwrap();
        let names: Vec<&str> = features.iter().map(|(name, _)| name).collect();

        prop_assert_eq!(features.len(), FEATURE_COUNT);
        prop_assert_eq!(names, FEATURE_NAMES.to_vec());
    }
}
