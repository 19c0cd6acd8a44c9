//! Per-transaction decision flow.
//!
//! raw transaction -> features -> {rules, model} -> fusion -> alert policy.
//! Rules and model run side by side. The model call and every persistence
//! write are bounded by timeouts, and their failures only degrade the result:
//! a missing model score means rule-only scoring, and a failed write is
//! logged and dropped.
//!
//! A timed-out model call keeps running on the blocking pool, so the number
//! of calls in flight is capped by a semaphore. When every slot is taken the
//! model counts as unavailable. Background persistence started by
//! [`DecisionEngine::process`] is tracked and drained by
//! [`DecisionEngine::shutdown`].

use crate::alerting::AlertEmitter;
use crate::config::AppConfig;
use crate::decision::{DecisionFuser, ModelSignal};
use crate::error::{DecisionError, ExplainError, ModelError, StoreError};
use crate::explain::{placeholder, Explainer, ExplanationRequest};
use crate::feature_extractor::{FeatureExtractor, FeatureVector};
use crate::metrics::PipelineMetrics;
use crate::models::{ModelVerdict, Scorer};
use crate::profiles::{NoProfiles, ProfileProvider};
use crate::rules::RuleEngine;
use crate::store::Store;
use crate::types::{AlertRecord, DecisionResult, PredictionRecord, RawTransaction, RuleTrigger};
use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

/// Everything produced for one transaction
#[derive(Debug, Clone)]
pub struct Assessment {
    pub decision: DecisionResult,
    /// Fired rules in evaluation order
    pub rule_triggers: Vec<RuleTrigger>,
    /// What the model contributed
    pub model: ModelSignal,
    /// Alert to persist, when the alerting policy fired
    pub alert: Option<AlertRecord>,
    pub explanation: Option<String>,
}

/// Decision engine. Read-only after construction; share it behind an `Arc`.
pub struct DecisionEngine {
    extractor: FeatureExtractor,
    rules: RuleEngine,
    fuser: DecisionFuser,
    emitter: AlertEmitter,
    scorer: Arc<dyn Scorer>,
    profiles: Arc<dyn ProfileProvider>,
    store: Arc<dyn Store>,
    explainer: Option<Arc<dyn Explainer>>,
    metrics: Arc<PipelineMetrics>,
    /// One permit per model call in flight
    scoring_slots: Arc<Semaphore>,
    max_pending_scorings: usize,
    /// Background persistence started by `process`
    persisting: Mutex<JoinSet<()>>,
    closed: AtomicBool,
    model_timeout: Duration,
    persist_timeout: Duration,
    explain_timeout: Duration,
}

impl DecisionEngine {
    /// Engine with the baseline rule table, no profiles and no explainer
    pub fn new(config: &AppConfig, scorer: Arc<dyn Scorer>, store: Arc<dyn Store>) -> Self {
        let max_pending_scorings = config.pipeline.max_pending_scorings.max(1);
        Self {
            extractor: FeatureExtractor::new(config.features.clone()),
            rules: RuleEngine::new(&config.rules),
            fuser: DecisionFuser::new(config.decision.flag_threshold),
            emitter: AlertEmitter::from_config(&config.decision),
            scorer,
            profiles: Arc::new(NoProfiles),
            store,
            explainer: None,
            metrics: Arc::new(PipelineMetrics::new()),
            scoring_slots: Arc::new(Semaphore::new(max_pending_scorings)),
            max_pending_scorings,
            persisting: Mutex::new(JoinSet::new()),
            closed: AtomicBool::new(false),
            model_timeout: Duration::from_millis(config.pipeline.model_timeout_ms),
            persist_timeout: Duration::from_millis(config.pipeline.persist_timeout_ms),
            explain_timeout: Duration::from_millis(config.pipeline.explain_timeout_ms),
        }
    }

    pub fn with_profiles(mut self, profiles: Arc<dyn ProfileProvider>) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_explainer(mut self, explainer: Arc<dyn Explainer>) -> Self {
        self.explainer = Some(explainer);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Replace the baseline rule table
    pub fn with_rules(mut self, rules: RuleEngine) -> Self {
        self.rules = rules;
        self
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    pub fn scorer_name(&self) -> &str {
        self.scorer.name()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Model calls currently running or queued on the blocking pool
    pub fn pending_scorings(&self) -> usize {
        self.max_pending_scorings - self.scoring_slots.available_permits()
    }

    /// Decide on one transaction without persisting anything.
    pub async fn evaluate(&self, raw: &RawTransaction) -> Result<Assessment, DecisionError> {
        let start = Instant::now();

        if let Err(e) = raw.validate() {
            self.metrics.record_malformed_input();
            warn!(customer_id = %raw.customer_id, error = %e, "Rejected malformed transaction");
            return Err(e);
        }

        let profile = self.profiles.profile(&raw.customer_id);
        let features = self
            .extractor
            .transform_with_profile(raw, profile.as_ref())?;

        let scoring = self.spawn_scoring(features);
        let rules = self.rules.evaluate(raw, &features, profile.as_ref());
        let model = self.await_scoring(scoring, &raw.customer_id).await;

        if !rules.failures.is_empty() {
            self.metrics.record_rule_failures(rules.failures.len());
        }

        let decision = self.fuser.decide(rules.score, rules.reasons(), model);
        let alert = self.emitter.maybe_emit(raw, &decision, &rules.triggers);
        let explanation = self.explain(raw, &decision).await;

        let processing_time = start.elapsed();
        self.metrics
            .record_decision(processing_time, decision.risk_score(), decision.is_fraud());

        if let Some(alert) = &alert {
            self.metrics.record_alert(alert.risk_level.as_str());
            info!(
                customer_id = %raw.customer_id,
                transaction_id = %alert.transaction_id,
                risk_score = decision.risk_score(),
                risk_level = ?alert.risk_level,
                processing_time_us = processing_time.as_micros(),
                "Fraud alert emitted"
            );
        } else {
            debug!(
                customer_id = %raw.customer_id,
                risk_score = decision.risk_score(),
                is_fraud = decision.is_fraud(),
                processing_time_us = processing_time.as_micros(),
                "Transaction decided"
            );
        }

        Ok(Assessment {
            decision,
            rule_triggers: rules.triggers,
            model,
            alert,
            explanation,
        })
    }

    /// Write the audit record and, when present, the alert. Failures are
    /// logged and counted. Returns whether every write succeeded.
    pub async fn persist(&self, raw: &RawTransaction, assessment: &Assessment) -> bool {
        let record = PredictionRecord {
            transaction: raw.clone(),
            decision: assessment.decision.clone(),
            rule_triggers: assessment
                .rule_triggers
                .iter()
                .map(|t| t.rule.clone())
                .collect(),
            rule_details: assessment.rule_triggers.clone(),
            explanation: assessment.explanation.clone(),
            processed_at: Utc::now(),
        };

        let mut ok = true;

        if let Err(e) = self
            .bounded_write(self.store.record_prediction(&record))
            .await
        {
            ok = false;
            self.metrics.record_persistence_failure();
            error!(customer_id = %raw.customer_id, error = %e, "Failed to persist prediction record");
        }

        if let Some(alert) = &assessment.alert {
            if let Err(e) = self.bounded_write(self.store.record_alert(alert)).await {
                ok = false;
                self.metrics.record_persistence_failure();
                error!(
                    alert_id = %alert.alert_id,
                    transaction_id = %alert.transaction_id,
                    error = %e,
                    "Failed to persist fraud alert"
                );
            }
        }

        ok
    }

    /// Decide, then persist in the background without waiting for it.
    /// After [`shutdown`](Self::shutdown) persistence runs inline instead.
    pub async fn process(self: &Arc<Self>, raw: RawTransaction) -> Result<Assessment, DecisionError> {
        let assessment = self.evaluate(&raw).await?;

        if self.closed.load(Ordering::Acquire) {
            self.persist(&raw, &assessment).await;
            return Ok(assessment);
        }

        let engine = Arc::clone(self);
        let to_persist = assessment.clone();
        let mut persisting = self.persisting.lock().unwrap_or_else(|e| e.into_inner());
        // reap finished writes so the set only holds pending ones
        while persisting.try_join_next().is_some() {}
        persisting.spawn(async move {
            engine.persist(&raw, &to_persist).await;
        });

        Ok(assessment)
    }

    /// Background writes not yet finished
    pub fn pending_persistence(&self) -> usize {
        let mut persisting = self.persisting.lock().unwrap_or_else(|e| e.into_inner());
        while persisting.try_join_next().is_some() {}
        persisting.len()
    }

    /// Stop backgrounding persistence and wait up to `grace` for the writes
    /// already started. Writes still pending after that are aborted, logged
    /// and counted as persistence failures. Returns how many were abandoned.
    pub async fn shutdown(&self, grace: Duration) -> usize {
        self.closed.store(true, Ordering::Release);
        let mut pending = {
            let mut persisting = self.persisting.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *persisting)
        };

        info!(pending = pending.len(), "Draining background persistence");
        let _ = tokio::time::timeout(grace, async {
            while pending.join_next().await.is_some() {}
        })
        .await;

        let abandoned = pending.len();
        if abandoned > 0 {
            for _ in 0..abandoned {
                self.metrics.record_persistence_failure();
            }
            error!(
                abandoned,
                grace_ms = grace.as_millis() as u64,
                "Background persistence did not finish before shutdown"
            );
            pending.abort_all();
        }
        abandoned
    }

    fn spawn_scoring(
        &self,
        features: FeatureVector,
    ) -> Result<JoinHandle<Result<ModelVerdict, ModelError>>, ModelError> {
        let permit = Arc::clone(&self.scoring_slots)
            .try_acquire_owned()
            .map_err(|_| {
                ModelError::Unavailable(format!(
                    "{} model calls already in flight",
                    self.max_pending_scorings
                ))
            })?;
        let scorer = Arc::clone(&self.scorer);
        Ok(tokio::task::spawn_blocking(move || {
            // held until the call returns, even if the caller stopped waiting
            let _permit = permit;
            scorer.assess(&features)
        }))
    }

    async fn await_scoring(
        &self,
        scoring: Result<JoinHandle<Result<ModelVerdict, ModelError>>, ModelError>,
        customer_id: &str,
    ) -> ModelSignal {
        let result = match scoring {
            Ok(handle) => match tokio::time::timeout(self.model_timeout, handle).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => Err(ModelError::Inference(join_error.to_string())),
                Err(_) => Err(ModelError::Timeout(self.model_timeout.as_millis() as u64)),
            },
            Err(e) => Err(e),
        };

        match result.and_then(check_probability) {
            Ok(verdict) => ModelSignal::Scored(verdict),
            Err(e) => {
                self.metrics.record_model_fallback();
                warn!(
                    customer_id = %customer_id,
                    scorer = %self.scorer.name(),
                    error = %e,
                    "Model score unavailable, falling back to rules only"
                );
                ModelSignal::Unavailable
            }
        }
    }

    async fn explain(&self, raw: &RawTransaction, decision: &DecisionResult) -> Option<String> {
        let explainer = self.explainer.as_ref()?;
        let request = ExplanationRequest {
            transaction: raw.clone(),
            ml_reason: decision.ml_reason().to_string(),
            rule_reasons: decision.rule_reasons().to_vec(),
            is_fraud: decision.is_fraud(),
            risk_score: decision.risk_score(),
        };

        let result = match tokio::time::timeout(self.explain_timeout, explainer.explain(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ExplainError::Timeout(self.explain_timeout.as_millis() as u64)),
        };

        Some(result.unwrap_or_else(|e| {
            warn!(customer_id = %raw.customer_id, error = %e, "Explanation generation failed");
            placeholder(&e)
        }))
    }

    async fn bounded_write<F>(&self, write: F) -> Result<(), StoreError>
    where
        F: Future<Output = Result<(), StoreError>>,
    {
        match tokio::time::timeout(self.persist_timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.persist_timeout.as_millis() as u64)),
        }
    }
}

fn check_probability(verdict: ModelVerdict) -> Result<ModelVerdict, ModelError> {
    if (0.0..=1.0).contains(&verdict.probability) {
        Ok(verdict)
    } else {
        Err(ModelError::InvalidOutput(verdict.probability))
    }
}
