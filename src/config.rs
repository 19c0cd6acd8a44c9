//! Configuration management for the decision engine

use crate::types::{RiskLevelThresholds, Severity};
use anyhow::{ensure, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub nats: NatsConfig,
    pub model: ModelConfig,
    pub features: FeatureConfig,
    pub rules: RuleConfig,
    pub decision: DecisionConfig,
    pub pipeline: PipelineConfig,
    pub profiles: ProfilesConfig,
    pub logging: LoggingConfig,
}

/// NATS connection configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// NATS server URL
    pub url: String,
    /// Subject for incoming transactions
    pub transaction_subject: String,
    /// Subject for prediction audit records
    pub prediction_subject: String,
    /// Subject for fraud alerts
    pub alert_subject: String,
    /// Queue group shared by all workers
    pub queue_group: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            transaction_subject: "transactions".to_string(),
            prediction_subject: "fraud.predictions".to_string(),
            alert_subject: "fraud.alerts".to_string(),
            queue_group: "fraud-decision".to_string(),
        }
    }
}

/// Classifier configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// ONNX model file
    pub path: PathBuf,
    /// JSON list of feature names in training order
    pub schema_path: PathBuf,
    /// Number of threads for ONNX inference
    pub onnx_threads: usize,
    /// Probability above which the model's own prediction is positive
    pub decision_boundary: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/random_forest.onnx"),
            schema_path: PathBuf::from("models/feature_schema.json"),
            onnx_threads: 1,
            decision_boundary: 0.5,
        }
    }
}

/// Feature transformer configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Amount above which `high_amount_flag` is set
    pub high_amount_threshold: f64,
    /// Used when no customer profile is available
    pub default_avg_txn: f64,
    pub default_txn_count: f64,
    pub default_amt_deviation: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            high_amount_threshold: 10_000.0,
            default_avg_txn: 0.12,
            default_txn_count: 5.0,
            default_amt_deviation: 0.03,
        }
    }
}

/// Score contributed by each severity tier
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeverityScores {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl SeverityScores {
    pub fn score(&self, severity: Severity) -> f64 {
        match severity {
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

impl Default for SeverityScores {
    fn default() -> Self {
        Self {
            high: 0.5,
            medium: 0.3,
            low: 0.1,
        }
    }
}

/// Business rule thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    /// Amount / customer average ratio that triggers `HIGH_AMOUNT_VS_AVG`
    pub avg_multiplier: f64,
    /// Channels considered risky for unverified customers (lower-case)
    pub risky_channels: Vec<String>,
    /// Inclusive odd-hour window
    pub odd_hour_start: u32,
    pub odd_hour_end: u32,
    /// Accounts younger than this are "new"
    pub young_account_days: u32,
    pub new_account_amount: f64,
    /// Amount that always triggers `ABSOLUTE_HIGH_AMOUNT`
    pub absolute_ceiling: f64,
    pub severity_scores: SeverityScores,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            avg_multiplier: 5.0,
            risky_channels: vec![
                "international".to_string(),
                "intl".to_string(),
                "wire".to_string(),
                "web".to_string(),
            ],
            odd_hour_start: 2,
            odd_hour_end: 4,
            young_account_days: 7,
            new_account_amount: 1_000.0,
            absolute_ceiling: 200_000.0,
            severity_scores: SeverityScores::default(),
        }
    }
}

/// Decision and alerting thresholds
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Fused score at or above which a transaction is flagged
    pub flag_threshold: f64,
    /// Fused score above which an alert is emitted even when not flagged
    pub alert_threshold: f64,
    /// Risk level classification for alerts
    pub risk_levels: RiskLevelThresholds,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            flag_threshold: 0.50,
            alert_threshold: 0.75,
            risk_levels: RiskLevelThresholds::default(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum concurrently processed transactions
    pub workers: usize,
    /// Upper bound on a single model call
    pub model_timeout_ms: u64,
    /// Model calls allowed in flight, including ones whose caller timed out
    pub max_pending_scorings: usize,
    /// Upper bound on each persistence write
    pub persist_timeout_ms: u64,
    /// Upper bound on explanation generation
    pub explain_timeout_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            model_timeout_ms: 250,
            max_pending_scorings: 4,
            persist_timeout_ms: 1000,
            explain_timeout_ms: 2000,
        }
    }
}

/// Customer profile source
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProfilesConfig {
    /// JSON file mapping customer id to profile; profiles are absent when unset
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path, then apply `FRAUD_*` overrides
    /// (`FRAUD_DECISION__FLAG_THRESHOLD=0.6`).
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .add_source(
                Environment::with_prefix("FRAUD")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the decision path cannot honour.
    pub fn validate(&self) -> Result<()> {
        let unit = 0.0..=1.0;
        ensure!(
            unit.contains(&self.decision.flag_threshold),
            "decision.flag_threshold must be within [0, 1], got {}",
            self.decision.flag_threshold
        );
        ensure!(
            unit.contains(&self.decision.alert_threshold),
            "decision.alert_threshold must be within [0, 1], got {}",
            self.decision.alert_threshold
        );
        ensure!(
            unit.contains(&self.model.decision_boundary),
            "model.decision_boundary must be within [0, 1], got {}",
            self.model.decision_boundary
        );
        ensure!(
            self.rules.odd_hour_start <= self.rules.odd_hour_end && self.rules.odd_hour_end < 24,
            "rules.odd_hour_start..=odd_hour_end must be a window within 0-23, got {}..={}",
            self.rules.odd_hour_start,
            self.rules.odd_hour_end
        );
        let scores = &self.rules.severity_scores;
        ensure!(
            [scores.high, scores.medium, scores.low]
                .iter()
                .all(|s| unit.contains(s)),
            "rules.severity_scores must be within [0, 1]"
        );
        ensure!(self.pipeline.workers > 0, "pipeline.workers must be positive");
        ensure!(
            self.pipeline.max_pending_scorings > 0,
            "pipeline.max_pending_scorings must be positive"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.nats.url, "nats://localhost:4222");
        assert_eq!(config.decision.flag_threshold, 0.50);
        assert_eq!(config.decision.alert_threshold, 0.75);
        assert_eq!(config.features.high_amount_threshold, 10_000.0);
        assert_eq!(config.rules.absolute_ceiling, 200_000.0);
        assert_eq!((config.rules.odd_hour_start, config.rules.odd_hour_end), (2, 4));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_severity_scores() {
        let scores = SeverityScores::default();
        assert_eq!(scores.score(Severity::High), 0.5);
        assert_eq!(scores.score(Severity::Medium), 0.3);
        assert_eq!(scores.score(Severity::Low), 0.1);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[decision]\nflag_threshold = 0.6\n\n[rules]\nrisky_channels = [\"wire\"]\n"
        )
        .unwrap();

        let config = AppConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.decision.flag_threshold, 0.6);
        assert_eq!(config.decision.alert_threshold, 0.75);
        assert_eq!(config.rules.risky_channels, vec!["wire"]);
        assert_eq!(config.rules.young_account_days, 7);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let mut config = AppConfig::default();
        config.decision.flag_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.rules.odd_hour_start = 5;
        config.rules.odd_hour_end = 3;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.pipeline.workers = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.pipeline.max_pending_scorings = 0;
        assert!(config.validate().is_err());
    }
}
