//! Business rule evaluation.
//!
//! Rules are independent predicates over the transaction, its features and the
//! optional customer profile. Every rule runs on every transaction; a failing
//! rule is logged and contributes nothing. The rule score is the saturating
//! sum of the fired rules' severity scores.

use crate::config::{RuleConfig, SeverityScores};
use crate::error::RuleError;
use crate::feature_extractor::{Feature, FeatureVector};
use crate::profiles::CustomerProfile;
use crate::types::decision::{RuleTrigger, Severity};
use crate::types::transaction::RawTransaction;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

pub const HIGH_AMOUNT_VS_AVG: &str = "HIGH_AMOUNT_VS_AVG";
pub const HIGH_RISK_CHANNEL_NO_KYC: &str = "HIGH_RISK_CHANNEL_NO_KYC";
pub const ODD_HOUR_TXN: &str = "ODD_HOUR_TXN";
pub const NEW_ACCOUNT_HIGH_AMOUNT: &str = "NEW_ACCOUNT_HIGH_AMOUNT";
pub const ABSOLUTE_HIGH_AMOUNT: &str = "ABSOLUTE_HIGH_AMOUNT";

/// Everything a rule may look at
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub transaction: &'a RawTransaction,
    pub features: &'a FeatureVector,
    pub profile: Option<&'a CustomerProfile>,
}

/// A single business rule.
pub trait Rule: Send + Sync {
    fn id(&self) -> &str;

    fn severity(&self) -> Severity;

    /// Returns the reason text when the rule fires.
    fn check(&self, ctx: &RuleContext<'_>) -> Result<Option<String>, RuleError>;
}

/// Predicates of the built-in rule table
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// amount > multiplier x customer average; skipped without an average
    AmountVsAverage { multiplier: f64 },
    /// channel in the risky set and KYC not verified
    RiskyChannelWithoutKyc { channels: Vec<String> },
    /// start <= hour <= end
    OddHour { start: u32, end: u32 },
    /// account younger than `max_age_days` moving more than `min_amount`
    NewAccountHighAmount { max_age_days: u32, min_amount: f64 },
    /// amount > ceiling
    AbsoluteHighAmount { ceiling: f64 },
}

/// Row of the built-in rule table
#[derive(Debug, Clone, PartialEq)]
pub struct TableRule {
    id: &'static str,
    severity: Severity,
    predicate: Predicate,
}

impl TableRule {
    pub fn new(id: &'static str, severity: Severity, predicate: Predicate) -> Self {
        Self {
            id,
            severity,
            predicate,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

impl Rule for TableRule {
    fn id(&self) -> &str {
        self.id
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn check(&self, ctx: &RuleContext<'_>) -> Result<Option<String>, RuleError> {
        let amount = ctx.transaction.transaction_amount;

        match &self.predicate {
            Predicate::AmountVsAverage { multiplier } => {
                let avg = match ctx.profile.and_then(|p| p.avg_txn_amount) {
                    Some(avg) => avg,
                    None => return Ok(None),
                };
                if avg.is_nan() {
                    return Err(RuleError::new(self.id, "customer average is NaN"));
                }
                if avg <= 0.0 {
                    return Ok(None);
                }
                Ok((amount > avg * multiplier).then(|| {
                    format!(
                        "Transaction amount {} is > {}x customer's avg {}",
                        amount, multiplier, avg
                    )
                }))
            }
            Predicate::RiskyChannelWithoutKyc { channels } => {
                let channel = ctx.transaction.channel_normalized();
                let risky = channels.iter().any(|c| c.eq_ignore_ascii_case(&channel));
                Ok((risky && !ctx.transaction.is_kyc_verified()).then(|| {
                    format!("High-risk channel '{}' with KYC not verified", channel)
                }))
            }
            Predicate::OddHour { start, end } => {
                let hour = ctx.features[Feature::Hour];
                if !(0.0..24.0).contains(&hour) || hour.fract() != 0.0 {
                    return Err(RuleError::new(self.id, format!("invalid hour feature {}", hour)));
                }
                let hour = hour as u32;
                Ok((*start..=*end)
                    .contains(&hour)
                    .then(|| format!("Transaction at odd hour: {}:00", hour)))
            }
            Predicate::NewAccountHighAmount {
                max_age_days,
                min_amount,
            } => {
                let age = ctx.transaction.account_age_days;
                Ok((age < *max_age_days && amount > *min_amount).then(|| {
                    format!(
                        "Account age {} days and amount {} is high for new account",
                        age, amount
                    )
                }))
            }
            Predicate::AbsoluteHighAmount { ceiling } => Ok((amount > *ceiling).then(|| {
                format!(
                    "Transaction amount {} exceeds absolute threshold {}",
                    amount, ceiling
                )
            })),
        }
    }
}

/// The unified baseline rule table, in evaluation order.
pub fn baseline_rules(config: &RuleConfig) -> Vec<TableRule> {
    vec![
        TableRule::new(
            HIGH_AMOUNT_VS_AVG,
            Severity::High,
            Predicate::AmountVsAverage {
                multiplier: config.avg_multiplier,
            },
        ),
        TableRule::new(
            HIGH_RISK_CHANNEL_NO_KYC,
            Severity::High,
            Predicate::RiskyChannelWithoutKyc {
                channels: config
                    .risky_channels
                    .iter()
                    .map(|c| c.trim().to_ascii_lowercase())
                    .collect(),
            },
        ),
        TableRule::new(
            ODD_HOUR_TXN,
            Severity::Medium,
            Predicate::OddHour {
                start: config.odd_hour_start,
                end: config.odd_hour_end,
            },
        ),
        TableRule::new(
            NEW_ACCOUNT_HIGH_AMOUNT,
            Severity::Medium,
            Predicate::NewAccountHighAmount {
                max_age_days: config.young_account_days,
                min_amount: config.new_account_amount,
            },
        ),
        TableRule::new(
            ABSOLUTE_HIGH_AMOUNT,
            Severity::High,
            Predicate::AbsoluteHighAmount {
                ceiling: config.absolute_ceiling,
            },
        ),
    ]
}

/// Result of running the rule set over one transaction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutcome {
    /// Fired rules in evaluation order
    pub triggers: Vec<RuleTrigger>,
    /// Saturating sum of severity scores, in [0, 1]
    pub score: f64,
    /// Rules that failed and were skipped
    pub failures: Vec<RuleError>,
}

impl RuleOutcome {
    pub fn triggered_ids(&self) -> Vec<String> {
        self.triggers.iter().map(|t| t.rule.clone()).collect()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.triggers.iter().map(|t| t.reason.clone()).collect()
    }

    pub fn fired(&self, rule: &str) -> bool {
        self.triggers.iter().any(|t| t.rule == rule)
    }
}

/// Ordered, read-only set of rules
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
    severity_scores: SeverityScores,
}

impl RuleEngine {
    /// Rule engine with the baseline table
    pub fn new(config: &RuleConfig) -> Self {
        let rules = baseline_rules(config)
            .into_iter()
            .map(|r| Box::new(r) as Box<dyn Rule>)
            .collect();
        Self {
            rules,
            severity_scores: config.severity_scores.clone(),
        }
    }

    /// Rule engine without any rules
    pub fn empty(severity_scores: SeverityScores) -> Self {
        Self {
            rules: Vec::new(),
            severity_scores,
        }
    }

    /// Append a rule; it is evaluated after the existing ones.
    pub fn with_rule(mut self, rule: Box<dyn Rule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rule_ids(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate every rule against the transaction.
    pub fn evaluate(
        &self,
        transaction: &RawTransaction,
        features: &FeatureVector,
        profile: Option<&CustomerProfile>,
    ) -> RuleOutcome {
        let ctx = RuleContext {
            transaction,
            features,
            profile,
        };
        let mut outcome = RuleOutcome::default();
        let mut score = 0.0;

        for rule in &self.rules {
            let checked = catch_unwind(AssertUnwindSafe(|| rule.check(&ctx)))
                .unwrap_or_else(|panic| Err(RuleError::new(rule.id(), panic_message(&*panic))));
            match checked {
                Ok(Some(reason)) => {
                    score += self.severity_scores.score(rule.severity());
                    outcome.triggers.push(RuleTrigger {
                        rule: rule.id().to_string(),
                        reason,
                        severity: rule.severity(),
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        customer_id = %transaction.customer_id,
                        rule = %rule.id(),
                        error = %e,
                        "Rule evaluation failed, skipping"
                    );
                    outcome.failures.push(e);
                }
            }
        }

        outcome.score = score.min(1.0);

        debug!(
            customer_id = %transaction.customer_id,
            fired = outcome.triggers.len(),
            rule_score = outcome.score,
            "Rules evaluated"
        );

        outcome
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("rules", &self.rule_ids())
            .field("severity_scores", &self.severity_scores)
            .finish()
    }
}
