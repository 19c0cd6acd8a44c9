//! Feature extraction for fraud model inference.
//!
//! Produces the fixed-order feature vector the classifier was trained on.
//! The order is part of the model contract: changing it requires retraining
//! and a matching feature schema file next to the model.

use crate::config::FeatureConfig;
use crate::error::DecisionError;
use crate::profiles::CustomerProfile;
use crate::types::transaction::{Channel, RawTransaction, TimeParts};
use std::ops::Index;

/// Number of features produced for every transaction
pub const FEATURE_COUNT: usize = 16;

/// Feature names in training order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "kyc_verified",
    "account_age_days",
    "transaction_amount",
    "hour",
    "day",
    "weekday",
    "channel_atm",
    "channel_mobile",
    "channel_pos",
    "channel_web",
    "avg_txn_per_customer",
    "txns_count_per_customer",
    "amt_deviation",
    "high_amount_flag",
    "is_night",
    "is_weekend",
];

/// Named position in the feature vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    KycVerified,
    AccountAgeDays,
    TransactionAmount,
    Hour,
    Day,
    Weekday,
    ChannelAtm,
    ChannelMobile,
    ChannelPos,
    ChannelWeb,
    AvgTxnPerCustomer,
    TxnsCountPerCustomer,
    AmtDeviation,
    HighAmountFlag,
    IsNight,
    IsWeekend,
}

impl Feature {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        FEATURE_NAMES[self.index()]
    }
}

/// Fixed-order numeric encoding of one transaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    /// Values in training order
    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    /// Model input as `f32`, the dtype ONNX classifiers are exported with
    pub fn to_f32(&self) -> Vec<f32> {
        self.values.iter().map(|&v| v as f32).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }

    pub fn len(&self) -> usize {
        FEATURE_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Index<Feature> for FeatureVector {
    type Output = f64;

    fn index(&self, feature: Feature) -> &f64 {
        &self.values[feature.index()]
    }
}

fn flag(condition: bool) -> f64 {
    if condition {
        1.0
    } else {
        0.0
    }
}

/// Transforms raw transactions into model input features.
#[derive(Debug, Clone, Default)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    /// Transform a transaction without profile data; per-customer aggregates
    /// take their configured defaults.
    pub fn transform(&self, tx: &RawTransaction) -> Result<FeatureVector, DecisionError> {
        self.transform_with_profile(tx, None)
    }

    /// Transform a transaction, filling per-customer aggregates from the
    /// profile where it has them.
    pub fn transform_with_profile(
        &self,
        tx: &RawTransaction,
        profile: Option<&CustomerProfile>,
    ) -> Result<FeatureVector, DecisionError> {
        let time = TimeParts::from(tx.parsed_timestamp()?);
        let channel = tx.channel_kind();

        let avg_txn = profile
            .and_then(|p| p.avg_txn_amount)
            .filter(|v| v.is_finite())
            .unwrap_or(self.config.default_avg_txn);
        let txn_count = profile
            .and_then(|p| p.txn_count)
            .map(|c| c as f64)
            .unwrap_or(self.config.default_txn_count);
        let amt_deviation = profile
            .and_then(|p| p.amt_deviation)
            .filter(|v| v.is_finite())
            .unwrap_or(self.config.default_amt_deviation);

        let values = [
            f64::from(tx.kyc_verified),
            f64::from(tx.account_age_days),
            tx.transaction_amount,
            f64::from(time.hour),
            f64::from(time.day),
            f64::from(time.weekday),
            flag(channel == Channel::Atm),
            flag(channel == Channel::Mobile),
            flag(channel == Channel::Pos),
            flag(channel == Channel::Web),
            avg_txn,
            txn_count,
            amt_deviation,
            flag(tx.transaction_amount > self.config.high_amount_threshold),
            flag(time.hour <= 6),
            flag(time.weekday >= 5),
        ];

        Ok(FeatureVector { values })
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in training order.
    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }
}
