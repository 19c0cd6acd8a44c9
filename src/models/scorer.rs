//! Classifier capability consumed by the decision engine

use crate::error::ModelError;
use crate::feature_extractor::FeatureVector;

/// Probability above which a plain probability is read as a positive prediction
pub const DEFAULT_DECISION_BOUNDARY: f64 = 0.5;

/// Output of one model call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelVerdict {
    /// Fraud probability in [0, 1]
    pub probability: f64,
    /// The model's own binary prediction
    pub is_fraud: bool,
}

/// Opaque binary fraud classifier.
///
/// Implementations are shared across concurrent evaluations and must be
/// read-only after construction.
pub trait Scorer: Send + Sync {
    fn name(&self) -> &str;

    /// Fraud probability for the feature vector.
    fn score(&self, features: &FeatureVector) -> Result<f64, ModelError>;

    /// Binary prediction for the feature vector.
    fn predict(&self, features: &FeatureVector) -> Result<bool, ModelError> {
        Ok(self.score(features)? > DEFAULT_DECISION_BOUNDARY)
    }

    /// Probability and prediction together. Backends that get both from one
    /// inference run should override this.
    fn assess(&self, features: &FeatureVector) -> Result<ModelVerdict, ModelError> {
        Ok(ModelVerdict {
            probability: self.score(features)?,
            is_fraud: self.predict(features)?,
        })
    }
}

/// Stand-in used when the classifier could not be loaded at startup.
#[derive(Debug, Clone)]
pub struct UnavailableScorer {
    reason: String,
}

impl UnavailableScorer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl Scorer for UnavailableScorer {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn score(&self, _features: &FeatureVector) -> Result<f64, ModelError> {
        Err(ModelError::Unavailable(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::FeatureExtractor;
    use crate::types::RawTransaction;

    struct Constant(f64);

    impl Scorer for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn score(&self, _features: &FeatureVector) -> Result<f64, ModelError> {
            Ok(self.0)
        }
    }

    fn features() -> FeatureVector {
        FeatureExtractor::default()
            .transform(&RawTransaction::new("C-1", 10.0, "pos", "2024-03-06T12:00:00"))
            .unwrap()
    }

    #[test]
    fn test_default_predict_uses_boundary() {
        assert!(!Constant(0.5).predict(&features()).unwrap());
        assert!(Constant(0.51).predict(&features()).unwrap());

        let verdict = Constant(0.9).assess(&features()).unwrap();
        assert_eq!(verdict, ModelVerdict { probability: 0.9, is_fraud: true });
    }

    #[test]
    fn test_unavailable_scorer_always_fails() {
        let scorer = UnavailableScorer::new("model file missing");
        assert_eq!(
            scorer.score(&features()),
            Err(ModelError::Unavailable("model file missing".to_string()))
        );
        assert!(scorer.predict(&features()).is_err());
        assert!(scorer.assess(&features()).is_err());
    }
}
