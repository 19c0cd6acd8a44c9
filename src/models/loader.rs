//! ONNX model and feature schema loader

use crate::config::ModelConfig;
use crate::error::ModelError;
use crate::feature_extractor::FEATURE_NAMES;
use crate::models::onnx::OnnxScorer;
use crate::models::scorer::{Scorer, UnavailableScorer};
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Loader for the fraud classifier
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Read the ordered feature names the model was trained on
    pub fn load_schema<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read feature schema {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Feature schema {} is not a JSON list of names", path.display()))
    }

    /// The model's schema must equal the transformer's names, in order
    pub fn verify_schema(trained_on: &[String]) -> Result<(), ModelError> {
        let matches = trained_on.len() == FEATURE_NAMES.len()
            && trained_on.iter().zip(FEATURE_NAMES.iter()).all(|(a, b)| a == b);

        if matches {
            Ok(())
        } else {
            Err(ModelError::SchemaMismatch {
                expected: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
                actual: trained_on.to_vec(),
            })
        }
    }

    /// Load an ONNX session from file
    pub fn load_session<P: AsRef<Path>>(&self, path: P) -> Result<Session> {
        let path = path.as_ref();

        info!(path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        Ok(session)
    }

    /// Build the scorer described by the configuration.
    ///
    /// A missing or unloadable model yields an [`UnavailableScorer`] so the
    /// engine can run on rules alone. A missing or mismatched schema is a
    /// configuration error and fails startup.
    pub fn load_scorer(&self, config: &ModelConfig) -> Result<Arc<dyn Scorer>> {
        if !config.path.exists() {
            warn!(
                path = %config.path.display(),
                "Model file not found, running in rule-only mode"
            );
            return Ok(Arc::new(UnavailableScorer::new(format!(
                "model file {} not found",
                config.path.display()
            ))));
        }

        let schema = Self::load_schema(&config.schema_path)?;
        Self::verify_schema(&schema)?;

        match self.load_session(&config.path) {
            Ok(session) => {
                let scorer = OnnxScorer::new(model_name(&config.path), session, config.decision_boundary);
                info!(
                    model = %scorer.name(),
                    input = %scorer.input_name(),
                    output = %scorer.probability_output(),
                    "Model loaded successfully"
                );
                Ok(Arc::new(scorer))
            }
            Err(e) => {
                warn!(error = %e, "Failed to load model, running in rule-only mode");
                Ok(Arc::new(UnavailableScorer::new(e.to_string())))
            }
        }
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self { onnx_threads: 1 }
    }
}

fn model_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string())
}
