//! ONNX Runtime backed classifier

use crate::error::ModelError;
use crate::feature_extractor::{FeatureVector, FEATURE_COUNT};
use crate::models::scorer::{ModelVerdict, Scorer};
use ort::memory::Allocator;
use ort::session::{Session, SessionOutputs};
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, DynValue, Tensor};
use std::sync::Mutex;
use tracing::debug;

/// Binary classifier exported to ONNX (sklearn, XGBoost, LightGBM, ...)
pub struct OnnxScorer {
    name: String,
    /// Running a session needs exclusive access
    session: Mutex<Session>,
    input_name: String,
    probability_output: String,
    label_output: Option<String>,
    decision_boundary: f64,
}

impl OnnxScorer {
    pub fn new(name: String, session: Session, decision_boundary: f64) -> Self {
        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let probability_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        let label_output = session
            .outputs
            .iter()
            .find(|o| o.name.contains("label"))
            .map(|o| o.name.clone());

        Self {
            name,
            session: Mutex::new(session),
            input_name,
            probability_output,
            label_output,
            decision_boundary,
        }
    }

    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    pub fn probability_output(&self) -> &str {
        &self.probability_output
    }

    fn run(&self, features: &FeatureVector) -> Result<ModelVerdict, ModelError> {
        let shape = vec![1_i64, FEATURE_COUNT as i64];
        let input = Tensor::from_array((shape, features.to_f32()))
            .map_err(|e| ModelError::Inference(format!("failed to create input tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ModelError::Inference("session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let probability = extract_probability(&outputs, &self.probability_output, &self.name)?;
        let label = self
            .label_output
            .as_deref()
            .and_then(|name| extract_label(&outputs, name));

        Ok(ModelVerdict {
            probability,
            is_fraud: label.unwrap_or(probability > self.decision_boundary),
        })
    }
}

impl Scorer for OnnxScorer {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, features: &FeatureVector) -> Result<f64, ModelError> {
        self.run(features).map(|v| v.probability)
    }

    fn predict(&self, features: &FeatureVector) -> Result<bool, ModelError> {
        self.run(features).map(|v| v.is_fraud)
    }

    fn assess(&self, features: &FeatureVector) -> Result<ModelVerdict, ModelError> {
        self.run(features)
    }
}

/// Fraud probability from either a `[batch, classes]` tensor or the
/// `seq(map(int64, float))` output of zipmapped sklearn/LightGBM exports.
fn extract_probability(
    outputs: &SessionOutputs,
    output_name: &str,
    model_name: &str,
) -> Result<f64, ModelError> {
    if let Some(output) = outputs.get(output_name) {
        if let Some(prob) = probability_from_value(output, model_name) {
            return Ok(prob);
        }
    }

    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Some(prob) = probability_from_value(&output, model_name) {
            debug!(model = %model_name, output = %name, "Probability read from fallback output");
            return Ok(prob);
        }
    }

    Err(ModelError::Inference(format!(
        "no probability output found on model {}",
        model_name
    )))
}

fn probability_from_value(output: &DynValue, model_name: &str) -> Option<f64> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        return fraud_class_probability(&dims, data);
    }

    let dtype = output.dtype();
    if DynSequenceValueType::can_downcast(&dtype) {
        match probability_from_sequence_map(output) {
            Ok(prob) => return Some(prob),
            Err(e) => debug!(model = %model_name, error = %e, "Sequence output unreadable"),
        }
    }

    None
}

/// Class-1 probability from a tensor of shape `[1, n]`, `[n]` or `[1, 1]`
fn fraud_class_probability(dims: &[i64], data: &[f32]) -> Option<f64> {
    let classes = match dims {
        [_, classes] | [classes] => *classes,
        _ => return data.last().map(|&v| v as f64),
    };

    match classes {
        c if c >= 2 => data.get(1).map(|&v| v as f64),
        1 => data.first().map(|&v| v as f64),
        _ => None,
    }
}

fn probability_from_sequence_map(output: &DynValue) -> Result<f64, String> {
    let allocator = Allocator::default();
    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| e.to_string())?;
    let maps = sequence
        .try_extract_sequence::<DynMapValueType>(&allocator)
        .map_err(|e| e.to_string())?;

    let Some(first) = maps.first() else {
        return Err("empty probability sequence".to_string());
    };
    let pairs = first
        .try_extract_key_values::<i64, f32>()
        .map_err(|e| e.to_string())?;

    if let Some((_, prob)) = pairs.iter().find(|(class, _)| *class == 1) {
        return Ok(*prob as f64);
    }
    if let Some((_, prob)) = pairs.iter().find(|(class, _)| *class == 0) {
        return Ok(1.0 - *prob as f64);
    }
    Err("no class probability in map".to_string())
}

fn extract_label(outputs: &SessionOutputs, label_name: &str) -> Option<bool> {
    let output = outputs.get(label_name)?;
    let (_, data) = output.try_extract_tensor::<i64>().ok()?;
    data.first().map(|&label| label == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probability_from_two_class_tensor() {
        assert_eq!(fraud_class_probability(&[1, 2], &[0.25, 0.75]), Some(0.75));
        assert_eq!(fraud_class_probability(&[2], &[0.6, 0.4]), Some(0.4_f32 as f64));
    }

    #[test]
    fn test_probability_from_single_output() {
        assert_eq!(fraud_class_probability(&[1, 1], &[0.5]), Some(0.5));
        assert_eq!(fraud_class_probability(&[1], &[0.125]), Some(0.125));
    }

    #[test]
    fn test_probability_from_unusual_shape() {
        assert_eq!(fraud_class_probability(&[1, 1, 2], &[0.1, 0.875]), Some(0.875));
        assert_eq!(fraud_class_probability(&[1, 0], &[]), None);
    }
}
