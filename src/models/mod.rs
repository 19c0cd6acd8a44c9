//! ML model scoring components

pub mod loader;
pub mod onnx;
pub mod scorer;

pub use loader::ModelLoader;
pub use onnx::OnnxScorer;
pub use scorer::{ModelVerdict, Scorer, UnavailableScorer};
