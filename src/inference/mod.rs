//! Prediction serving over a persisted model bundle

mod engine;

pub use engine::{predict, FeatureVector, InferenceService, PredictionResult};
