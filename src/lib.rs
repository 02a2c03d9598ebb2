//! Predictive maintenance failure-mode classifier
//!
//! Trains a multiclass classifier on machine sensor readings and serves
//! predictions from a persisted bundle.
//!
//! # Modules
//!
//! ## Training
//! - [`data`] - Raw record schema, CSV ingestion, synthetic dataset
//! - [`preprocessing`] - Outlier removal, encoding, feature engineering, scaling
//! - [`synthetic`] - SMOTE class balancing
//! - [`training`] - Random forest and boosted tree families, cross-validation
//! - [`optimizer`] - TPE hyperparameter search
//! - [`evaluation`] - Test metrics and model selection
//! - [`pipeline`] - End-to-end training run
//!
//! ## Serving
//! - [`export`] - Atomic, checksummed bundle persistence
//! - [`inference`] - Prediction service
//! - [`cli`] - Command-line interface

pub mod error;

pub mod data;
pub mod preprocessing;
pub mod synthetic;
pub mod training;
pub mod optimizer;
pub mod evaluation;
pub mod pipeline;

pub mod export;
pub mod inference;

pub mod cli;

pub mod utils;

pub use error::{MaintenanceError, Result};
pub use export::{ArtifactStore, ModelBundle};
pub use inference::{predict, FeatureVector, InferenceService, PredictionResult};
pub use pipeline::{PipelineConfig, TrainingPipeline, TrainingRun};
