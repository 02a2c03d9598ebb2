//! Error types for the predictive maintenance pipeline

use std::collections::BTreeSet;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, MaintenanceError>;

/// Main error type for training and serving
#[derive(Error, Debug)]
pub enum MaintenanceError {
    /// A required raw column is absent or mistyped at ingestion
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// A record carries values the pipeline cannot process (zero rpm, NaN, ...)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// No candidate model family could be fit
    #[error("Training convergence failure: {0}")]
    TrainingConvergenceFailure(String),

    /// A bundle part is missing or disagrees with the others
    #[error("Bundle consistency error: {0}")]
    BundleConsistencyError(String),

    /// An inference request omits features required by the bundle
    #[error("Missing features in record {row}: {}", format_missing(.missing))]
    MissingFeatureError {
        row: usize,
        missing: BTreeSet<String>,
    },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },
}

fn format_missing(missing: &BTreeSet<String>) -> String {
    let names: Vec<String> = missing.iter().map(|m| format!("{:?}", m)).collect();
    format!("{{{}}}", names.join(", "))
}

impl MaintenanceError {
    /// Missing feature names, if this is a `MissingFeatureError`
    pub fn missing_features(&self) -> Option<&BTreeSet<String>> {
        match self {
            MaintenanceError::MissingFeatureError { missing, .. } => Some(missing),
            _ => None,
        }
    }

    /// Whether the error is fatal to a training run
    pub fn is_fatal_to_training(&self) -> bool {
        !matches!(self, MaintenanceError::MissingFeatureError { .. })
    }
}

impl From<polars::error::PolarsError> for MaintenanceError {
    fn from(err: polars::error::PolarsError) -> Self {
        MaintenanceError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for MaintenanceError {
    fn from(err: serde_json::Error) -> Self {
        MaintenanceError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for MaintenanceError {
    fn from(err: ndarray::ShapeError) -> Self {
        MaintenanceError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
