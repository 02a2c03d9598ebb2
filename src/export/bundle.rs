//! In-memory model bundle and its persisted blob schemas
//!
//! A bundle is everything needed to reproduce a prediction: the fitted
//! classifier, scaler statistics, both label encoders, the ordered feature
//! list and run metadata. All parts must agree on feature and class counts.

use crate::error::{MaintenanceError, Result};
use crate::evaluation::{ClassReport, ClassificationMetrics, ModelEvaluation};
use crate::preprocessing::{LabelEncoder, StandardScaler};
use crate::training::{Classifier, Model, ModelFamily};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Current on-disk layout version
pub const SCHEMA_VERSION: u32 = 1;

pub const MODEL_FILE: &str = "model.json";
pub const SCALER_FILE: &str = "scaler.json";
pub const GRADE_ENCODER_FILE: &str = "grade_encoder.json";
pub const FAILURE_ENCODER_FILE: &str = "failure_encoder.json";
pub const FEATURE_NAMES_FILE: &str = "feature_names.json";
pub const METADATA_FILE: &str = "metadata.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Blobs listed in every manifest, in write order
pub const BLOB_FILES: [&str; 6] = [
    MODEL_FILE,
    SCALER_FILE,
    GRADE_ENCODER_FILE,
    FAILURE_ENCODER_FILE,
    FEATURE_NAMES_FILE,
    METADATA_FILE,
];

/// Versioned envelope around every blob
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blob<T> {
    pub schema_version: u32,
    pub data: T,
}

impl<T> Blob<T> {
    pub fn new(data: T) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBlob {
    pub family: ModelFamily,
    pub n_features: usize,
    pub n_classes: usize,
    pub classifier: Classifier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerBlob {
    pub feature_names: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderBlob {
    pub classes: Vec<String>,
}

/// Written last; a bundle without a valid manifest is never read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub schema_version: u32,
    pub bundle_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub model_family: ModelFamily,
    pub feature_names: Vec<String>,
    pub n_features: usize,
    pub n_classes: usize,
    /// File name to hex SHA-256
    pub checksums: BTreeMap<String, String>,
}

/// CV outcome of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvSummary {
    pub model: String,
    pub mean: f64,
    pub std: f64,
}

/// Run metadata persisted with the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleMetadata {
    pub selected_model: String,
    pub model_family: ModelFamily,
    /// Test-set metrics of the selected model, copied verbatim from evaluation
    pub test_metrics: ClassificationMetrics,
    pub per_class: Vec<ClassReport>,
    pub confusion_matrix: Vec<Vec<usize>>,
    pub feature_importances: Option<Vec<(String, f64)>>,
    /// Every candidate's test report
    pub candidates: Vec<ModelEvaluation>,
    pub cv_summary: Vec<CvSummary>,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
    pub test_samples: usize,
    /// Rows and columns of the labelled input before outlier removal
    pub dataset_shape: (usize, usize),
    pub target_classes: Vec<String>,
    pub outliers_removed: usize,
    pub balancing_applied: bool,
    /// Non-fatal warnings raised during the run
    pub warnings: Vec<String>,
    pub random_state: u64,
}

/// Everything needed to serve predictions
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub classifier: Classifier,
    pub scaler: StandardScaler,
    pub grade_encoder: LabelEncoder,
    pub failure_encoder: LabelEncoder,
    pub feature_names: Vec<String>,
    pub metadata: BundleMetadata,
}

fn mismatch(what: &str, a: impl std::fmt::Debug, b: impl std::fmt::Debug) -> MaintenanceError {
    MaintenanceError::BundleConsistencyError(format!("{} mismatch: {:?} vs {:?}", what, a, b))
}

impl ModelBundle {
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn n_classes(&self) -> usize {
        self.failure_encoder.n_classes()
    }

    /// Check that every part agrees on features and classes
    pub fn validate(&self) -> Result<()> {
        let n_features = self.n_features();
        let n_classes = self.n_classes();

        if n_features == 0 {
            return Err(MaintenanceError::BundleConsistencyError("bundle has no features".to_string()));
        }
        if self.scaler.feature_names() != self.feature_names.as_slice() {
            return Err(mismatch("scaler feature names", self.scaler.feature_names(), &self.feature_names));
        }
        if self.classifier.n_features() != n_features {
            return Err(mismatch("model feature count", self.classifier.n_features(), n_features));
        }
        if self.classifier.n_classes() != n_classes {
            return Err(mismatch("model class count", self.classifier.n_classes(), n_classes));
        }
        if self.metadata.target_classes.as_slice() != self.failure_encoder.classes() {
            return Err(mismatch(
                "target classes",
                &self.metadata.target_classes,
                self.failure_encoder.classes(),
            ));
        }
        if self.metadata.model_family != self.classifier.family() {
            return Err(mismatch("model family", self.metadata.model_family, self.classifier.family()));
        }
        if self.grade_encoder.n_classes() == 0 {
            return Err(MaintenanceError::BundleConsistencyError("grade encoder is empty".to_string()));
        }
        Ok(())
    }
}
