//! Inference service
//!
//! Answers prediction requests against a loaded bundle:
//! - Fixed feature contract taken from the bundle's feature list
//! - Scaling with the persisted statistics
//! - Parallel batch processing via rayon
//! - Lock-free sharing of the immutable bundle through `Arc`

use crate::data::{
    RawRecord, COL_AIR_TEMPERATURE, COL_PROCESS_TEMPERATURE, COL_ROTATIONAL_SPEED, COL_TOOL_WEAR, COL_TORQUE,
    ENGINEERED_FEATURES, FEAT_TYPE_ENCODED,
};
use crate::error::{MaintenanceError, Result};
use crate::export::{ArtifactStore, ModelBundle};
use crate::preprocessing::{engineer, LabelEncoder};
use crate::training::{argmax, Model};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Feature name to value mapping for one request row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(HashMap<String, f64>);

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive all eleven model features from a raw sensor reading
    pub fn from_reading(record: &RawRecord, grade_encoder: &LabelEncoder) -> Result<Self> {
        let engineered = engineer(record, 0)?;
        let grade = grade_encoder.transform(record.machine_grade.code())?;

        let mut values = HashMap::with_capacity(11);
        values.insert(COL_AIR_TEMPERATURE.to_string(), record.air_temperature);
        values.insert(COL_PROCESS_TEMPERATURE.to_string(), record.process_temperature);
        values.insert(COL_ROTATIONAL_SPEED.to_string(), record.rotational_speed);
        values.insert(COL_TORQUE.to_string(), record.torque);
        values.insert(COL_TOOL_WEAR.to_string(), record.tool_wear);
        values.insert(FEAT_TYPE_ENCODED.to_string(), grade as f64);
        for (name, value) in ENGINEERED_FEATURES.iter().zip(engineered.values()) {
            values.insert(name.to_string(), value);
        }
        Ok(Self(values))
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn remove(&mut self, name: &str) -> Option<f64> {
        self.0.remove(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &HashMap<String, f64> {
        &self.0
    }

    pub fn into_map(self) -> HashMap<String, f64> {
        self.0
    }
}

impl From<HashMap<String, f64>> for FeatureVector {
    fn from(values: HashMap<String, f64>) -> Self {
        Self(values)
    }
}

/// Decoded prediction for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub label: String,
    /// `(label, probability)` for every known failure mode, in label-index order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<Vec<(String, f64)>>,
}

impl PredictionResult {
    pub fn probability_of(&self, label: &str) -> Option<f64> {
        self.probabilities
            .as_ref()?
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, p)| *p)
    }
}

/// Serves predictions from an immutable, shared bundle
#[derive(Debug, Clone)]
pub struct InferenceService {
    bundle: Arc<ModelBundle>,
}

impl InferenceService {
    pub fn new(bundle: ModelBundle) -> Result<Self> {
        bundle.validate()?;
        Ok(Self {
            bundle: Arc::new(bundle),
        })
    }

    /// Share an already validated bundle
    pub fn from_shared(bundle: Arc<ModelBundle>) -> Self {
        Self { bundle }
    }

    /// Load the bundle at `dir` through the artifact store
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let bundle = ArtifactStore::load(dir)?;
        Ok(Self {
            bundle: Arc::new(bundle),
        })
    }

    pub fn bundle(&self) -> &ModelBundle {
        &self.bundle
    }

    pub fn feature_names(&self) -> &[String] {
        &self.bundle.feature_names
    }

    /// Build the request row for a raw reading using the bundle's grade encoder
    pub fn features_for(&self, record: &RawRecord) -> Result<FeatureVector> {
        FeatureVector::from_reading(record, &self.bundle.grade_encoder)
    }

    /// Order one record by the bundle's feature list
    fn ordered_row(&self, row: usize, record: &HashMap<String, f64>) -> Result<Vec<f64>> {
        let names = &self.bundle.feature_names;
        let missing: BTreeSet<String> = names
            .iter()
            .filter(|n| !record.contains_key(n.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(MaintenanceError::MissingFeatureError { row, missing });
        }

        names
            .iter()
            .map(|name| {
                let value = record[name.as_str()];
                if value.is_finite() {
                    Ok(value)
                } else {
                    Err(MaintenanceError::ValidationError(format!(
                        "record {}: '{}' is not finite ({})",
                        row, name, value
                    )))
                }
            })
            .collect()
    }

    /// Classify a batch of records.
    ///
    /// Every record must carry all bundle features; extra keys are ignored.
    /// The first invalid record (by position) fails the whole batch.
    pub fn predict(
        &self,
        records: &[HashMap<String, f64>],
        return_probabilities: bool,
    ) -> Result<Vec<PredictionResult>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let n_features = self.bundle.n_features();

        let rows: Vec<Result<Vec<f64>>> = records
            .par_iter()
            .enumerate()
            .map(|(i, r)| self.ordered_row(i, r))
            .collect();

        let mut flat = Vec::with_capacity(records.len() * n_features);
        for row in rows {
            flat.extend(row?);
        }
        let x = Array2::from_shape_vec((records.len(), n_features), flat)?;
        let scaled = self.bundle.scaler.transform(&x)?;
        let proba = self.bundle.classifier.predict_proba(&scaled)?;

        let encoder = &self.bundle.failure_encoder;
        let results = proba
            .outer_iter()
            .into_par_iter()
            .map(|p| {
                let label = encoder.inverse_transform(argmax(p.iter().copied()))?.to_string();
                let probabilities = if return_probabilities {
                    Some(normalized(encoder.classes(), p.iter().copied()))
                } else {
                    None
                };
                Ok::<_, MaintenanceError>(PredictionResult { label, probabilities })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            rows = records.len(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Batch predicted"
        );
        Ok(results)
    }

    /// Classify a single record
    pub fn predict_one(&self, record: &HashMap<String, f64>, return_probabilities: bool) -> Result<PredictionResult> {
        let mut out = self.predict(std::slice::from_ref(record), return_probabilities)?;
        out.pop()
            .ok_or_else(|| MaintenanceError::DataError("empty prediction batch".to_string()))
    }

    /// Classify raw readings, deriving features first
    pub fn predict_readings(&self, readings: &[RawRecord], return_probabilities: bool) -> Result<Vec<PredictionResult>> {
        let records = readings
            .iter()
            .enumerate()
            .map(|(i, r)| {
                self.features_for(r).map(FeatureVector::into_map).map_err(|e| match e {
                    MaintenanceError::ValidationError(msg) => {
                        MaintenanceError::ValidationError(msg.replacen("record 0", &format!("record {}", i), 1))
                    }
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.predict(&records, return_probabilities)
    }
}

/// Clamp to non-negative and renormalize so the distribution sums to one
fn normalized(classes: &[String], proba: impl Iterator<Item = f64>) -> Vec<(String, f64)> {
    let clipped: Vec<f64> = proba.map(|p| if p.is_finite() { p.max(0.0) } else { 0.0 }).collect();
    let total: f64 = clipped.iter().sum();
    let n = clipped.len().max(1) as f64;
    classes
        .iter()
        .cloned()
        .zip(clipped)
        .map(|(c, p)| (c, if total > 0.0 { p / total } else { 1.0 / n }))
        .collect()
}

/// Load the bundle at `bundle_path` and classify `records`
pub fn predict(
    records: &[HashMap<String, f64>],
    bundle_path: impl AsRef<Path>,
    return_probabilities: bool,
) -> Result<Vec<PredictionResult>> {
    let service = InferenceService::load(bundle_path.as_ref())?;
    info!(
        bundle = %bundle_path.as_ref().display(),
        model = %service.bundle().metadata.selected_model,
        rows = records.len(),
        "Serving predictions"
    );
    service.predict(records, return_probabilities)
}
