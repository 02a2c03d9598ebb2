//! Standard (z-score) feature scaling

use crate::error::{MaintenanceError, Result};
use ndarray::{Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Per-feature `(x - mean) / scale`, with population std and zero std mapped to 1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Fit column statistics on `x`
    pub fn fit(x: &Array2<f64>, feature_names: Vec<String>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(MaintenanceError::DataError(
                "cannot fit scaler on zero rows".to_string(),
            ));
        }
        if feature_names.len() != x.ncols() {
            return Err(MaintenanceError::ShapeError {
                expected: format!("{} feature names", x.ncols()),
                actual: format!("{}", feature_names.len()),
            });
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or(MaintenanceError::ModelNotFitted)?
            .to_vec();
        let scale = x
            .std_axis(Axis(0), 0.0)
            .iter()
            .map(|&s| if s == 0.0 || !s.is_finite() { 1.0 } else { s })
            .collect();

        Ok(Self {
            feature_names,
            mean,
            scale,
        })
    }

    /// Rebuild from persisted statistics
    pub fn from_parts(feature_names: Vec<String>, mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        if mean.len() != feature_names.len() || scale.len() != feature_names.len() {
            return Err(MaintenanceError::BundleConsistencyError(format!(
                "scaler has {} names, {} means, {} scales",
                feature_names.len(),
                mean.len(),
                scale.len()
            )));
        }
        if scale.iter().any(|s| *s == 0.0 || !s.is_finite()) || mean.iter().any(|m| !m.is_finite()) {
            return Err(MaintenanceError::BundleConsistencyError(
                "scaler statistics must be finite with non-zero scale".to_string(),
            ));
        }
        Ok(Self {
            feature_names,
            mean,
            scale,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.check_width(x.ncols())?;
        let mut out = x.clone();
        for mut row in out.rows_mut() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (*v - self.mean[j]) / self.scale[j];
            }
        }
        Ok(out)
    }

    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Vec<f64>> {
        self.check_width(row.len())?;
        Ok(row
            .iter()
            .enumerate()
            .map(|(j, v)| (v - self.mean[j]) / self.scale[j])
            .collect())
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.n_features() {
            return Err(MaintenanceError::ShapeError {
                expected: format!("{} features", self.n_features()),
                actual: format!("{}", width),
            });
        }
        Ok(())
    }
}
