//! Classifier trait and the closed set of model families

use super::config::ModelFamily;
use super::lightgbm::{LightGBMClassifier, LightGBMConfig};
use super::random_forest::{RandomForestClassifier, RandomForestConfig};
use super::xgboost::{XGBoostClassifier, XGBoostConfig};
use crate::error::{MaintenanceError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Trait for multiclass models over integer-encoded labels
pub trait Model: Send + Sync {
    /// Fit the model; labels must lie in `0..n_classes`
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()>;

    /// Class probabilities, one row per sample, columns in label-index order
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Most probable class per row; ties resolve to the lowest index
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let proba = self.predict_proba(x)?;
        Ok(proba.rows().into_iter().map(|row| argmax(row.iter().copied())).collect())
    }

    fn n_features(&self) -> usize;

    fn n_classes(&self) -> usize;

    /// Get feature importances (if available)
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }
}

pub(crate) fn argmax(values: impl Iterator<Item = f64>) -> usize {
    let mut best = (0, f64::NEG_INFINITY);
    for (i, v) in values.enumerate() {
        if v > best.1 {
            best = (i, v);
        }
    }
    best.0
}

pub(crate) fn check_fit_inputs(x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(MaintenanceError::ShapeError {
            expected: format!("{} labels", x.nrows()),
            actual: format!("{} labels", y.len()),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(MaintenanceError::DataError("cannot fit on an empty matrix".to_string()));
    }
    if n_classes == 0 {
        return Err(MaintenanceError::InvalidParameter {
            name: "n_classes".to_string(),
            value: "0".to_string(),
            reason: "at least one class is required".to_string(),
        });
    }
    if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
        return Err(MaintenanceError::DataError(format!(
            "label {} out of range for {} classes",
            bad, n_classes
        )));
    }
    Ok(())
}

/// Hyperparameters for one family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", content = "params")]
pub enum ModelConfig {
    RandomForest(RandomForestConfig),
    XGBoost(XGBoostConfig),
    LightGBM(LightGBMConfig),
}

impl ModelConfig {
    /// Documented defaults for a family, reseeded
    pub fn default_for(family: ModelFamily, seed: u64) -> Self {
        match family {
            ModelFamily::RandomForest => ModelConfig::RandomForest(RandomForestConfig::default().with_random_state(seed)),
            ModelFamily::XGBoost => ModelConfig::XGBoost(XGBoostConfig::default().with_random_state(seed)),
            ModelFamily::LightGBM => ModelConfig::LightGBM(LightGBMConfig::default().with_random_state(seed)),
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            ModelConfig::RandomForest(_) => ModelFamily::RandomForest,
            ModelConfig::XGBoost(_) => ModelFamily::XGBoost,
            ModelConfig::LightGBM(_) => ModelFamily::LightGBM,
        }
    }
}

/// Fitted or unfitted classifier of one of the supported families
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", content = "model")]
pub enum Classifier {
    RandomForest(RandomForestClassifier),
    XGBoost(XGBoostClassifier),
    LightGBM(LightGBMClassifier),
}

impl Classifier {
    pub fn from_config(config: &ModelConfig) -> Self {
        match config {
            ModelConfig::RandomForest(c) => Classifier::RandomForest(RandomForestClassifier::new(c.clone())),
            ModelConfig::XGBoost(c) => Classifier::XGBoost(XGBoostClassifier::new(c.clone())),
            ModelConfig::LightGBM(c) => Classifier::LightGBM(LightGBMClassifier::new(c.clone())),
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            Classifier::RandomForest(_) => ModelFamily::RandomForest,
            Classifier::XGBoost(_) => ModelFamily::XGBoost,
            Classifier::LightGBM(_) => ModelFamily::LightGBM,
        }
    }

    pub fn config(&self) -> ModelConfig {
        match self {
            Classifier::RandomForest(m) => ModelConfig::RandomForest(m.config().clone()),
            Classifier::XGBoost(m) => ModelConfig::XGBoost(m.config().clone()),
            Classifier::LightGBM(m) => ModelConfig::LightGBM(m.config.clone()),
        }
    }

    fn inner(&self) -> &dyn Model {
        match self {
            Classifier::RandomForest(m) => m,
            Classifier::XGBoost(m) => m,
            Classifier::LightGBM(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Model {
        match self {
            Classifier::RandomForest(m) => m,
            Classifier::XGBoost(m) => m,
            Classifier::LightGBM(m) => m,
        }
    }
}

impl Model for Classifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        self.inner_mut().fit(x, y, n_classes)
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.inner().predict_proba(x)
    }

    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn n_classes(&self) -> usize {
        self.inner().n_classes()
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        self.inner().feature_importances()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_argmax_prefers_lowest_index_on_tie() {
        assert_eq!(argmax([0.2, 0.4, 0.4].into_iter()), 1);
        assert_eq!(argmax([0.5, 0.5].into_iter()), 0);
    }

    #[test]
    fn test_check_fit_inputs() {
        let x = array![[1.0], [2.0]];
        assert!(check_fit_inputs(&x, &[0, 1], 2).is_ok());
        assert!(matches!(check_fit_inputs(&x, &[0], 2), Err(MaintenanceError::ShapeError { .. })));
        assert!(matches!(check_fit_inputs(&x, &[0, 2], 2), Err(MaintenanceError::DataError(_))));
    }

    #[test]
    fn test_classifier_dispatch_and_serde() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| (i / 20) as f64 * 3.0 + (i + j) as f64 * 0.01);
        let y: Vec<usize> = (0..40).map(|i| i / 20).collect();
        let config = ModelConfig::RandomForest(RandomForestConfig::default().with_n_estimators(5));
        let mut clf = Classifier::from_config(&config);
        assert_eq!(clf.family(), ModelFamily::RandomForest);
        clf.fit(&x, &y, 2).unwrap();
        assert_eq!(clf.n_classes(), 2);
        assert_eq!(clf.n_features(), 2);

        let json = serde_json::to_string(&clf).unwrap();
        let restored: Classifier = serde_json::from_str(&json).unwrap();
        assert_eq!(clf.predict_proba(&x).unwrap(), restored.predict_proba(&x).unwrap());
        assert_eq!(restored.config(), config);
    }
}
