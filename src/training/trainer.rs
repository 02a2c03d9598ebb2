//! Multi-model training stage
//!
//! Every configured family is scored by stratified k-fold cross-validation
//! (folds fitted in parallel, each on its own index set) and then refit on
//! the whole training split. A family that fails is dropped with a warning;
//! the stage only fails when nothing survives.

use super::config::{ModelFamily, TrainingConfig};
use super::cross_validation::{CVSplit, CVStrategy, CrossValidator};
use super::models::{Classifier, Model, ModelConfig};
use crate::error::{MaintenanceError, Result};
use crate::evaluation::accuracy;
use crate::preprocessing::SplitData;
use ndarray::{Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Cross-validation outcome for one configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvScore {
    pub mean: f64,
    pub std: f64,
    pub fold_scores: Vec<f64>,
}

impl CvScore {
    fn from_folds(fold_scores: Vec<f64>) -> Self {
        let (mean, std) = crate::utils::mean_std(&fold_scores);
        Self { mean, std, fold_scores }
    }
}

/// A fitted model in the candidate pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    /// `RandomForest`, `XGBoost`, `LightGBM` or `<Family>_Optimized`
    pub name: String,
    pub classifier: Classifier,
    pub cv: Option<CvScore>,
}

impl Candidate {
    pub fn family(&self) -> ModelFamily {
        self.classifier.family()
    }
}

/// Output of the training stage
#[derive(Debug, Clone)]
pub struct TrainedCandidates {
    /// Fitted models in pool order
    pub candidates: Vec<Candidate>,
    /// Families that failed, with the reason
    pub dropped: Vec<(ModelFamily, String)>,
    /// Families skipped because the time budget ran out
    pub skipped: Vec<ModelFamily>,
}

impl TrainedCandidates {
    /// Candidate names ordered by CV mean, best first
    pub fn ranking(&self) -> Vec<(&str, f64)> {
        let mut ranked: Vec<(&str, f64)> = self
            .candidates
            .iter()
            .filter_map(|c| c.cv.as_ref().map(|cv| (c.name.as_str(), cv.mean)))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Boosted family with the highest CV mean
    pub fn best_boosted(&self) -> Option<ModelFamily> {
        self.candidates
            .iter()
            .filter(|c| c.family().is_boosted())
            .filter_map(|c| c.cv.as_ref().map(|cv| (c.family(), cv.mean)))
            .fold(None, |best: Option<(ModelFamily, f64)>, (f, m)| match best {
                Some((_, bm)) if bm >= m => best,
                _ => Some((f, m)),
            })
            .map(|(f, _)| f)
    }
}

/// Score `config` over precomputed folds; fold fits run in parallel.
pub fn cross_validate(
    config: &ModelConfig,
    x: &Array2<f64>,
    y: &[usize],
    n_classes: usize,
    splits: &[CVSplit],
) -> Result<CvScore> {
    let scores: Vec<f64> = splits
        .par_iter()
        .map(|split| {
            let x_train = x.select(Axis(0), &split.train_indices);
            let y_train: Vec<usize> = split.train_indices.iter().map(|&i| y[i]).collect();
            let x_test = x.select(Axis(0), &split.test_indices);
            let y_test: Vec<usize> = split.test_indices.iter().map(|&i| y[i]).collect();

            let mut model = Classifier::from_config(config);
            model.fit(&x_train, &y_train, n_classes)?;
            let pred = model.predict(&x_test)?;
            let score = accuracy(&y_test, &pred);
            debug!(fold = split.fold_idx, score, "Fold scored");
            Ok::<_, MaintenanceError>(score)
        })
        .collect::<Result<_>>()?;

    Ok(CvScore::from_folds(scores))
}

/// Trains and ranks the configured model families
#[derive(Debug, Clone, Default)]
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn run(&self, data: &SplitData) -> Result<TrainedCandidates> {
        let start = Instant::now();
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: self.config.cv_folds,
            shuffle: self.config.shuffle,
        })
        .with_random_state(self.config.random_state);
        let splits = cv
            .split(&data.y_train)
            .map_err(|e| MaintenanceError::TrainingConvergenceFailure(format!("cannot build CV folds: {}", e)))?;

        info!(
            families = self.config.families.len(),
            folds = splits.len(),
            n_train = data.y_train.len(),
            "Training candidate models"
        );

        let mut candidates = Vec::new();
        let mut dropped = Vec::new();
        let mut skipped = Vec::new();

        for (i, &family) in self.config.families.iter().enumerate() {
            if let Some(budget) = self.config.time_budget_secs {
                if i > 0 && start.elapsed().as_secs_f64() >= budget {
                    skipped.extend_from_slice(&self.config.families[i..]);
                    warn!(budget_secs = budget, skipped = ?skipped, "Training time budget exhausted");
                    break;
                }
            }

            let model_config = self.config.model_config(family);
            let family_start = Instant::now();
            match self.train_family(&model_config, data, &splits) {
                Ok((classifier, score)) => {
                    info!(
                        model = %family,
                        cv_mean = score.mean,
                        cv_std = score.std,
                        elapsed_secs = family_start.elapsed().as_secs_f64(),
                        "Model trained"
                    );
                    candidates.push(Candidate {
                        name: family.name().to_string(),
                        classifier,
                        cv: Some(score),
                    });
                }
                Err(e) => {
                    warn!(model = %family, error = %e, "Model training failed; dropping family");
                    dropped.push((family, e.to_string()));
                }
            }
        }

        if candidates.is_empty() {
            let reasons: Vec<String> = dropped.iter().map(|(f, e)| format!("{}: {}", f, e)).collect();
            return Err(MaintenanceError::TrainingConvergenceFailure(if reasons.is_empty() {
                "no model family was trained".to_string()
            } else {
                reasons.join("; ")
            }));
        }

        Ok(TrainedCandidates {
            candidates,
            dropped,
            skipped,
        })
    }

    fn train_family(&self, config: &ModelConfig, data: &SplitData, splits: &[CVSplit]) -> Result<(Classifier, CvScore)> {
        let score = cross_validate(config, &data.x_train, &data.y_train, data.n_classes, splits)?;
        let mut classifier = Classifier::from_config(config);
        classifier.fit(&data.x_train, &data.y_train, data.n_classes)?;
        Ok((classifier, score))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::StandardScaler;
    use crate::training::{LightGBMConfig, RandomForestConfig, XGBoostConfig};

    fn split_data() -> SplitData {
        let x = Array2::from_shape_fn((90, 3), |(i, j)| (i % 3) as f64 * 4.0 + ((i * 7 + j) % 5) as f64 * 0.1);
        let y: Vec<usize> = (0..90).map(|i| i % 3).collect();
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let scaler = StandardScaler::fit(&x, names).unwrap();
        SplitData {
            x_train: x.clone(),
            y_train: y.clone(),
            x_test: x,
            y_test: y,
            scaler,
            n_classes: 3,
        }
    }

    fn fast_config() -> TrainingConfig {
        TrainingConfig::default()
            .with_cv_folds(3)
            .with_random_forest(RandomForestConfig::default().with_n_estimators(5))
            .with_xgboost(XGBoostConfig::default().with_n_estimators(5).with_max_depth(3))
            .with_lightgbm(LightGBMConfig::default().with_n_estimators(5).with_min_child_samples(5))
    }

    #[test]
    fn test_trainer_produces_all_families_in_order() {
        let trained = ModelTrainer::new(fast_config()).run(&split_data()).unwrap();
        let names: Vec<&str> = trained.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["RandomForest", "XGBoost", "LightGBM"]);
        for c in &trained.candidates {
            let cv = c.cv.as_ref().unwrap();
            assert_eq!(cv.fold_scores.len(), 3);
            assert!(cv.mean > 0.9);
        }
        assert!(trained.best_boosted().is_some());
    }

    #[test]
    fn test_failing_family_is_dropped() {
        let mut bad = XGBoostConfig::default();
        bad.subsample = 0.0;
        let trained = ModelTrainer::new(fast_config().with_xgboost(bad)).run(&split_data()).unwrap();
        assert_eq!(trained.candidates.len(), 2);
        assert_eq!(trained.dropped[0].0, ModelFamily::XGBoost);
    }

    #[test]
    fn test_all_families_failing_is_fatal() {
        let mut bad = XGBoostConfig::default();
        bad.subsample = 0.0;
        let config = fast_config().with_families(vec![ModelFamily::XGBoost]).with_xgboost(bad);
        let err = ModelTrainer::new(config).run(&split_data()).unwrap_err();
        assert!(matches!(err, MaintenanceError::TrainingConvergenceFailure(_)));
    }

    #[test]
    fn test_time_budget_keeps_first_family() {
        let config = fast_config().with_time_budget(0.0);
        let trained = ModelTrainer::new(config).run(&split_data()).unwrap();
        assert_eq!(trained.candidates.len(), 1);
        assert_eq!(trained.skipped, vec![ModelFamily::XGBoost, ModelFamily::LightGBM]);
    }
}
