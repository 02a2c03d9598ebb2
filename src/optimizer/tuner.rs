//! Hyperparameter tuning stage for one boosted family

use super::config::OptimizerConfig;
use super::optimizer::{Search, Study};
use super::search_space::TrialParams;
use crate::error::{MaintenanceError, Result};
use crate::preprocessing::SplitData;
use crate::training::{
    cross_validate, CVStrategy, Candidate, Classifier, CrossValidator, Model, ModelConfig, ModelFamily,
    TrainedCandidates,
};
use tracing::{info, warn};

/// Candidate pool after tuning: the trained candidates plus at most one
/// `<Family>_Optimized` model appended at the end.
#[derive(Debug, Clone)]
pub struct TunedCandidates {
    pub candidates: Vec<Candidate>,
    pub dropped: Vec<(ModelFamily, String)>,
    pub study: Option<Study>,
    pub tuned_family: Option<ModelFamily>,
}

impl TunedCandidates {
    /// Pool unchanged, no search performed
    pub fn untuned(trained: TrainedCandidates) -> Self {
        Self {
            candidates: trained.candidates,
            dropped: trained.dropped,
            study: None,
            tuned_family: None,
        }
    }
}

fn param_usize(params: &TrialParams, name: &str) -> Result<usize> {
    params
        .get(name)
        .and_then(|v| v.as_int())
        .filter(|v| *v > 0)
        .map(|v| v as usize)
        .ok_or_else(|| MaintenanceError::ConfigError(format!("trial is missing integer parameter '{}'", name)))
}

fn param_f64(params: &TrialParams, name: &str) -> Result<f64> {
    params
        .get(name)
        .and_then(|v| v.as_float())
        .ok_or_else(|| MaintenanceError::ConfigError(format!("trial is missing parameter '{}'", name)))
}

/// Overlay sampled values on a boosted family's base configuration
pub fn apply_params(base: &ModelConfig, params: &TrialParams) -> Result<ModelConfig> {
    let n_estimators = param_usize(params, "n_estimators")?;
    let max_depth = param_usize(params, "max_depth")?;
    let learning_rate = param_f64(params, "learning_rate")?;
    let subsample = param_f64(params, "subsample")?;
    let colsample_bytree = param_f64(params, "colsample_bytree")?;

    match base {
        ModelConfig::XGBoost(c) => {
            let mut c = c.clone();
            c.n_estimators = n_estimators;
            c.max_depth = max_depth;
            c.learning_rate = learning_rate;
            c.subsample = subsample;
            c.colsample_bytree = colsample_bytree;
            Ok(ModelConfig::XGBoost(c))
        }
        ModelConfig::LightGBM(c) => {
            let mut c = c.clone();
            c.n_estimators = n_estimators;
            c.max_depth = max_depth;
            c.learning_rate = learning_rate;
            c.subsample = subsample;
            // rows are only bagged when a frequency is set
            c.subsample_freq = c.subsample_freq.max(1);
            c.colsample_bytree = colsample_bytree;
            Ok(ModelConfig::LightGBM(c))
        }
        ModelConfig::RandomForest(_) => Err(MaintenanceError::ConfigError(
            "hyperparameter search supports boosted families only".to_string(),
        )),
    }
}

/// TPE search over the best (or configured) boosted family
#[derive(Debug, Clone, Default)]
pub struct HyperparameterOptimizer {
    config: OptimizerConfig,
}

impl HyperparameterOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn run(&self, data: &SplitData, trained: TrainedCandidates) -> Result<TunedCandidates> {
        if !self.config.enabled || self.config.n_trials == 0 {
            info!("Hyperparameter search disabled");
            return Ok(TunedCandidates::untuned(trained));
        }

        let family = match self.config.family.or_else(|| trained.best_boosted()) {
            Some(f) if f.is_boosted() => f,
            Some(f) => {
                return Err(MaintenanceError::ConfigError(format!(
                    "cannot tune {}: only boosted families are searchable",
                    f
                )))
            }
            None => {
                warn!("No boosted family available; skipping hyperparameter search");
                return Ok(TunedCandidates::untuned(trained));
            }
        };

        let base = trained
            .candidates
            .iter()
            .find(|c| c.family() == family)
            .map(|c| c.classifier.config())
            .unwrap_or_else(|| ModelConfig::default_for(family, self.config.random_state));

        let splits = match CrossValidator::new(CVStrategy::StratifiedKFold {
            n_splits: self.config.cv_folds,
            shuffle: false,
        })
        .split(&data.y_train)
        {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Cannot build search folds; skipping hyperparameter search");
                return Ok(TunedCandidates::untuned(trained));
            }
        };

        info!(
            model = %family,
            n_trials = self.config.n_trials,
            folds = splits.len(),
            "Starting hyperparameter search"
        );

        let mut search = Search::new(self.config.clone(), self.config.bounds.search_space());
        search.optimize(|params| {
            let config = apply_params(&base, params)?;
            cross_validate(&config, &data.x_train, &data.y_train, data.n_classes, &splits)
        })?;
        let study = search.into_study();

        let mut tuned = TunedCandidates::untuned(trained);
        tuned.tuned_family = Some(family);

        let best = match study.best_trial() {
            Some(b) => b.clone(),
            None => {
                warn!(model = %family, failed = study.n_failed(), "No trial succeeded; no optimized model added");
                tuned.study = Some(study);
                return Ok(tuned);
            }
        };

        let config = apply_params(&base, &best.params)?;
        let mut classifier = Classifier::from_config(&config);
        match classifier.fit(&data.x_train, &data.y_train, data.n_classes) {
            Ok(()) => {
                info!(
                    model = %family,
                    best_trial = best.trial_id,
                    cv_mean = best.value.unwrap_or_default(),
                    params = ?best.params,
                    "Optimized model refit"
                );
                tuned.candidates.push(Candidate {
                    name: format!("{}_Optimized", family),
                    classifier,
                    cv: best.cv.clone(),
                });
            }
            Err(e) => warn!(model = %family, error = %e, "Refit of best configuration failed"),
        }
        tuned.study = Some(study);
        Ok(tuned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::{ParameterValue, SearchBounds};
    use crate::preprocessing::StandardScaler;
    use crate::training::{LightGBMConfig, XGBoostConfig};
    use ndarray::Array2;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn split_data() -> SplitData {
        let x = Array2::from_shape_fn((60, 2), |(i, j)| (i % 3) as f64 * 4.0 + ((i * 7 + j) % 5) as f64 * 0.1);
        let y: Vec<usize> = (0..60).map(|i| i % 3).collect();
        let scaler = StandardScaler::fit(&x, vec!["a".to_string(), "b".to_string()]).unwrap();
        SplitData {
            x_train: x.clone(),
            y_train: y.clone(),
            x_test: x,
            y_test: y,
            scaler,
            n_classes: 3,
        }
    }

    fn small_bounds() -> SearchBounds {
        SearchBounds {
            n_estimators: (3, 8),
            max_depth: (2, 4),
            ..Default::default()
        }
    }

    fn empty_pool() -> TrainedCandidates {
        TrainedCandidates {
            candidates: Vec::new(),
            dropped: Vec::new(),
            skipped: Vec::new(),
        }
    }

    #[test]
    fn test_apply_params() {
        let mut params = TrialParams::new();
        params.insert("n_estimators".into(), ParameterValue::Int(150));
        params.insert("max_depth".into(), ParameterValue::Int(4));
        params.insert("learning_rate".into(), ParameterValue::Float(0.05));
        params.insert("subsample".into(), ParameterValue::Float(0.7));
        params.insert("colsample_bytree".into(), ParameterValue::Float(0.9));

        match apply_params(&ModelConfig::XGBoost(XGBoostConfig::default()), &params).unwrap() {
            ModelConfig::XGBoost(c) => {
                assert_eq!(c.n_estimators, 150);
                assert_eq!(c.max_depth, 4);
                assert_eq!(c.learning_rate, 0.05);
            }
            other => panic!("unexpected config {:?}", other),
        }
        params.remove("max_depth");
        assert!(apply_params(&ModelConfig::LightGBM(LightGBMConfig::default()), &params).is_err());
    }

    fn trial(n_estimators: i64, subsample: f64) -> TrialParams {
        let mut params = TrialParams::new();
        params.insert("n_estimators".into(), ParameterValue::Int(n_estimators));
        params.insert("max_depth".into(), ParameterValue::Int(4));
        params.insert("learning_rate".into(), ParameterValue::Float(0.1));
        params.insert("subsample".into(), ParameterValue::Float(subsample));
        params.insert("colsample_bytree".into(), ParameterValue::Float(1.0));
        params
    }

    #[test]
    fn test_lightgbm_subsample_changes_model() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let x = Array2::from_shape_fn((300, 3), |_| rng.gen::<f64>());
        let y: Vec<usize> = (0..300)
            .map(|i| {
                let s = x[[i, 0]] + 0.5 * x[[i, 1]] + 0.4 * rng.gen::<f64>();
                ((s * 1.5) as usize).min(2)
            })
            .collect();
        let base = ModelConfig::LightGBM(LightGBMConfig::default().with_min_child_samples(5));

        let fit = |subsample: f64| {
            let config = apply_params(&base, &trial(20, subsample)).unwrap();
            match &config {
                ModelConfig::LightGBM(c) => assert!(c.subsample_freq >= 1),
                other => panic!("unexpected config {:?}", other),
            }
            let mut model = Classifier::from_config(&config);
            model.fit(&x, &y, 3).unwrap();
            model.predict_proba(&x).unwrap()
        };

        assert_ne!(fit(0.6), fit(1.0));
    }

    #[test]
    fn test_optimizer_appends_optimized_candidate() {
        let config = OptimizerConfig::new()
            .with_n_trials(4)
            .with_n_startup_trials(2)
            .with_family(ModelFamily::XGBoost)
            .with_bounds(small_bounds());
        let tuned = HyperparameterOptimizer::new(config).run(&split_data(), empty_pool()).unwrap();

        assert_eq!(tuned.candidates.len(), 1);
        assert_eq!(tuned.candidates[0].name, "XGBoost_Optimized");
        let study = tuned.study.unwrap();
        assert_eq!(study.trials.len(), 4);
        let space = small_bounds().search_space();
        assert!(study.trials.iter().all(|t| space.contains(&t.params)));
    }

    #[test]
    fn test_disabled_optimizer_keeps_pool() {
        let config = OptimizerConfig::new().with_enabled(false);
        let tuned = HyperparameterOptimizer::new(config).run(&split_data(), empty_pool()).unwrap();
        assert!(tuned.candidates.is_empty());
        assert!(tuned.study.is_none());
    }

    #[test]
    fn test_random_forest_is_not_searchable() {
        let config = OptimizerConfig::new().with_family(ModelFamily::RandomForest);
        let err = HyperparameterOptimizer::new(config).run(&split_data(), empty_pool()).unwrap_err();
        assert!(matches!(err, MaintenanceError::ConfigError(_)));
    }
}
