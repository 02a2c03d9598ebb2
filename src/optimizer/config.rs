//! Optimization configuration

use super::search_space::SearchSpace;
use super::SamplerType;
use crate::training::ModelFamily;
use serde::{Deserialize, Serialize};

/// Inclusive bounds of the boosted-tree search space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchBounds {
    pub n_estimators: (i64, i64),
    pub max_depth: (i64, i64),
    pub learning_rate: (f64, f64),
    pub subsample: (f64, f64),
    pub colsample_bytree: (f64, f64),
}

impl Default for SearchBounds {
    fn default() -> Self {
        Self {
            n_estimators: (100, 500),
            max_depth: (3, 15),
            learning_rate: (0.01, 0.3),
            subsample: (0.6, 1.0),
            colsample_bytree: (0.6, 1.0),
        }
    }
}

impl SearchBounds {
    pub fn search_space(&self) -> SearchSpace {
        SearchSpace::new()
            .int("n_estimators", self.n_estimators.0, self.n_estimators.1)
            .int("max_depth", self.max_depth.0, self.max_depth.1)
            .float("learning_rate", self.learning_rate.0, self.learning_rate.1)
            .float("subsample", self.subsample.0, self.subsample.1)
            .float("colsample_bytree", self.colsample_bytree.0, self.colsample_bytree.1)
    }
}

/// Configuration for hyperparameter optimization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Skip the stage entirely when false
    pub enabled: bool,

    /// Number of trials to run
    pub n_trials: usize,

    /// Maximum time in seconds
    pub timeout_secs: Option<f64>,

    /// Sampler type
    pub sampler: SamplerType,

    /// Number of initial random samples before optimization
    pub n_startup_trials: usize,

    /// Good/bad split quantile for TPE
    pub gamma: f64,

    /// Candidates drawn from l(x) per TPE step
    pub n_candidates: usize,

    /// Random seed
    pub random_state: u64,

    /// Stop after this many trials without improvement
    pub early_stopping_patience: Option<usize>,

    /// Minimum improvement to consider
    pub min_improvement: f64,

    /// Cross-validation folds for evaluation (stratified, unshuffled)
    pub cv_folds: usize,

    /// Family to tune; defaults to the boosted family with the best CV mean
    pub family: Option<ModelFamily>,

    pub bounds: SearchBounds,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            n_trials: 50,
            timeout_secs: None,
            sampler: SamplerType::TPE,
            n_startup_trials: 10,
            gamma: 0.25,
            n_candidates: 24,
            random_state: 42,
            early_stopping_patience: None,
            min_improvement: 1e-6,
            cv_folds: 3,
            family: None,
            bounds: SearchBounds::default(),
        }
    }
}

impl OptimizerConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set number of trials
    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    /// Builder method to set timeout
    pub fn with_timeout(mut self, secs: f64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Builder method to set sampler
    pub fn with_sampler(mut self, sampler: SamplerType) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_n_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_family(mut self, family: ModelFamily) -> Self {
        self.family = Some(family);
        self
    }

    pub fn with_bounds(mut self, bounds: SearchBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OptimizerConfig::default();
        assert_eq!(config.n_trials, 50);
        assert_eq!(config.cv_folds, 3);
        assert!(matches!(config.sampler, SamplerType::TPE));
        assert_eq!(config.bounds.search_space().len(), 5);
    }

    #[test]
    fn test_builder() {
        let config = OptimizerConfig::new()
            .with_n_trials(5)
            .with_sampler(SamplerType::Random)
            .with_family(ModelFamily::LightGBM);

        assert_eq!(config.n_trials, 5);
        assert!(matches!(config.sampler, SamplerType::Random));
        assert_eq!(config.family, Some(ModelFamily::LightGBM));
    }
}
