//! End-to-end training configuration

use crate::error::{MaintenanceError, Result};
use crate::optimizer::OptimizerConfig;
use crate::preprocessing::PreprocessingConfig;
use crate::synthetic::BalancerConfig;
use crate::training::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Stage configurations for one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub preprocessing: PreprocessingConfig,
    pub balancer: BalancerConfig,
    pub training: TrainingConfig,
    pub optimizer: OptimizerConfig,
    /// Seed recorded in the bundle metadata; set through `with_seed` so every stage shares it
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preprocessing: PreprocessingConfig::default(),
            balancer: BalancerConfig::default(),
            training: TrainingConfig::default(),
            optimizer: OptimizerConfig::default(),
            seed: 42,
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file; omitted fields keep their defaults.
    ///
    /// A top-level `seed` reseeds every stage, overriding stage-level seeds.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let invalid = |e: serde_json::Error| MaintenanceError::ConfigError(format!("{}: {}", path.display(), e));

        let value: serde_json::Value = serde_json::from_str(&text).map_err(invalid)?;
        let explicit_seed = value.get("seed").is_some();
        let mut config: Self = serde_json::from_value(value).map_err(invalid)?;
        if explicit_seed {
            let seed = config.seed;
            config = config.with_seed(seed);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Use one seed for every stochastic stage
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self.preprocessing.random_state = seed;
        self.balancer.seed = seed;
        self.training.random_state = seed;
        self.optimizer.random_state = seed;
        if let Some(c) = self.training.random_forest.as_mut() {
            c.random_state = seed;
        }
        if let Some(c) = self.training.xgboost.as_mut() {
            c.random_state = seed;
        }
        if let Some(c) = self.training.lightgbm.as_mut() {
            c.random_state = seed;
        }
        self
    }

    pub fn with_trials(mut self, n_trials: usize) -> Self {
        self.optimizer.n_trials = n_trials;
        self
    }

    pub fn with_preprocessing(mut self, config: PreprocessingConfig) -> Self {
        self.preprocessing = config;
        self
    }

    pub fn with_balancer(mut self, config: BalancerConfig) -> Self {
        self.balancer = config;
        self
    }

    pub fn with_training(mut self, config: TrainingConfig) -> Self {
        self.training = config;
        self
    }

    pub fn with_optimizer(mut self, config: OptimizerConfig) -> Self {
        self.optimizer = config;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let test_size = self.preprocessing.test_size;
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(MaintenanceError::ConfigError(format!(
                "test_size must be in (0, 1), got {}",
                test_size
            )));
        }
        if !(self.preprocessing.iqr_factor > 0.0) {
            return Err(MaintenanceError::ConfigError(format!(
                "iqr_factor must be positive, got {}",
                self.preprocessing.iqr_factor
            )));
        }
        if self.training.cv_folds < 2 {
            return Err(MaintenanceError::ConfigError("training.cv_folds must be at least 2".to_string()));
        }
        if self.training.families.is_empty() {
            return Err(MaintenanceError::ConfigError("no model families configured".to_string()));
        }
        if self.optimizer.enabled && self.optimizer.cv_folds < 2 {
            return Err(MaintenanceError::ConfigError("optimizer.cv_folds must be at least 2".to_string()));
        }
        Ok(())
    }
}
