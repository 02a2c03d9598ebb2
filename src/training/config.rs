//! Training stage configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MaintenanceError;

/// Supported model families, in candidate-pool order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelFamily {
    RandomForest,
    XGBoost,
    LightGBM,
}

impl ModelFamily {
    pub fn all() -> [ModelFamily; 3] {
        [ModelFamily::RandomForest, ModelFamily::XGBoost, ModelFamily::LightGBM]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::RandomForest => "RandomForest",
            ModelFamily::XGBoost => "XGBoost",
            ModelFamily::LightGBM => "LightGBM",
        }
    }

    pub fn is_boosted(&self) -> bool {
        !matches!(self, ModelFamily::RandomForest)
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelFamily {
    type Err = MaintenanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "randomforest" | "random_forest" | "rf" => Ok(ModelFamily::RandomForest),
            "xgboost" | "xgb" => Ok(ModelFamily::XGBoost),
            "lightgbm" | "lgbm" => Ok(ModelFamily::LightGBM),
            other => Err(MaintenanceError::ConfigError(format!("unknown model family '{}'", other))),
        }
    }
}

/// Configuration for the multi-model training stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Families to train, in ranking order
    pub families: Vec<ModelFamily>,
    /// Stratified folds used for ranking
    pub cv_folds: usize,
    pub shuffle: bool,
    pub random_state: u64,
    /// Stop after the current family once this many seconds have elapsed
    pub time_budget_secs: Option<f64>,
    /// Overrides for the default per-family hyperparameters
    pub random_forest: Option<super::RandomForestConfig>,
    pub xgboost: Option<super::XGBoostConfig>,
    pub lightgbm: Option<super::LightGBMConfig>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            families: ModelFamily::all().to_vec(),
            cv_folds: 5,
            shuffle: true,
            random_state: 42,
            time_budget_secs: None,
            random_forest: None,
            xgboost: None,
            lightgbm: None,
        }
    }
}

impl TrainingConfig {
    pub fn with_families(mut self, families: Vec<ModelFamily>) -> Self {
        self.families = families;
        self
    }

    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_time_budget(mut self, secs: f64) -> Self {
        self.time_budget_secs = Some(secs);
        self
    }

    pub fn with_random_forest(mut self, config: super::RandomForestConfig) -> Self {
        self.random_forest = Some(config);
        self
    }

    pub fn with_xgboost(mut self, config: super::XGBoostConfig) -> Self {
        self.xgboost = Some(config);
        self
    }

    pub fn with_lightgbm(mut self, config: super::LightGBMConfig) -> Self {
        self.lightgbm = Some(config);
        self
    }

    /// Hyperparameters for `family`: the override if set, else defaults seeded with `random_state`
    pub fn model_config(&self, family: ModelFamily) -> super::ModelConfig {
        use super::ModelConfig;
        match family {
            ModelFamily::RandomForest => match &self.random_forest {
                Some(c) => ModelConfig::RandomForest(c.clone()),
                None => ModelConfig::default_for(family, self.random_state),
            },
            ModelFamily::XGBoost => match &self.xgboost {
                Some(c) => ModelConfig::XGBoost(c.clone()),
                None => ModelConfig::default_for(family, self.random_state),
            },
            ModelFamily::LightGBM => match &self.lightgbm {
                Some(c) => ModelConfig::LightGBM(c.clone()),
                None => ModelConfig::default_for(family, self.random_state),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_parse_and_display() {
        assert_eq!("xgb".parse::<ModelFamily>().unwrap(), ModelFamily::XGBoost);
        assert_eq!("LightGBM".parse::<ModelFamily>().unwrap(), ModelFamily::LightGBM);
        assert!("svm".parse::<ModelFamily>().is_err());
        assert_eq!(ModelFamily::RandomForest.to_string(), "RandomForest");
    }

    #[test]
    fn test_config_defaults_from_json() {
        let cfg: TrainingConfig = serde_json::from_str(r#"{"cv_folds": 3}"#).unwrap();
        assert_eq!(cfg.cv_folds, 3);
        assert_eq!(cfg.families.len(), 3);
        assert_eq!(cfg.random_state, 42);
    }
}
