//! Preprocessing configuration

use serde::{Deserialize, Serialize};

/// Configuration for outlier filtering and the hold-out split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Whether to drop IQR outliers before encoding
    pub remove_outliers: bool,

    /// IQR multiplier for the outlier bounds
    pub iqr_factor: f64,

    /// Fraction of the balanced data held out for evaluation
    pub test_size: f64,

    /// Seed for the stratified hold-out split
    pub random_state: u64,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            remove_outliers: true,
            iqr_factor: 1.5,
            test_size: 0.2,
            random_state: 42,
        }
    }
}

impl PreprocessingConfig {
    pub fn with_iqr_factor(mut self, factor: f64) -> Self {
        self.iqr_factor = factor;
        self
    }

    pub fn with_remove_outliers(mut self, remove: bool) -> Self {
        self.remove_outliers = remove;
        self
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}
