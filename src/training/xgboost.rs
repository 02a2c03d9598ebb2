//! XGBoost-style multiclass gradient boosting with second-order approximation
//!
//! - Softmax objective: one tree per class per round, g = p − y, h = 2·p·(1 − p)
//! - Depth-wise limit (`max_depth`) without a leaf cap
//! - Regularised leaf weights w* = −G / (H + λ) and split penalty γ
//! - Row subsampling per round and column subsampling per tree

use super::boosting::{grow_tree, normalise, softmax_rows, subsample, BinMapper, GradNode, GrowParams};
use super::models::{check_fit_inputs, Model};
use crate::error::{MaintenanceError, Result};
use ndarray::Array2;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// XGBoost configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XGBoostConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_child_weight: f64,
    /// L2 regularization on leaf weights
    pub reg_lambda: f64,
    /// Minimum loss reduction to make a split
    pub gamma: f64,
    pub subsample: f64,
    pub colsample_bytree: f64,
    pub max_bin: usize,
    pub random_state: u64,
}

impl Default for XGBoostConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.1,
            max_depth: 8,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
            gamma: 0.0,
            subsample: 0.8,
            colsample_bytree: 0.8,
            max_bin: 256,
            random_state: 42,
        }
    }
}

impl XGBoostConfig {
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_learning_rate(mut self, lr: f64) -> Self {
        self.learning_rate = lr;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let bad = |name: &str, value: String, reason: &str| MaintenanceError::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.to_string(),
        };
        if self.n_estimators == 0 {
            return Err(bad("n_estimators", "0".into(), "must be positive"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(bad("learning_rate", self.learning_rate.to_string(), "must be positive"));
        }
        for (name, v) in [("subsample", self.subsample), ("colsample_bytree", self.colsample_bytree)] {
            if !(v > 0.0 && v <= 1.0) {
                return Err(bad(name, v.to_string(), "must be in (0, 1]"));
            }
        }
        Ok(())
    }
}

/// XGBoost multiclass classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XGBoostClassifier {
    config: XGBoostConfig,
    /// `trees[round][class]`
    trees: Vec<Vec<GradNode>>,
    n_features: usize,
    n_classes: usize,
    feature_importances: Vec<f64>,
}

impl XGBoostClassifier {
    pub fn new(config: XGBoostConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            n_features: 0,
            n_classes: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &XGBoostConfig {
        &self.config
    }

    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }

    fn margins(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut margins = Array2::zeros((x.nrows(), self.n_classes));
        margins
            .axis_iter_mut(ndarray::Axis(0))
            .into_par_iter()
            .zip(x.axis_iter(ndarray::Axis(0)).into_par_iter())
            .for_each(|(mut out, row)| {
                for round in &self.trees {
                    for (k, tree) in round.iter().enumerate() {
                        out[k] += tree.predict(&row);
                    }
                }
            });
        margins
    }
}

impl Model for XGBoostClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        check_fit_inputs(x, y, n_classes)?;
        self.config.validate()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        let mapper = BinMapper::fit(x, self.config.max_bin);
        let binned = mapper.transform(x);
        let params = GrowParams {
            max_depth: self.config.max_depth,
            max_leaves: None,
            min_child_samples: 0,
            min_child_weight: self.config.min_child_weight,
            reg_lambda: self.config.reg_lambda,
            gamma: self.config.gamma,
            learning_rate: self.config.learning_rate,
        };

        let mut margins = Array2::<f64>::zeros((n_samples, n_classes));
        let mut gains = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(self.config.n_estimators);

        for _ in 0..self.config.n_estimators {
            let probs = softmax_rows(&margins);
            let rows = subsample(&mut rng, n_samples, self.config.subsample);
            let columns: Vec<Vec<usize>> = (0..n_classes)
                .map(|_| subsample(&mut rng, n_features, self.config.colsample_bytree))
                .collect();

            let round: Vec<(GradNode, Vec<f64>)> = (0..n_classes)
                .into_par_iter()
                .map(|k| {
                    let mut grad = vec![0.0; n_samples];
                    let mut hess = vec![0.0; n_samples];
                    for i in 0..n_samples {
                        let p = probs[[i, k]];
                        let target = if y[i] == k { 1.0 } else { 0.0 };
                        grad[i] = p - target;
                        hess[i] = (2.0 * p * (1.0 - p)).max(1e-16);
                    }
                    grow_tree(&binned, &mapper, &grad, &hess, rows.clone(), &columns[k], &params)
                })
                .collect();

            let mut round_trees = Vec::with_capacity(n_classes);
            for (k, (tree, tree_gains)) in round.into_iter().enumerate() {
                for (i, row) in x.rows().into_iter().enumerate() {
                    margins[[i, k]] += tree.predict(&row);
                }
                gains.iter_mut().zip(tree_gains).for_each(|(a, b)| *a += b);
                round_trees.push(tree);
            }
            trees.push(round_trees);
        }

        self.trees = trees;
        self.n_features = n_features;
        self.n_classes = n_classes;
        self.feature_importances = normalise(gains);
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(MaintenanceError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(MaintenanceError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{}", x.ncols()),
            });
        }
        Ok(softmax_rows(&self.margins(x)))
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        (!self.feature_importances.is_empty()).then(|| self.feature_importances.clone())
    }
}
