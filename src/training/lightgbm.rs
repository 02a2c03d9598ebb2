//! LightGBM-style multiclass gradient boosting with leaf-wise tree growth
//!
//! Key differences from the XGBoost-style booster:
//! - Leaf-wise (best-first) growth capped by `num_leaves`
//! - `min_child_samples` bounds leaf size by row count
//! - Hessian scaled by K/(K−1); margins start from log class priors
//! - Row bagging only when `subsample_freq > 0`

use super::boosting::{grow_tree, normalise, softmax_in_place, softmax_rows, subsample, BinMapper, GradNode, GrowParams};
use super::models::{check_fit_inputs, Model};
use crate::error::{MaintenanceError, Result};
use ndarray::{Array2, Axis};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightGBMConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub num_leaves: usize,
    pub max_depth: usize,
    pub min_child_samples: usize,
    pub min_child_weight: f64,
    pub reg_lambda: f64,
    pub subsample: f64,
    /// Re-draw the row bag every `subsample_freq` rounds; 0 disables bagging
    pub subsample_freq: usize,
    pub colsample_bytree: f64,
    pub max_bin: usize,
    pub random_state: u64,
}

impl Default for LightGBMConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            learning_rate: 0.1,
            num_leaves: 31,
            max_depth: 8,
            min_child_samples: 20,
            min_child_weight: 1e-3,
            reg_lambda: 0.0,
            subsample: 0.8,
            subsample_freq: 0,
            colsample_bytree: 0.8,
            max_bin: 255,
            random_state: 42,
        }
    }
}

impl LightGBMConfig {
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_child_samples(mut self, n: usize) -> Self {
        self.min_child_samples = n;
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
        if self.num_leaves < 2 {
            return Err(bad("num_leaves", self.num_leaves.to_string(), "must be at least 2"));
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

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightGBMClassifier {
    pub config: LightGBMConfig,
    /// Initial margin per class (log prior)
    init_scores: Vec<f64>,
    /// `trees[round][class]`
    trees: Vec<Vec<GradNode>>,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl LightGBMClassifier {
    pub fn new(config: LightGBMConfig) -> Self {
        Self {
            config,
            init_scores: Vec::new(),
            trees: Vec::new(),
            n_features: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn n_rounds(&self) -> usize {
        self.trees.len()
    }

    pub fn max_leaves(&self) -> usize {
        self.trees.iter().flatten().map(GradNode::n_leaves).max().unwrap_or(0)
    }
}

impl Model for LightGBMClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        check_fit_inputs(x, y, n_classes)?;
        self.config.validate()?;

        let n = x.nrows();
        let n_features = x.ncols();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        let mut priors = vec![0.0; n_classes];
        for &label in y {
            priors[label] += 1.0;
        }
        let init_scores: Vec<f64> = priors.iter().map(|c| (c / n as f64).max(1e-15).ln()).collect();

        let mapper = BinMapper::fit(x, self.config.max_bin);
        let binned = mapper.transform(x);
        let params = GrowParams {
            max_depth: self.config.max_depth,
            max_leaves: Some(self.config.num_leaves),
            min_child_samples: self.config.min_child_samples,
            min_child_weight: self.config.min_child_weight,
            reg_lambda: self.config.reg_lambda,
            gamma: 0.0,
            learning_rate: self.config.learning_rate,
        };
        let factor = if n_classes > 1 {
            n_classes as f64 / (n_classes as f64 - 1.0)
        } else {
            1.0
        };

        let mut margins = Array2::from_shape_fn((n, n_classes), |(_, k)| init_scores[k]);
        let mut gains = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(self.config.n_estimators);
        let mut bag: Vec<usize> = (0..n).collect();

        for round in 0..self.config.n_estimators {
            if self.config.subsample_freq > 0 && round % self.config.subsample_freq == 0 {
                bag = subsample(&mut rng, n, self.config.subsample);
            }
            let columns = subsample(&mut rng, n_features, self.config.colsample_bytree);
            let probs = softmax_rows(&margins);

            let round_out: Vec<(GradNode, Vec<f64>)> = (0..n_classes)
                .into_par_iter()
                .map(|k| {
                    let grad: Vec<f64> = (0..n)
                        .map(|i| probs[[i, k]] - if y[i] == k { 1.0 } else { 0.0 })
                        .collect();
                    let hess: Vec<f64> = (0..n)
                        .map(|i| (factor * probs[[i, k]] * (1.0 - probs[[i, k]])).max(1e-16))
                        .collect();
                    grow_tree(&binned, &mapper, &grad, &hess, bag.clone(), &columns, &params)
                })
                .collect();

            let mut round_trees = Vec::with_capacity(n_classes);
            for (k, (tree, tree_gains)) in round_out.into_iter().enumerate() {
                for (i, row) in x.rows().into_iter().enumerate() {
                    margins[[i, k]] += tree.predict(&row);
                }
                gains.iter_mut().zip(tree_gains).for_each(|(a, b)| *a += b);
                round_trees.push(tree);
            }
            trees.push(round_trees);
        }

        self.init_scores = init_scores;
        self.trees = trees;
        self.n_features = n_features;
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

        let k = self.init_scores.len();
        let mut probs = Array2::zeros((x.nrows(), k));
        probs
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(x.axis_iter(Axis(0)).into_par_iter())
            .for_each(|(mut out, row)| {
                let mut margin = self.init_scores.clone();
                for round in &self.trees {
                    for (c, tree) in round.iter().enumerate() {
                        margin[c] += tree.predict(&row);
                    }
                }
                softmax_in_place(&mut margin);
                out.iter_mut().zip(margin).for_each(|(o, p)| *o = p);
            });
        Ok(probs)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn n_classes(&self) -> usize {
        self.init_scores.len()
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        (!self.feature_importances.is_empty()).then(|| self.feature_importances.clone())
    }
}
