//! Random Forest classifier

use super::decision_tree::DecisionTree;
use super::models::{check_fit_inputs, Model};
use crate::error::{MaintenanceError, Result};
use ndarray::{Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f) as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomForestConfig {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub bootstrap: bool,
    pub random_state: u64,
}

impl Default for RandomForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: Some(15),
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            random_state: 42,
        }
    }
}

impl RandomForestConfig {
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }
}

/// Bagged ensemble of Gini trees; probabilities are mean leaf distributions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    config: RandomForestConfig,
    trees: Vec<DecisionTree>,
    n_features: usize,
    n_classes: usize,
    feature_importances: Vec<f64>,
}

impl RandomForestClassifier {
    pub fn new(config: RandomForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            n_features: 0,
            n_classes: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn config(&self) -> &RandomForestConfig {
        &self.config
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Model for RandomForestClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<()> {
        check_fit_inputs(x, y, n_classes)?;
        if self.config.n_estimators == 0 {
            return Err(MaintenanceError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let max_features = self.config.max_features.resolve(n_features);
        let base_seed = self.config.random_state;
        let cfg = &self.config;

        // Build trees in parallel, one seeded stream per tree
        let trees: Vec<DecisionTree> = (0..cfg.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));
                let sample_indices: Vec<usize> = if cfg.bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };

                let mut tree = DecisionTree::new()
                    .with_max_depth(cfg.max_depth)
                    .with_min_samples_split(cfg.min_samples_split)
                    .with_min_samples_leaf(cfg.min_samples_leaf)
                    .with_max_features(Some(max_features));
                tree.fit_indices(x, y, &sample_indices, n_classes, &mut rng)?;
                Ok::<_, MaintenanceError>(tree)
            })
            .collect::<Result<_>>()?;

        let mut importances = vec![0.0; n_features];
        for tree in &trees {
            for (acc, v) in importances.iter_mut().zip(tree.feature_importances()) {
                *acc += v;
            }
        }
        let n_trees = trees.len() as f64;
        importances.iter_mut().for_each(|v| *v /= n_trees);

        self.trees = trees;
        self.n_features = n_features;
        self.n_classes = n_classes;
        self.feature_importances = importances;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(MaintenanceError::ModelNotFitted);
        }
        let n_trees = self.trees.len() as f64;
        let rows: Vec<Vec<f64>> = x
            .axis_iter(Axis(0))
            .into_par_iter()
            .map(|row| {
                let mut acc = vec![0.0; self.n_classes];
                for tree in &self.trees {
                    for (a, p) in acc.iter_mut().zip(tree.predict_proba_row(&row)?) {
                        *a += p;
                    }
                }
                acc.iter_mut().for_each(|a| *a /= n_trees);
                Ok::<_, MaintenanceError>(acc)
            })
            .collect::<Result<_>>()?;

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        Ok(Array2::from_shape_vec((x.nrows(), self.n_classes), flat)?)
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

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn blobs() -> (Array2<f64>, Vec<usize>) {
        let x = Array2::from_shape_fn((60, 3), |(i, j)| {
            let c = (i / 20) as f64;
            c * 4.0 + ((i * 13 + j * 5) % 7) as f64 * 0.2
        });
        let y = (0..60).map(|i| i / 20).collect();
        (x, y)
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(11), 3);
        assert_eq!(MaxFeatures::All.resolve(11), 11);
        assert_eq!(MaxFeatures::Fixed(50).resolve(11), 11);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
    }

    #[test]
    fn test_random_forest_fit_predict() {
        let (x, y) = blobs();
        let mut rf = RandomForestClassifier::new(RandomForestConfig::default().with_n_estimators(15));
        rf.fit(&x, &y, 3).unwrap();
        assert_eq!(rf.n_trees(), 15);

        let pred = rf.predict(&x).unwrap();
        let acc = pred.iter().zip(&y).filter(|(p, t)| p == t).count() as f64 / 60.0;
        assert!(acc > 0.95);

        let proba = rf.predict_proba(&array![[0.1, 0.2, 0.3]]).unwrap();
        assert!((proba.row(0).sum() - 1.0).abs() < 1e-9);
        assert!(proba[[0, 0]] > 0.5);
    }

    #[test]
    fn test_random_forest_seeded() {
        let (x, y) = blobs();
        let mut a = RandomForestClassifier::new(RandomForestConfig::default().with_n_estimators(5));
        let mut b = RandomForestClassifier::new(RandomForestConfig::default().with_n_estimators(5));
        a.fit(&x, &y, 3).unwrap();
        b.fit(&x, &y, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_importances_sum_to_one() {
        let (x, y) = blobs();
        let mut rf = RandomForestClassifier::new(RandomForestConfig::default().with_n_estimators(5));
        rf.fit(&x, &y, 3).unwrap();
        let imp = rf.feature_importances().unwrap();
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }
}
