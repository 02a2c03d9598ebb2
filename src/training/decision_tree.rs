//! CART classification tree used by the random forest

use crate::error::{MaintenanceError, Result};
use ndarray::{Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf node holding the class distribution of its training rows
    Leaf {
        distribution: Vec<f64>,
        n_samples: usize,
    },
    /// Internal node with split
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

impl TreeNode {
    fn leaf<'a>(&'a self, row: &ArrayView1<f64>) -> &'a [f64] {
        match self {
            TreeNode::Leaf { distribution, .. } => distribution,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if row[*feature_idx] <= *threshold {
                    left.leaf(row)
                } else {
                    right.leaf(row)
                }
            }
        }
    }

    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

/// Gini-impurity classification tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features drawn per split; `None` considers all
    pub max_features: Option<usize>,
    n_features: usize,
    n_classes: usize,
    feature_importances: Vec<f64>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

/// Working state for one fit
struct Builder<'a, R: Rng> {
    x: &'a Array2<f64>,
    y: &'a [usize],
    tree: &'a DecisionTree,
    rng: &'a mut R,
    importances: Vec<f64>,
}

fn gini(counts: &[f64], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - counts.iter().map(|c| (c / total).powi(2)).sum::<f64>()
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            n_features: 0,
            n_classes: 0,
            feature_importances: Vec::new(),
        }
    }

    pub fn with_max_depth(mut self, depth: Option<usize>) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    /// Fit on the rows named by `indices` (repeats allowed, as in a bootstrap)
    pub fn fit_indices<R: Rng>(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        indices: &[usize],
        n_classes: usize,
        rng: &mut R,
    ) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(MaintenanceError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        if indices.is_empty() {
            return Err(MaintenanceError::DataError("cannot fit a tree on zero rows".to_string()));
        }
        if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
            return Err(MaintenanceError::DataError(format!(
                "label {} out of range for {} classes",
                bad, n_classes
            )));
        }

        self.n_features = x.ncols();
        self.n_classes = n_classes;

        let mut builder = Builder {
            x,
            y,
            tree: self,
            rng,
            importances: vec![0.0; x.ncols()],
        };
        let root = builder.build(indices.to_vec(), 0);
        let mut importances = builder.importances;

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }
        self.root = Some(root);
        self.feature_importances = importances;
        Ok(self)
    }

    /// Class distribution of the leaf reached by `row`
    pub fn predict_proba_row(&self, row: &ArrayView1<f64>) -> Result<&[f64]> {
        let root = self.root.as_ref().ok_or(MaintenanceError::ModelNotFitted)?;
        if row.len() != self.n_features {
            return Err(MaintenanceError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{}", row.len()),
            });
        }
        Ok(root.leaf(row))
    }

    /// Normalised mean impurity decrease per feature
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, TreeNode::depth)
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }
}

impl<'a, R: Rng> Builder<'a, R> {
    fn class_counts(&self, indices: &[usize]) -> Vec<f64> {
        let mut counts = vec![0.0; self.tree.n_classes];
        for &i in indices {
            counts[self.y[i]] += 1.0;
        }
        counts
    }

    fn build(&mut self, indices: Vec<usize>, depth: usize) -> TreeNode {
        let n = indices.len();
        let counts = self.class_counts(&indices);
        let impurity = gini(&counts, n as f64);

        let should_stop = n < self.tree.min_samples_split
            || n < 2 * self.tree.min_samples_leaf
            || self.tree.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 0.0;

        let split = if should_stop {
            None
        } else {
            self.find_best_split(&indices, &counts, impurity)
        };

        match split {
            Some((feature_idx, threshold, gain)) => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| self.x[[i, feature_idx]] <= threshold);

                self.importances[feature_idx] += n as f64 * gain;
                let left = Box::new(self.build(left_idx, depth + 1));
                let right = Box::new(self.build(right_idx, depth + 1));

                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                    n_samples: n,
                    impurity,
                }
            }
            None => TreeNode::Leaf {
                distribution: counts.iter().map(|c| c / n as f64).collect(),
                n_samples: n,
            },
        }
    }

    /// Best (feature, threshold, impurity decrease) over a random feature
    /// subset; more features are drawn while no valid split has been found.
    fn find_best_split(&mut self, indices: &[usize], parent_counts: &[f64], parent_impurity: f64) -> Option<(usize, f64, f64)> {
        let n_features = self.x.ncols();
        let mtry = self.tree.max_features.unwrap_or(n_features).clamp(1, n_features);
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(&mut *self.rng);

        let n = indices.len() as f64;
        let min_leaf = self.tree.min_samples_leaf;
        let mut best: Option<(usize, f64, f64)> = None;

        for (visited, &feature) in features.iter().enumerate() {
            if visited >= mtry && best.is_some() {
                break;
            }

            let mut column: Vec<(f64, usize)> = indices.iter().map(|&i| (self.x[[i, feature]], self.y[i])).collect();
            column.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = vec![0.0; parent_counts.len()];
            for pos in 0..column.len() - 1 {
                left[column[pos].1] += 1.0;
                let n_left = pos + 1;
                let n_right = column.len() - n_left;
                if column[pos].0 == column[pos + 1].0 || n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let right: Vec<f64> = parent_counts.iter().zip(&left).map(|(p, l)| p - l).collect();
                let weighted = (n_left as f64 * gini(&left, n_left as f64)
                    + n_right as f64 * gini(&right, n_right as f64))
                    / n;
                let gain = parent_impurity - weighted;

                if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    let threshold = (column[pos].0 + column[pos + 1].0) / 2.0;
                    best = Some((feature, threshold, gain));
                }
            }
        }

        best
    }
}
