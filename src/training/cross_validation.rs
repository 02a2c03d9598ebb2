//! Cross-validation and hold-out splitting

use crate::error::{MaintenanceError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Cross-validation strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CVStrategy {
    /// Stratified K-Fold (maintains class distribution)
    StratifiedKFold { n_splits: usize, shuffle: bool },
}

impl Default for CVStrategy {
    fn default() -> Self {
        CVStrategy::StratifiedKFold { n_splits: 5, shuffle: true }
    }
}

impl CVStrategy {
    pub fn n_splits(&self) -> usize {
        match self {
            CVStrategy::StratifiedKFold { n_splits, .. } => *n_splits,
        }
    }
}

/// A single train/test split
#[derive(Debug, Clone, PartialEq)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
#[derive(Debug, Clone)]
pub struct CrossValidator {
    strategy: CVStrategy,
    random_state: u64,
}

impl CrossValidator {
    pub fn new(strategy: CVStrategy) -> Self {
        Self {
            strategy,
            random_state: 42,
        }
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn strategy(&self) -> &CVStrategy {
        &self.strategy
    }

    /// Generate train/test splits over `y.len()` samples
    pub fn split(&self, y: &[usize]) -> Result<Vec<CVSplit>> {
        match &self.strategy {
            CVStrategy::StratifiedKFold { n_splits, shuffle } => {
                self.stratified_k_fold_split(y, *n_splits, *shuffle)
            }
        }
    }

    fn check_splits(n_samples: usize, n_splits: usize) -> Result<()> {
        if n_splits < 2 {
            return Err(MaintenanceError::InvalidParameter {
                name: "n_splits".to_string(),
                value: n_splits.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if n_samples < n_splits {
            return Err(MaintenanceError::DataError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }
        Ok(())
    }

    fn stratified_k_fold_split(&self, y: &[usize], n_splits: usize, shuffle: bool) -> Result<Vec<CVSplit>> {
        Self::check_splits(y.len(), n_splits)?;

        let mut by_class = class_indices(y);
        if by_class.values().all(|idx| idx.len() < n_splits) {
            return Err(MaintenanceError::DataError(format!(
                "n_splits={} cannot be greater than the number of members in each class",
                n_splits
            )));
        }
        if let Some(min) = by_class.values().map(Vec::len).min() {
            if min < n_splits {
                debug!(min_class = min, n_splits, "Least populated class has fewer members than folds");
            }
        }

        if shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
            for indices in by_class.values_mut() {
                indices.shuffle(&mut rng);
            }
        }

        // Round-robin per class, continuing the offset so fold sizes stay even
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut offset = 0;
        for indices in by_class.values() {
            for (i, &idx) in indices.iter().enumerate() {
                folds[(offset + i) % n_splits].push(idx);
            }
            offset += indices.len();
        }
        for fold in folds.iter_mut() {
            fold.sort_unstable();
        }

        Ok(Self::folds_to_splits(folds))
    }

    fn folds_to_splits(folds: Vec<Vec<usize>>) -> Vec<CVSplit> {
        (0..folds.len())
            .map(|fold_idx| {
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();
                CVSplit {
                    train_indices,
                    test_indices: folds[fold_idx].clone(),
                    fold_idx,
                }
            })
            .collect()
    }
}

/// Indices per class label, ordered by label
pub fn class_indices(y: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut map: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (i, &label) in y.iter().enumerate() {
        map.entry(label).or_default().push(i);
    }
    map
}

/// Stratified hold-out split; returns `(train_indices, test_indices)`.
///
/// Each class with at least two members contributes at least one row to
/// each side; a singleton class stays in the training side.
pub fn train_test_split_stratified(y: &[usize], test_size: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_size > 0.0 && test_size < 1.0) {
        return Err(MaintenanceError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: "must be in (0, 1)".to_string(),
        });
    }
    if y.len() < 2 {
        return Err(MaintenanceError::DataError(format!(
            "cannot split {} samples into train and test",
            y.len()
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for (_, mut indices) in class_indices(y) {
        indices.shuffle(&mut rng);
        let n = indices.len();
        let n_test = if n < 2 {
            0
        } else {
            ((n as f64 * test_size).round() as usize).clamp(1, n - 1)
        };
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<usize> {
        // 60 / 30 / 10
        (0..100).map(|i| if i < 60 { 0 } else if i < 90 { 1 } else { 2 }).collect()
    }

    #[test]
    fn test_stratified_folds_preserve_proportions() {
        let y = labels();
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: true }).with_random_state(42);
        let splits = cv.split(&y).unwrap();
        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            let count = |c: usize| split.test_indices.iter().filter(|&&i| y[i] == c).count();
            assert_eq!(count(0), 12);
            assert_eq!(count(1), 6);
            assert_eq!(count(2), 2);
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 100);
        }
    }

    #[test]
    fn test_stratified_is_seeded() {
        let y = labels();
        let a = CrossValidator::new(CVStrategy::default()).with_random_state(7).split(&y).unwrap();
        let b = CrossValidator::new(CVStrategy::default()).with_random_state(7).split(&y).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_stratified_rejects_tiny_classes() {
        let y = vec![0, 0, 1, 1, 2, 2];
        let cv = CrossValidator::new(CVStrategy::StratifiedKFold { n_splits: 5, shuffle: true });
        assert!(cv.split(&y).is_err());
    }

    #[test]
    fn test_train_test_split_stratified() {
        let y = labels();
        let (train, test) = train_test_split_stratified(&y, 0.2, 42).unwrap();
        assert_eq!(test.len(), 20);
        assert_eq!(train.len(), 80);
        assert_eq!(test.iter().filter(|&&i| y[i] == 2).count(), 2);
        assert!(train.iter().all(|i| !test.contains(i)));
    }

    #[test]
    fn test_singleton_class_stays_in_train() {
        let mut y = labels();
        y.push(3);
        let (train, test) = train_test_split_stratified(&y, 0.2, 42).unwrap();
        assert!(train.contains(&100));
        assert!(!test.contains(&100));
    }
}
