//! SMOTE oversampling with a per-class neighbour policy

use super::{class_counts, BalanceReport, BalanceWarning, BalancedData, BalancerConfig};
use crate::error::{MaintenanceError, Result};
use crate::training::cross_validation::class_indices;
use ndarray::{Array2, ArrayView2};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::{debug, info, warn};

/// Ordered float for BinaryHeap-based partial sort
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then(self.1.cmp(&other.1))
    }
}

/// Neighbour count as a function of class size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborPolicy {
    /// k used when the class has more than `default_k` members
    pub default_k: usize,
    /// Upper bound on k for classes too small for the default
    pub reduced_k: usize,
}

impl Default for NeighborPolicy {
    fn default() -> Self {
        Self {
            default_k: 5,
            reduced_k: 3,
        }
    }
}

impl NeighborPolicy {
    /// Neighbour count for a class of `n` members.
    ///
    /// `None` means no neighbour exists at all (`n <= 1`).
    pub fn k_for(&self, n: usize) -> Option<usize> {
        if n <= 1 {
            None
        } else if n > self.default_k {
            Some(self.default_k)
        } else if n > 3 {
            Some((n - 1).min(self.reduced_k))
        } else {
            Some(1)
        }
    }
}

/// SMOTE (Synthetic Minority Over-sampling Technique)
#[derive(Debug, Clone)]
pub struct Balancer {
    config: BalancerConfig,
}

impl Balancer {
    pub fn new(config: BalancerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BalancerConfig {
        &self.config
    }

    /// Enlarge every minority class to the majority count.
    ///
    /// Input rows are kept in order; synthetic rows are appended class by class.
    pub fn run(&self, x: &Array2<f64>, y: &[usize]) -> Result<BalancedData> {
        if x.nrows() != y.len() {
            return Err(MaintenanceError::ShapeError {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{}", y.len()),
            });
        }

        let counts = class_counts(y);
        let unchanged = |report: BalanceReport| BalancedData {
            features: x.clone(),
            labels: y.to_vec(),
            report,
        };

        if !self.config.enabled {
            info!("Balancing disabled; keeping original class counts");
            return Ok(unchanged(BalanceReport::unchanged(counts)));
        }

        let max_count = counts.values().copied().max().unwrap_or(0);
        if counts.values().all(|&c| c == max_count) {
            debug!(classes = counts.len(), "Class counts already equal; nothing to synthesise");
            return Ok(unchanged(BalanceReport::unchanged(counts)));
        }

        // Resolve k for every class that needs rows before generating anything
        let mut k_per_class = BTreeMap::new();
        for (&class, &count) in &counts {
            if count == max_count {
                continue;
            }
            match self.config.neighbors.k_for(count) {
                Some(k) => {
                    k_per_class.insert(class, k);
                }
                None => {
                    let warning = BalanceWarning::BalancingDegeneracy { class, size: count };
                    warn!(class, size = count, "{}", warning);
                    let mut report = BalanceReport::unchanged(counts);
                    report.warning = Some(warning);
                    return Ok(unchanged(report));
                }
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let indices = class_indices(y);
        let n_features = x.ncols();

        let mut synthetic: Vec<f64> = Vec::new();
        let mut synthetic_y: Vec<usize> = Vec::new();
        let mut synthetic_per_class = BTreeMap::new();

        for (&class, &k) in &k_per_class {
            let members = &indices[&class];
            let needed = max_count - members.len();
            let neighbours = nearest_neighbours(x.view(), members, k);

            for _ in 0..needed {
                let i = rng.gen_range(0..members.len());
                let j = neighbours[i][rng.gen_range(0..neighbours[i].len())];
                let gap: f64 = rng.gen();
                let (p, n) = (x.row(members[i]), x.row(j));
                synthetic.extend(p.iter().zip(n.iter()).map(|(&p, &n)| p + gap * (n - p)));
                synthetic_y.push(class);
            }

            debug!(class, k, generated = needed, "Synthesised minority rows");
            synthetic_per_class.insert(class, needed);
        }

        let n_synthetic = synthetic_y.len();
        let extra = Array2::from_shape_vec((n_synthetic, n_features), synthetic)?;
        let features = ndarray::concatenate(ndarray::Axis(0), &[x.view(), extra.view()])?;
        let mut labels = y.to_vec();
        labels.extend_from_slice(&synthetic_y);

        let report = BalanceReport {
            applied: true,
            final_counts: class_counts(&labels),
            original_counts: counts,
            synthetic_per_class,
            k_per_class,
            warning: None,
        };
        info!(
            original_rows = y.len(),
            synthetic_rows = n_synthetic,
            per_class = max_count,
            "Balanced classes with SMOTE"
        );

        Ok(BalancedData {
            features,
            labels,
            report,
        })
    }
}

/// k nearest same-class neighbours (by row index into `x`) for each member
fn nearest_neighbours(x: ArrayView2<f64>, members: &[usize], k: usize) -> Vec<Vec<usize>> {
    members
        .par_iter()
        .map(|&a| {
            let point = x.row(a);
            let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);
            for &b in members {
                if a == b {
                    continue;
                }
                let dist: f64 = point
                    .iter()
                    .zip(x.row(b).iter())
                    .map(|(p, q)| (p - q).powi(2))
                    .sum();
                let candidate = DistIdx(dist, b);
                if heap.len() < k {
                    heap.push(candidate);
                } else if heap.peek().map_or(false, |worst| candidate < *worst) {
                    heap.pop();
                    heap.push(candidate);
                }
            }
            heap.into_sorted_vec().into_iter().map(|DistIdx(_, i)| i).collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn imbalanced() -> (Array2<f64>, Vec<usize>) {
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for i in 0..20 {
            rows.extend_from_slice(&[i as f64, (i * 2) as f64]);
            y.push(0);
        }
        for i in 0..8 {
            rows.extend_from_slice(&[100.0 + i as f64, 50.0 - i as f64]);
            y.push(1);
        }
        (Array2::from_shape_vec((28, 2), rows).unwrap(), y)
    }

    #[test]
    fn test_neighbor_policy() {
        let policy = NeighborPolicy::default();
        assert_eq!(policy.k_for(100), Some(5));
        assert_eq!(policy.k_for(6), Some(5));
        assert_eq!(policy.k_for(5), Some(3));
        assert_eq!(policy.k_for(4), Some(3));
        assert_eq!(policy.k_for(3), Some(1));
        assert_eq!(policy.k_for(2), Some(1));
        assert_eq!(policy.k_for(1), None);
    }

    #[test]
    fn test_balances_to_majority() {
        let (x, y) = imbalanced();
        let out = Balancer::new(BalancerConfig::default()).run(&x, &y).unwrap();
        assert!(out.report.applied);
        assert_eq!(out.report.final_counts[&0], 20);
        assert_eq!(out.report.final_counts[&1], 20);
        assert_eq!(out.features.nrows(), 40);
        // originals preserved in place
        assert_eq!(out.features.row(0), x.row(0));

        // synthetic rows lie inside the minority cluster's bounding box
        for (row, &label) in out.features.rows().into_iter().zip(&out.labels).skip(28) {
            assert_eq!(label, 1);
            assert!(row[0] >= 100.0 && row[0] <= 107.0);
        }
    }

    #[test]
    fn test_equal_counts_unchanged() {
        let x = array![[0.0, 1.0], [1.0, 0.0], [5.0, 5.0], [6.0, 6.0]];
        let y = vec![0, 0, 1, 1];
        let out = Balancer::new(BalancerConfig::default()).run(&x, &y).unwrap();
        assert!(!out.report.applied);
        assert_eq!(out.features, x);
        assert_eq!(out.labels, y);
    }

    #[test]
    fn test_singleton_class_skips_balancing() {
        let (x, mut y) = imbalanced();
        y[27] = 2;
        let out = Balancer::new(BalancerConfig::default()).run(&x, &y).unwrap();
        assert!(!out.report.applied);
        assert_eq!(out.labels, y);
        assert_eq!(
            out.report.warning,
            Some(BalanceWarning::BalancingDegeneracy { class: 2, size: 1 })
        );
    }

    #[test]
    fn test_small_classes_use_reduced_k() {
        let (x, mut y) = imbalanced();
        // class 1 shrinks to 3 members, class 2 gets 5
        for label in y.iter_mut().skip(20).take(5) {
            *label = 2;
        }
        let out = Balancer::new(BalancerConfig::default()).run(&x, &y).unwrap();
        assert_eq!(out.report.k_per_class[&1], 1);
        assert_eq!(out.report.k_per_class[&2], 3);
        assert_eq!(out.report.final_counts[&1], 20);
        assert_eq!(out.report.final_counts[&2], 20);
    }

    #[test]
    fn test_seeded() {
        let (x, y) = imbalanced();
        let a = Balancer::new(BalancerConfig::default()).run(&x, &y).unwrap();
        let b = Balancer::new(BalancerConfig::default()).run(&x, &y).unwrap();
        assert_eq!(a.features, b.features);
    }
}
