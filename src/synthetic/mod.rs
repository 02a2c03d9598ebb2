//! Class-imbalance correction
//!
//! Minority failure modes are enlarged by SMOTE interpolation. Degenerate
//! classes skip balancing for the run and leave a warning in the report.

mod smote;

pub use smote::{Balancer, NeighborPolicy};

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Balancer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    pub enabled: bool,
    pub neighbors: NeighborPolicy,
    pub seed: u64,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            neighbors: NeighborPolicy::default(),
            seed: 42,
        }
    }
}

impl BalancerConfig {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_k_neighbors(mut self, k: usize) -> Self {
        self.neighbors.default_k = k.max(1);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Non-fatal balancing outcome recorded in run metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceWarning {
    /// A class needing synthetic rows has no neighbour to interpolate with
    BalancingDegeneracy { class: usize, size: usize },
}

impl fmt::Display for BalanceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceWarning::BalancingDegeneracy { class, size } => write!(
                f,
                "BalancingDegeneracyWarning: class {} has {} member(s); balancing skipped",
                class, size
            ),
        }
    }
}

/// What the balancer did
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    pub applied: bool,
    pub original_counts: BTreeMap<usize, usize>,
    pub final_counts: BTreeMap<usize, usize>,
    pub synthetic_per_class: BTreeMap<usize, usize>,
    pub k_per_class: BTreeMap<usize, usize>,
    pub warning: Option<BalanceWarning>,
}

impl BalanceReport {
    fn unchanged(counts: BTreeMap<usize, usize>) -> Self {
        Self {
            applied: false,
            final_counts: counts.clone(),
            original_counts: counts,
            synthetic_per_class: BTreeMap::new(),
            k_per_class: BTreeMap::new(),
            warning: None,
        }
    }
}

/// Balancer output
#[derive(Debug, Clone)]
pub struct BalancedData {
    pub features: Array2<f64>,
    pub labels: Vec<usize>,
    pub report: BalanceReport,
}

/// Get class distribution
pub fn class_counts(y: &[usize]) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for &label in y {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}
