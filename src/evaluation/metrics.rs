//! Classification metrics over integer-encoded labels

use serde::{Deserialize, Serialize};

/// Fraction of exact matches; 0 for empty input
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    correct as f64 / y_true.len() as f64
}

/// `matrix[true][predicted]` counts
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Vec<Vec<usize>> {
    let mut matrix = vec![vec![0; n_classes]; n_classes];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t < n_classes && p < n_classes {
            matrix[t][p] += 1;
        }
    }
    matrix
}

/// Per-class precision, recall, F1 and support
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Test-set metrics for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    /// Support-weighted precision
    pub precision: f64,
    /// Support-weighted recall
    pub recall: f64,
    /// Support-weighted F1
    pub f1_score: f64,
    pub n_samples: usize,
}

impl ClassificationMetrics {
    /// Compute headline metrics plus the per-class breakdown.
    ///
    /// A class that is never predicted has precision 0 (and therefore F1 0).
    pub fn compute(y_true: &[usize], y_pred: &[usize], class_names: &[String]) -> (Self, Vec<ClassReport>) {
        let n_classes = class_names.len();
        let matrix = confusion_matrix(y_true, y_pred, n_classes);

        let per_class: Vec<ClassReport> = (0..n_classes)
            .map(|c| {
                let tp = matrix[c][c] as f64;
                let predicted: usize = matrix.iter().map(|row| row[c]).sum();
                let support: usize = matrix[c].iter().sum();
                let precision = if predicted > 0 { tp / predicted as f64 } else { 0.0 };
                let recall = if support > 0 { tp / support as f64 } else { 0.0 };
                let f1_score = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassReport {
                    label: class_names[c].clone(),
                    precision,
                    recall,
                    f1_score,
                    support,
                }
            })
            .collect();

        let total: usize = per_class.iter().map(|r| r.support).sum();
        let weighted = |f: fn(&ClassReport) -> f64| -> f64 {
            if total == 0 {
                return 0.0;
            }
            per_class.iter().map(|r| f(r) * r.support as f64).sum::<f64>() / total as f64
        };

        let metrics = Self {
            accuracy: accuracy(y_true, y_pred),
            precision: weighted(|r| r.precision),
            recall: weighted(|r| r.recall),
            f1_score: weighted(|r| r.f1_score),
            n_samples: y_true.len(),
        };
        (metrics, per_class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("c{}", i)).collect()
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[0, 1, 1, 2], &[0, 1, 2, 2]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_confusion_matrix() {
        let m = confusion_matrix(&[0, 0, 1, 2], &[0, 1, 1, 1], 3);
        assert_eq!(m, vec![vec![1, 1, 0], vec![0, 1, 0], vec![0, 1, 0]]);
    }

    #[test]
    fn test_weighted_metrics() {
        let y_true = [0, 0, 0, 1, 1, 2];
        let y_pred = [0, 0, 1, 1, 1, 1];
        let (m, per_class) = ClassificationMetrics::compute(&y_true, &y_pred, &names(3));

        assert!((m.accuracy - 4.0 / 6.0).abs() < 1e-12);
        // class 2 never predicted: precision 0
        assert_eq!(per_class[2].precision, 0.0);
        assert_eq!(per_class[2].support, 1);
        // recall weighted by support equals accuracy
        assert!((m.recall - m.accuracy).abs() < 1e-12);
        // precision: (3*1.0 + 2*0.5 + 1*0) / 6
        assert!((m.precision - 4.0 / 6.0).abs() < 1e-12);
    }
}
