//! Outlier detection and removal
//!
//! IQR bounds are computed per raw numeric column; a row flagged by any
//! column is dropped once.

use crate::data::{RawRecord, RAW_NUMERIC_COLUMNS};
use crate::error::{MaintenanceError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fitted bounds for a column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Summary of a filtering pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierReport {
    pub input_rows: usize,
    pub removed_rows: usize,
    /// Rows flagged per column, in `RAW_NUMERIC_COLUMNS` order
    pub flagged_per_column: Vec<usize>,
}

/// IQR outlier detector over the five raw numeric columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierDetector {
    factor: f64,
    bounds: Vec<OutlierBounds>,
    is_fitted: bool,
}

impl Default for OutlierDetector {
    fn default() -> Self {
        Self::iqr(1.5)
    }
}

impl OutlierDetector {
    /// Create with IQR method
    pub fn iqr(factor: f64) -> Self {
        Self {
            factor,
            bounds: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Fitted bounds, in `RAW_NUMERIC_COLUMNS` order
    pub fn bounds(&self) -> &[OutlierBounds] {
        &self.bounds
    }

    /// Compute per-column bounds
    pub fn fit(&mut self, records: &[RawRecord]) -> Result<&mut Self> {
        if records.is_empty() {
            return Err(MaintenanceError::DataError(
                "cannot fit outlier bounds on an empty table".to_string(),
            ));
        }
        if !(self.factor.is_finite() && self.factor >= 0.0) {
            return Err(MaintenanceError::InvalidParameter {
                name: "iqr_factor".to_string(),
                value: self.factor.to_string(),
                reason: "must be a non-negative finite number".to_string(),
            });
        }

        self.bounds = (0..RAW_NUMERIC_COLUMNS.len())
            .map(|col| {
                let mut values: Vec<f64> = records.iter().map(|r| r.numeric_values()[col]).collect();
                values.sort_by(|a, b| a.total_cmp(b));
                let q1 = quantile_sorted(&values, 0.25);
                let q3 = quantile_sorted(&values, 0.75);
                let iqr = q3 - q1;
                OutlierBounds {
                    q1,
                    q3,
                    lower: q1 - self.factor * iqr,
                    upper: q3 + self.factor * iqr,
                }
            })
            .collect();

        self.is_fitted = true;
        Ok(self)
    }

    /// Indices of rows outside the bounds of at least one column
    pub fn flagged_rows(&self, records: &[RawRecord]) -> Result<BTreeSet<usize>> {
        if !self.is_fitted {
            return Err(MaintenanceError::ModelNotFitted);
        }
        Ok(records
            .iter()
            .enumerate()
            .filter(|(_, r)| {
                r.numeric_values()
                    .iter()
                    .zip(&self.bounds)
                    .any(|(v, b)| !b.contains(*v))
            })
            .map(|(i, _)| i)
            .collect())
    }

    /// Fit on `records` and drop the union of flagged rows.
    ///
    /// Kept rows are paired with their index in `records`.
    pub fn fit_remove(&mut self, records: &[RawRecord]) -> Result<(Vec<(usize, RawRecord)>, OutlierReport)> {
        self.fit(records)?;
        let flagged = self.flagged_rows(records)?;

        let flagged_per_column = self
            .bounds
            .iter()
            .enumerate()
            .map(|(col, b)| {
                records
                    .iter()
                    .filter(|r| !b.contains(r.numeric_values()[col]))
                    .count()
            })
            .collect();

        let kept: Vec<(usize, RawRecord)> = records
            .iter()
            .enumerate()
            .filter(|(i, _)| !flagged.contains(i))
            .map(|(i, r)| (i, r.clone()))
            .collect();

        let report = OutlierReport {
            input_rows: records.len(),
            removed_rows: flagged.len(),
            flagged_per_column,
        };
        Ok((kept, report))
    }
}

/// Quantile with linear interpolation between closest ranks.
///
/// `sorted` must be ascending and non-empty.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MachineGrade;

    fn record(air: f64, wear: f64) -> RawRecord {
        RawRecord::reading(MachineGrade::Low, air, air + 10.0, 1500.0, 40.0, wear)
    }

    #[test]
    fn test_quantile_linear() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile_sorted(&v, 0.25) - 1.75).abs() < 1e-12);
        assert!((quantile_sorted(&v, 0.75) - 3.25).abs() < 1e-12);
        assert_eq!(quantile_sorted(&[7.0], 0.5), 7.0);
    }

    #[test]
    fn test_union_of_flags_removed_once() {
        let mut records: Vec<RawRecord> = (0..20).map(|i| record(298.0 + (i % 5) as f64 * 0.1, 50.0 + i as f64)).collect();
        // outlier in air temperature only
        records.push(record(400.0, 55.0));
        // outlier in tool wear only
        records.push(record(298.2, 5000.0));

        let mut detector = OutlierDetector::iqr(1.5);
        let (kept, report) = detector.fit_remove(&records).unwrap();
        assert_eq!(report.input_rows, 22);
        assert_eq!(report.removed_rows, 2);
        assert_eq!(kept.len(), 20);
        assert!(kept.iter().all(|(i, _)| *i < 20));

        for (col, b) in detector.bounds().iter().enumerate() {
            for (_, r) in &kept {
                assert!(b.contains(r.numeric_values()[col]));
            }
        }
    }

    #[test]
    fn test_deterministic() {
        let records: Vec<RawRecord> = (0..50).map(|i| record(290.0 + (i * 7 % 13) as f64, (i * 31 % 97) as f64)).collect();
        let (a, _) = OutlierDetector::iqr(1.5).fit_remove(&records).unwrap();
        let (b, _) = OutlierDetector::iqr(1.5).fit_remove(&records).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unfitted_detector() {
        let detector = OutlierDetector::default();
        assert!(matches!(
            detector.flagged_rows(&[record(298.0, 1.0)]),
            Err(MaintenanceError::ModelNotFitted)
        ));
    }
}
