//! Label encoding for categorical fields

use crate::error::{MaintenanceError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Dense label encoder. Classes are sorted lexicographically at fit time and
/// never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Fit on the observed values
    pub fn fit<I, S>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes: BTreeSet<String> = values.into_iter().map(|v| v.as_ref().to_string()).collect();
        if classes.is_empty() {
            return Err(MaintenanceError::DataError(
                "cannot fit a label encoder on no values".to_string(),
            ));
        }
        Ok(Self {
            classes: classes.into_iter().collect(),
        })
    }

    /// Rebuild from persisted classes; they must be sorted and unique
    pub fn from_classes(classes: Vec<String>) -> Result<Self> {
        if classes.is_empty() || classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MaintenanceError::BundleConsistencyError(
                "encoder classes must be non-empty, sorted and unique".to_string(),
            ));
        }
        Ok(Self { classes })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn transform(&self, value: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(value))
            .map_err(|_| {
                MaintenanceError::ValidationError(format!(
                    "unknown label '{}' (known: {:?})",
                    value, self.classes
                ))
            })
    }

    pub fn inverse_transform(&self, index: usize) -> Result<&str> {
        self.classes
            .get(index)
            .map(|s| s.as_str())
            .ok_or_else(|| {
                MaintenanceError::ValidationError(format!(
                    "label index {} out of range for {} classes",
                    index,
                    self.classes.len()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_encoding_is_sorted() {
        let enc = LabelEncoder::fit(["M", "L", "H", "L"]).unwrap();
        assert_eq!(enc.classes(), &["H", "L", "M"]);
        assert_eq!(enc.transform("H").unwrap(), 0);
        assert_eq!(enc.transform("L").unwrap(), 1);
        assert_eq!(enc.transform("M").unwrap(), 2);
        assert_eq!(enc.inverse_transform(2).unwrap(), "M");
    }

    #[test]
    fn test_unknown_label() {
        let enc = LabelEncoder::fit(["No Failure", "Power Failure"]).unwrap();
        assert!(enc.transform("Overstrain Failure").is_err());
        assert!(enc.inverse_transform(5).is_err());
    }

    #[test]
    fn test_from_classes_rejects_unsorted() {
        assert!(LabelEncoder::from_classes(vec!["b".into(), "a".into()]).is_err());
        assert!(LabelEncoder::from_classes(vec!["a".into(), "b".into()]).is_ok());
    }
}
