//! Preprocessor stage: raw records → encoded feature matrix, and the
//! hold-out split with scaling fitted on the training side only.

use super::{engineer, validate_reading, LabelEncoder, OutlierDetector, OutlierReport, PreprocessingConfig, StandardScaler};
use crate::data::{feature_names, ProcessedRecord, RawRecord};
use crate::error::{MaintenanceError, Result};
use crate::synthetic::BalancedData;
use crate::training::cross_validation::train_test_split_stratified;
use ndarray::{Array2, Axis};
use tracing::info;

/// Preprocessor output
#[derive(Debug, Clone)]
pub struct PreprocessedData {
    pub records: Vec<ProcessedRecord>,
    pub features: Array2<f64>,
    pub labels: Vec<usize>,
    pub feature_names: Vec<String>,
    pub grade_encoder: LabelEncoder,
    pub failure_encoder: LabelEncoder,
    pub outliers: OutlierReport,
}

impl PreprocessedData {
    pub fn n_classes(&self) -> usize {
        self.failure_encoder.n_classes()
    }
}

/// Scaled train/test matrices
#[derive(Debug, Clone)]
pub struct SplitData {
    pub x_train: Array2<f64>,
    pub y_train: Vec<usize>,
    pub x_test: Array2<f64>,
    pub y_test: Vec<usize>,
    pub scaler: StandardScaler,
    pub n_classes: usize,
}

/// Cleans, encodes and engineers raw records
#[derive(Debug, Clone, Default)]
pub struct DataPreprocessor {
    config: PreprocessingConfig,
}

impl DataPreprocessor {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Validate, filter outliers, fit encoders and engineer features
    pub fn run(&self, records: &[RawRecord]) -> Result<PreprocessedData> {
        if records.is_empty() {
            return Err(MaintenanceError::DataError("no records to preprocess".to_string()));
        }
        for (row, record) in records.iter().enumerate() {
            validate_reading(record, row)?;
            if record.failure_type.is_none() {
                return Err(MaintenanceError::SchemaError(format!(
                    "record {} has no failure label",
                    row
                )));
            }
        }

        let (kept, outliers) = if self.config.remove_outliers {
            OutlierDetector::iqr(self.config.iqr_factor).fit_remove(records)?
        } else {
            let report = OutlierReport {
                input_rows: records.len(),
                ..Default::default()
            };
            (records.iter().cloned().enumerate().collect(), report)
        };
        if kept.is_empty() {
            return Err(MaintenanceError::DataError(
                "outlier filtering removed every record".to_string(),
            ));
        }

        let grade_encoder = LabelEncoder::fit(kept.iter().map(|(_, r)| r.machine_grade.code()))?;
        let failure_encoder = LabelEncoder::fit(kept.iter().filter_map(|(_, r)| r.failure_type.as_deref()))?;

        // `row` is the index in the caller's input
        let processed: Vec<ProcessedRecord> = kept
            .into_iter()
            .map(|(row, raw)| {
                let grade_index = grade_encoder.transform(raw.machine_grade.code())?;
                let label_index = failure_encoder.transform(raw.failure_type.as_deref().unwrap_or_default())?;
                let engineered = engineer(&raw, row)?;
                Ok(ProcessedRecord {
                    raw,
                    grade_index,
                    label_index,
                    engineered,
                })
            })
            .collect::<Result<_>>()?;

        let names = feature_names();
        let flat: Vec<f64> = processed.iter().flat_map(|r| r.feature_row()).collect();
        let features = Array2::from_shape_vec((processed.len(), names.len()), flat)?;
        let labels: Vec<usize> = processed.iter().map(|r| r.label_index).collect();

        info!(
            input_rows = outliers.input_rows,
            outliers_removed = outliers.removed_rows,
            rows = processed.len(),
            classes = failure_encoder.n_classes(),
            "Preprocessed records"
        );

        Ok(PreprocessedData {
            records: processed,
            features,
            labels,
            feature_names: names,
            grade_encoder,
            failure_encoder,
            outliers,
        })
    }

    /// Stratified hold-out split; the scaler sees training rows only
    pub fn split_and_scale(&self, balanced: &BalancedData, feature_names: &[String], n_classes: usize) -> Result<SplitData> {
        let (train_idx, test_idx) =
            train_test_split_stratified(&balanced.labels, self.config.test_size, self.config.random_state)?;

        let x_train_raw = balanced.features.select(Axis(0), &train_idx);
        let x_test_raw = balanced.features.select(Axis(0), &test_idx);
        let y_train: Vec<usize> = train_idx.iter().map(|&i| balanced.labels[i]).collect();
        let y_test: Vec<usize> = test_idx.iter().map(|&i| balanced.labels[i]).collect();

        let scaler = StandardScaler::fit(&x_train_raw, feature_names.to_vec())?;
        let x_train = scaler.transform(&x_train_raw)?;
        let x_test = scaler.transform(&x_test_raw)?;

        info!(train = y_train.len(), test = y_test.len(), "Split and scaled data");
        Ok(SplitData {
            x_train,
            y_train,
            x_test,
            y_test,
            scaler,
            n_classes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MachineGrade;
    use crate::synthetic::{Balancer, BalancerConfig};

    fn records() -> Vec<RawRecord> {
        (0..60)
            .map(|i| {
                let label = if i % 10 == 0 { "Tool Wear Failure" } else { "No Failure" };
                let grade = [MachineGrade::Low, MachineGrade::Medium, MachineGrade::High][i % 3];
                RawRecord::reading(
                    grade,
                    298.0 + (i % 7) as f64 * 0.3,
                    308.0 + (i % 5) as f64 * 0.4,
                    1400.0 + (i % 11) as f64 * 10.0,
                    38.0 + (i % 9) as f64,
                    (i * 3) as f64,
                )
                .with_failure_type(label)
            })
            .collect()
    }

    #[test]
    fn test_run_produces_eleven_features() {
        let data = DataPreprocessor::default().run(&records()).unwrap();
        assert_eq!(data.features.ncols(), 11);
        assert_eq!(data.features.nrows(), data.labels.len());
        assert_eq!(data.grade_encoder.classes(), &["H", "L", "M"]);
        assert_eq!(data.failure_encoder.classes(), &["No Failure", "Tool Wear Failure"]);
        // Type_encoded column matches the grade map
        let medium = data.records.iter().position(|r| r.raw.machine_grade == MachineGrade::Medium).unwrap();
        assert_eq!(data.features[[medium, 5]], 2.0);
    }

    #[test]
    fn test_zero_speed_is_fatal() {
        let mut rs = records();
        rs[4].rotational_speed = 0.0;
        let err = DataPreprocessor::default().run(&rs).unwrap_err();
        assert!(matches!(err, MaintenanceError::ValidationError(_)));
    }

    #[test]
    fn test_engineering_errors_name_the_input_row() {
        // every speed is tiny enough to overflow Tool_wear_rate; row 0 is an outlier
        let mut rs: Vec<RawRecord> = (0..30)
            .map(|i| {
                let air = 298.0 + (i % 5) as f64 * 0.1;
                RawRecord::reading(MachineGrade::Low, air, air + 10.0, 1e-306, 40.0, 100.0 + i as f64)
                    .with_failure_type("No Failure")
            })
            .collect();
        rs[0].air_temperature = 1000.0;
        rs[0].process_temperature = 1010.0;

        let err = DataPreprocessor::default().run(&rs).unwrap_err();
        match err {
            MaintenanceError::ValidationError(msg) => assert!(msg.starts_with("record 1:"), "{}", msg),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_scaler_fit_on_train_only() {
        let pre = DataPreprocessor::default();
        let data = pre.run(&records()).unwrap();
        let balanced = Balancer::new(BalancerConfig::default()).run(&data.features, &data.labels).unwrap();
        let split = pre.split_and_scale(&balanced, &data.feature_names, data.n_classes()).unwrap();

        let means = split.x_train.mean_axis(Axis(0)).unwrap();
        assert!(means.iter().all(|m| m.abs() < 1e-9));
        assert_eq!(split.x_train.nrows() + split.x_test.nrows(), balanced.labels.len());
    }
}
