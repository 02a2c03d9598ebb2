//! End-to-end training pipeline
//!
//! Chains the stages as pure transformations of immutable context values:
//! `PreprocessedData -> BalancedData -> SplitData -> TrainedCandidates ->
//! TunedCandidates -> Evaluation -> ModelBundle`. Any fatal error aborts the
//! run before anything is persisted.

mod config;

pub use config::PipelineConfig;

use crate::data::{load_records, RawRecord, RAW_NUMERIC_COLUMNS};
use crate::error::Result;
use crate::evaluation::{Evaluation, Evaluator};
use crate::export::{ArtifactStore, BundleMetadata, CvSummary, Manifest, ModelBundle};
use crate::optimizer::{HyperparameterOptimizer, Study};
use crate::preprocessing::{DataPreprocessor, PreprocessedData, SplitData};
use crate::synthetic::{BalanceReport, Balancer};
use crate::training::ModelTrainer;
use chrono::Utc;
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Bundle plus the diagnostics of the run that produced it
#[derive(Debug, Clone)]
pub struct TrainingRun {
    pub bundle: ModelBundle,
    pub balance: BalanceReport,
    pub study: Option<Study>,
    pub duration_secs: f64,
}

/// Runs every training stage in order
#[derive(Debug, Clone, Default)]
pub struct TrainingPipeline {
    config: PipelineConfig,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Train on labelled records and build the bundle in memory
    pub fn run(&self, records: &[RawRecord]) -> Result<TrainingRun> {
        self.config.validate()?;
        let start = Instant::now();
        info!(records = records.len(), seed = self.config.seed, "Training pipeline started");

        let preprocessor = DataPreprocessor::new(self.config.preprocessing.clone());
        let prepared = preprocessor.run(records)?;

        let balanced = Balancer::new(self.config.balancer.clone()).run(&prepared.features, &prepared.labels)?;
        let mut warnings = Vec::new();
        if let Some(w) = &balanced.report.warning {
            warn!(warning = %w, "Balancing skipped");
            warnings.push(w.to_string());
        }

        let split = preprocessor.split_and_scale(&balanced, &prepared.feature_names, prepared.n_classes())?;

        let trained = ModelTrainer::new(self.config.training.clone()).run(&split)?;
        for (family, reason) in &trained.dropped {
            warnings.push(format!("{} dropped during training: {}", family, reason));
        }
        for family in &trained.skipped {
            warnings.push(format!("{} skipped: time budget exhausted", family));
        }
        let n_trained = trained.candidates.len();

        let tuned = HyperparameterOptimizer::new(self.config.optimizer.clone()).run(&split, trained)?;
        if self.config.optimizer.enabled && self.config.optimizer.n_trials > 0 && tuned.candidates.len() == n_trained {
            warnings.push("hyperparameter search added no optimized model".to_string());
        }
        let study = tuned.study.clone();

        let evaluation = Evaluator::new(
            prepared.feature_names.clone(),
            prepared.failure_encoder.classes().to_vec(),
        )
        .run(tuned, &split)?;

        let bundle = self.assemble(&prepared, &split, &balanced.report, evaluation, warnings)?;
        let duration_secs = start.elapsed().as_secs_f64();
        info!(
            model = %bundle.metadata.selected_model,
            accuracy = bundle.metadata.test_metrics.accuracy,
            duration_secs,
            "Training pipeline finished"
        );

        Ok(TrainingRun {
            bundle,
            balance: balanced.report,
            study,
            duration_secs,
        })
    }

    /// Train and persist the bundle at `output`
    pub fn run_and_save(&self, records: &[RawRecord], output: impl AsRef<Path>) -> Result<(TrainingRun, Manifest)> {
        let run = self.run(records)?;
        let manifest = ArtifactStore::save(&run.bundle, output)?;
        Ok((run, manifest))
    }

    /// Load a labelled CSV, train, and persist
    pub fn run_csv(&self, data: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<(TrainingRun, Manifest)> {
        let records = load_records(data)?;
        self.run_and_save(&records, output)
    }

    fn assemble(
        &self,
        prepared: &PreprocessedData,
        split: &SplitData,
        balance: &BalanceReport,
        evaluation: Evaluation,
        warnings: Vec<String>,
    ) -> Result<ModelBundle> {
        let cv_summary: Vec<CvSummary> = evaluation
            .candidates
            .iter()
            .filter_map(|c| {
                c.cv.as_ref().map(|cv| CvSummary {
                    model: c.name.clone(),
                    mean: cv.mean,
                    std: cv.std,
                })
            })
            .collect();

        let (selected, reports, selected_idx) = evaluation.into_selected();
        let report = reports[selected_idx].clone();

        let metadata = BundleMetadata {
            selected_model: selected.name.clone(),
            model_family: selected.family(),
            test_metrics: report.metrics,
            per_class: report.per_class,
            confusion_matrix: report.confusion_matrix,
            feature_importances: report.feature_importances,
            candidates: reports,
            cv_summary,
            trained_at: Utc::now(),
            training_samples: split.y_train.len(),
            test_samples: split.y_test.len(),
            // grade, five readings, label
            dataset_shape: (prepared.outliers.input_rows, RAW_NUMERIC_COLUMNS.len() + 2),
            target_classes: prepared.failure_encoder.classes().to_vec(),
            outliers_removed: prepared.outliers.removed_rows,
            balancing_applied: balance.applied,
            warnings,
            random_state: self.config.seed,
        };

        let bundle = ModelBundle {
            classifier: selected.classifier,
            scaler: split.scaler.clone(),
            grade_encoder: prepared.grade_encoder.clone(),
            failure_encoder: prepared.failure_encoder.clone(),
            feature_names: prepared.feature_names.clone(),
            metadata,
        };
        bundle.validate()?;
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DatasetGenerator, GeneratorConfig};
    use crate::training::{ModelFamily, TrainingConfig, XGBoostConfig};

    fn small_config() -> PipelineConfig {
        let training = TrainingConfig::default()
            .with_families(vec![ModelFamily::XGBoost])
            .with_cv_folds(2)
            .with_xgboost(XGBoostConfig {
                n_estimators: 5,
                max_depth: 3,
                ..Default::default()
            });
        PipelineConfig::default()
            .with_training(training)
            .with_optimizer(crate::optimizer::OptimizerConfig::default().with_enabled(false))
    }

    #[test]
    fn test_pipeline_builds_consistent_bundle() {
        let records = DatasetGenerator::new(GeneratorConfig::default().with_samples(1000)).generate();
        let run = TrainingPipeline::new(small_config()).run(&records).unwrap();
        let bundle = &run.bundle;

        assert!(bundle.validate().is_ok());
        assert_eq!(bundle.n_features(), 11);
        assert_eq!(bundle.metadata.selected_model, "XGBoost");
        assert_eq!(bundle.metadata.candidates.len(), 1);
        assert_eq!(bundle.metadata.test_metrics, bundle.metadata.candidates[0].metrics);
        let total: usize = run.balance.final_counts.values().sum();
        assert_eq!(bundle.metadata.training_samples + bundle.metadata.test_samples, total);
    }
}
