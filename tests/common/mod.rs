//! Shared fixtures for integration tests

#![allow(dead_code)]

use predictive_maintenance::data::generator::RANDOM_FAILURE;
use predictive_maintenance::data::{DatasetGenerator, GeneratorConfig, MachineGrade, RawRecord};
use predictive_maintenance::optimizer::{OptimizerConfig, SearchBounds};
use predictive_maintenance::training::{LightGBMConfig, RandomForestConfig, TrainingConfig, XGBoostConfig};
use predictive_maintenance::{PipelineConfig, TrainingPipeline, TrainingRun};
use std::sync::OnceLock;

/// Labelled synthetic readings; random failures carry no signal and are dropped
pub fn training_records(n: usize) -> Vec<RawRecord> {
    DatasetGenerator::new(GeneratorConfig::default().with_samples(n).with_seed(7))
        .generate()
        .into_iter()
        .filter(|r| r.failure_type.as_deref() != Some(RANDOM_FAILURE))
        .collect()
}

/// Small models and a short search so the full pipeline runs quickly
pub fn fast_config() -> PipelineConfig {
    let training = TrainingConfig::default()
        .with_cv_folds(3)
        .with_random_forest(RandomForestConfig {
            n_estimators: 20,
            max_depth: Some(10),
            ..Default::default()
        })
        .with_xgboost(XGBoostConfig {
            n_estimators: 30,
            max_depth: 5,
            ..Default::default()
        })
        .with_lightgbm(LightGBMConfig {
            n_estimators: 30,
            max_depth: 5,
            ..Default::default()
        });
    let optimizer = OptimizerConfig::default()
        .with_n_trials(3)
        .with_n_startup_trials(2)
        .with_bounds(SearchBounds {
            n_estimators: (10, 30),
            max_depth: (3, 5),
            ..Default::default()
        });
    PipelineConfig::default()
        .with_training(training)
        .with_optimizer(optimizer)
}

/// One training run shared by every test in a binary
pub fn trained() -> &'static TrainingRun {
    static RUN: OnceLock<TrainingRun> = OnceLock::new();
    RUN.get_or_init(|| {
        TrainingPipeline::new(fast_config())
            .run(&training_records(2000))
            .expect("training run")
    })
}

pub fn normal_reading() -> RawRecord {
    RawRecord::reading(MachineGrade::Medium, 298.0, 308.0, 1500.0, 40.0, 80.0)
}

pub fn high_wear_reading() -> RawRecord {
    RawRecord::reading(MachineGrade::Medium, 298.0, 308.0, 1500.0, 40.0, 250.0)
}
