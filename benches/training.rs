use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use predictive_maintenance::data::{DatasetGenerator, GeneratorConfig};
use predictive_maintenance::preprocessing::DataPreprocessor;
use predictive_maintenance::synthetic::{Balancer, BalancerConfig};
use predictive_maintenance::training::{Classifier, Model, ModelConfig, ModelFamily};
use predictive_maintenance::optimizer::OptimizerConfig;
use predictive_maintenance::{InferenceService, PipelineConfig, TrainingPipeline};
use std::collections::HashMap;

fn prepared(n_rows: usize) -> (ndarray::Array2<f64>, Vec<usize>, usize) {
    let records = DatasetGenerator::new(GeneratorConfig::default().with_samples(n_rows)).generate();
    let data = DataPreprocessor::default().run(&records).unwrap();
    let n_classes = data.n_classes();
    (data.features, data.labels, n_classes)
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit");
    group.sample_size(10);

    let (x, y, n_classes) = prepared(5000);
    for family in ModelFamily::all() {
        let config = match ModelConfig::default_for(family, 42) {
            ModelConfig::RandomForest(mut c) => {
                c.n_estimators = 50;
                ModelConfig::RandomForest(c)
            }
            ModelConfig::XGBoost(mut c) => {
                c.n_estimators = 50;
                ModelConfig::XGBoost(c)
            }
            ModelConfig::LightGBM(mut c) => {
                c.n_estimators = 50;
                ModelConfig::LightGBM(c)
            }
        };
        group.bench_with_input(BenchmarkId::new("family", family), &config, |b, config| {
            b.iter(|| {
                let mut model = Classifier::from_config(config);
                model.fit(black_box(&x), &y, n_classes).unwrap();
                model
            })
        });
    }
    group.finish();
}

fn bench_smote(c: &mut Criterion) {
    let mut group = c.benchmark_group("smote");
    group.sample_size(10);

    for n_rows in [2000, 10000] {
        let (x, y, _) = prepared(n_rows);
        group.bench_with_input(BenchmarkId::new("balance", n_rows), &(x, y), |b, (x, y)| {
            b.iter(|| Balancer::new(BalancerConfig::default()).run(black_box(x), y).unwrap())
        });
    }
    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    let records = DatasetGenerator::new(GeneratorConfig::default().with_samples(3000)).generate();
    let mut config = PipelineConfig::default().with_optimizer(OptimizerConfig::default().with_enabled(false));
    config.training.families = vec![ModelFamily::XGBoost];
    let run = TrainingPipeline::new(config).run(&records).unwrap();
    let service = InferenceService::new(run.bundle).unwrap();

    for n_rows in [1, 100, 1000] {
        let batch: Vec<HashMap<String, f64>> = records
            .iter()
            .take(n_rows)
            .map(|r| service.features_for(r).unwrap().into_map())
            .collect();
        group.bench_with_input(BenchmarkId::new("predict", n_rows), &batch, |b, batch| {
            b.iter(|| service.predict(black_box(batch), true).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fit, bench_smote, bench_prediction);
criterion_main!(benches);
