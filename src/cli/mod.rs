//! Command-line interface
//!
//! `train` fits and persists a bundle, `predict` serves a JSON batch from a
//! bundle, `generate` writes a synthetic dataset and `info` prints a bundle
//! summary.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::*;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::data::{load_records, write_records_csv, DatasetGenerator, GeneratorConfig, MachineGrade, RawRecord};
use crate::data::{COL_AIR_TEMPERATURE, COL_PROCESS_TEMPERATURE, COL_ROTATIONAL_SPEED, COL_TOOL_WEAR, COL_TORQUE, COL_TYPE};
use crate::export::ArtifactStore;
use crate::inference::{InferenceService, PredictionResult};
use crate::pipeline::{PipelineConfig, TrainingPipeline};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}
fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}
fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}
fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv(key: &str, val: &str) {
    println!("  {:<20} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "maintenance")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Machine failure-mode classifier: training and serving")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train candidate models and persist the best as a bundle
    Train {
        /// Labelled CSV with the AI4I column layout
        #[arg(short, long)]
        data: PathBuf,

        /// Bundle directory to write
        #[arg(short, long)]
        output: PathBuf,

        /// JSON pipeline configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Hyperparameter search trials
        #[arg(long)]
        trials: Option<usize>,

        /// Seed for every stochastic stage
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Predict failure modes for a JSON array of records
    Predict {
        /// Bundle directory
        #[arg(short, long)]
        bundle: PathBuf,

        /// JSON array of feature maps or raw readings (with a "Type" key)
        #[arg(short, long)]
        input: PathBuf,

        /// Include the probability of every failure mode
        #[arg(long)]
        probabilities: bool,

        /// Write results as JSON instead of printing a table
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a synthetic labelled dataset
    Generate {
        /// Output CSV file
        #[arg(short, long)]
        output: PathBuf,

        /// Number of rows
        #[arg(short = 'n', long, default_value = "10000")]
        samples: usize,

        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Show the metadata of a bundle
    Info {
        /// Bundle directory
        #[arg(short, long)]
        bundle: PathBuf,
    },
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Train {
            data,
            output,
            config,
            trials,
            seed,
        } => cmd_train(&data, &output, config.as_deref(), trials, seed),
        Commands::Predict {
            bundle,
            input,
            probabilities,
            output,
        } => cmd_predict(&bundle, &input, probabilities, output.as_deref()),
        Commands::Generate { output, samples, seed } => cmd_generate(&output, samples, seed),
        Commands::Info { bundle } => cmd_info(&bundle),
    }
}

pub fn cmd_train(
    data_path: &Path,
    output: &Path,
    config_path: Option<&Path>,
    trials: Option<usize>,
    seed: Option<u64>,
) -> anyhow::Result<()> {
    section("Train");

    let mut config = match config_path {
        Some(p) => PipelineConfig::from_file(p)?,
        None => PipelineConfig::default(),
    };
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    if let Some(trials) = trials {
        config = config.with_trials(trials);
    }

    step_run("Loading data");
    let start = Instant::now();
    let records = load_records(data_path).with_context(|| format!("loading {}", data_path.display()))?;
    step_done(&format!("{} rows in {:.2?}", records.len(), start.elapsed()));

    step_run("Training");
    let (run, manifest) = TrainingPipeline::new(config).run_and_save(&records, output)?;
    step_done(&format!("{:.1}s", run.duration_secs));

    let meta = &run.bundle.metadata;
    println!();
    println!("  {:<28} {:>10} {:>10}", muted("Model"), muted("CV mean"), muted("Test acc"));
    println!("  {}", dim(&"─".repeat(50)));
    for report in &meta.candidates {
        let cv = report.cv_mean.map(|m| format!("{:.4}", m)).unwrap_or_else(|| "-".to_string());
        let line = format!("  {:<28} {:>10} {:>10.4}", report.name, cv, report.metrics.accuracy);
        if report.name == meta.selected_model {
            println!("{}", line.white().bold());
        } else {
            println!("{}", line);
        }
    }
    println!("  {}", dim(&"─".repeat(50)));

    println!();
    kv("Selected", &meta.selected_model);
    kv("Accuracy", &format!("{:.4}", meta.test_metrics.accuracy));
    kv("Weighted F1", &format!("{:.4}", meta.test_metrics.f1_score));
    kv("Train / test", &format!("{} / {}", meta.training_samples, meta.test_samples));
    kv("Outliers removed", &meta.outliers_removed.to_string());
    kv("Bundle", &format!("{} ({})", output.display(), manifest.bundle_id));
    for w in &meta.warnings {
        println!("  {} {}", "warning".yellow(), w);
    }
    println!();
    Ok(())
}

fn number(obj: &serde_json::Map<String, Value>, key: &str, row: usize) -> anyhow::Result<f64> {
    obj.get(key)
        .and_then(Value::as_f64)
        .with_context(|| format!("record {}: '{}' is missing or not a number", row, key))
}

/// Raw readings carry a "Type" grade; anything else is treated as a feature map
enum Request {
    Features(HashMap<String, f64>),
    Reading(RawRecord),
}

fn parse_request(row: usize, value: &Value) -> anyhow::Result<Request> {
    let obj = value
        .as_object()
        .with_context(|| format!("record {} is not a JSON object", row))?;

    if let Some(grade) = obj.get(COL_TYPE).and_then(Value::as_str) {
        let grade: MachineGrade = grade.parse()?;
        return Ok(Request::Reading(RawRecord::reading(
            grade,
            number(obj, COL_AIR_TEMPERATURE, row)?,
            number(obj, COL_PROCESS_TEMPERATURE, row)?,
            number(obj, COL_ROTATIONAL_SPEED, row)?,
            number(obj, COL_TORQUE, row)?,
            number(obj, COL_TOOL_WEAR, row)?,
        )));
    }

    let mut features = HashMap::with_capacity(obj.len());
    for (k, v) in obj {
        let x = v
            .as_f64()
            .with_context(|| format!("record {}: '{}' is not a number", row, k))?;
        features.insert(k.clone(), x);
    }
    Ok(Request::Features(features))
}

pub fn cmd_predict(
    bundle_path: &Path,
    input: &Path,
    probabilities: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading bundle");
    let service = InferenceService::load(bundle_path)?;
    step_done(&service.bundle().metadata.selected_model);

    let text = std::fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let values: Vec<Value> = match serde_json::from_str::<Value>(&text)? {
        Value::Array(items) => items,
        single @ Value::Object(_) => vec![single],
        _ => anyhow::bail!("{} must contain a JSON object or array", input.display()),
    };

    let mut records = Vec::with_capacity(values.len());
    for (i, v) in values.iter().enumerate() {
        let features = match parse_request(i, v)? {
            Request::Features(f) => f,
            Request::Reading(r) => service.features_for(&r)?.into_map(),
        };
        records.push(features);
    }

    step_run(&format!("Predicting {} records", records.len()));
    let start = Instant::now();
    let results = service.predict(&records, probabilities)?;
    step_done(&format!("{:.2?}", start.elapsed()));

    match output {
        Some(path) => {
            std::fs::write(path, serde_json::to_string_pretty(&results)?)?;
            println!("  {} {}", ok("✓"), format!("Wrote {}", path.display()));
        }
        None => print_predictions(&results),
    }
    println!();
    Ok(())
}

fn print_predictions(results: &[PredictionResult]) {
    println!();
    for (i, r) in results.iter().enumerate() {
        let label = if r.label == crate::data::NO_FAILURE {
            r.label.green()
        } else {
            r.label.red().bold()
        };
        println!("  {:>4}  {}", muted(&i.to_string()), label);
        if let Some(probs) = &r.probabilities {
            for (class, p) in probs {
                println!("        {:<28} {:.4}", dim(class), p);
            }
        }
    }
}

pub fn cmd_generate(output: &Path, samples: usize, seed: u64) -> anyhow::Result<()> {
    section("Generate");

    step_run(&format!("Generating {} rows", samples));
    let records = DatasetGenerator::new(GeneratorConfig::default().with_samples(samples).with_seed(seed)).generate();
    write_records_csv(&records, output)?;
    step_done(&output.display().to_string());
    println!();
    Ok(())
}

pub fn cmd_info(bundle_path: &Path) -> anyhow::Result<()> {
    section("Bundle");

    let manifest = ArtifactStore::read_manifest(bundle_path)?;
    let bundle = ArtifactStore::load(bundle_path)?;
    let meta = &bundle.metadata;

    kv("Bundle id", &manifest.bundle_id.to_string());
    kv("Created", &manifest.created_at.to_rfc3339());
    kv("Model", &format!("{} ({})", meta.selected_model, meta.model_family));
    kv("Accuracy", &format!("{:.4}", meta.test_metrics.accuracy));
    kv("Features", &manifest.n_features.to_string());
    kv("Classes", &meta.target_classes.join(", "));

    if let Some(importances) = &meta.feature_importances {
        section("Feature importances");
        for (name, value) in importances {
            println!("  {:<28} {:.4}", muted(name), value);
        }
    }

    section("Per class");
    for c in &meta.per_class {
        println!(
            "  {:<28} p={:.3} r={:.3} f1={:.3} n={}",
            c.label, c.precision, c.recall, c.f1_score, c.support
        );
    }
    println!();
    Ok(())
}
