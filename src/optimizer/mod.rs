//! Hyperparameter optimization module
//!
//! Provides hyperparameter search for the boosted model families:
//! - Tree-structured Parzen Estimators (TPE)
//! - Random search
//! - Trial and wall-clock budgets with optional early stopping

mod config;
mod search_space;
mod optimizer;
mod samplers;
mod tuner;

pub use config::{OptimizerConfig, SearchBounds};
pub use search_space::{Parameter, ParameterType, ParameterValue, SearchSpace, TrialParams};
pub use optimizer::{Search, Study, TrialResult, TrialState};
pub use samplers::{RandomSampler, Sampler, SamplerType, TPESampler};
pub use tuner::{apply_params, HyperparameterOptimizer, TunedCandidates};
