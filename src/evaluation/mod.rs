//! Held-out evaluation: metrics, confusion matrices and model selection

mod evaluator;
mod metrics;

pub use evaluator::{select_best, Evaluation, Evaluator, ModelEvaluation};
pub use metrics::{accuracy, confusion_matrix, ClassReport, ClassificationMetrics};
