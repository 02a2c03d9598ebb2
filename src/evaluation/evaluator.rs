//! Held-out evaluation and model selection

use super::metrics::{confusion_matrix, ClassReport, ClassificationMetrics};
use crate::error::{MaintenanceError, Result};
use crate::optimizer::TunedCandidates;
use crate::preprocessing::SplitData;
use crate::training::{Candidate, Model};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Test-set report for one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluation {
    pub name: String,
    pub metrics: ClassificationMetrics,
    pub confusion_matrix: Vec<Vec<usize>>,
    pub per_class: Vec<ClassReport>,
    /// `(feature, importance)` sorted by importance, when the model exposes them
    pub feature_importances: Option<Vec<(String, f64)>>,
    pub cv_mean: Option<f64>,
    pub cv_std: Option<f64>,
}

/// Output of the evaluation stage
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub candidates: Vec<Candidate>,
    pub reports: Vec<ModelEvaluation>,
    /// Index of the deployed model in `candidates`
    pub selected: usize,
}

impl Evaluation {
    pub fn selected_candidate(&self) -> &Candidate {
        &self.candidates[self.selected]
    }

    pub fn selected_report(&self) -> &ModelEvaluation {
        &self.reports[self.selected]
    }

    /// Consume the evaluation, keeping the deployed model and all reports
    pub fn into_selected(mut self) -> (Candidate, Vec<ModelEvaluation>, usize) {
        let selected = self.selected;
        let candidate = self.candidates.swap_remove(selected);
        (candidate, self.reports, selected)
    }
}

/// Index of the highest score; ties go to the lowest index
pub fn select_best(scores: &[f64]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}

/// Scores every candidate once on the test split and selects the deployed model
#[derive(Debug, Clone)]
pub struct Evaluator {
    feature_names: Vec<String>,
    class_names: Vec<String>,
}

impl Evaluator {
    pub fn new(feature_names: Vec<String>, class_names: Vec<String>) -> Self {
        Self {
            feature_names,
            class_names,
        }
    }

    pub fn evaluate(&self, candidate: &Candidate, data: &SplitData) -> Result<ModelEvaluation> {
        let pred = candidate.classifier.predict(&data.x_test)?;
        let (metrics, per_class) = ClassificationMetrics::compute(&data.y_test, &pred, &self.class_names);

        let feature_importances = candidate.classifier.feature_importances().map(|imp| {
            let mut named: Vec<(String, f64)> = self.feature_names.iter().cloned().zip(imp).collect();
            named.sort_by(|a, b| b.1.total_cmp(&a.1));
            named
        });

        Ok(ModelEvaluation {
            name: candidate.name.clone(),
            metrics,
            confusion_matrix: confusion_matrix(&data.y_test, &pred, self.class_names.len()),
            per_class,
            feature_importances,
            cv_mean: candidate.cv.as_ref().map(|c| c.mean),
            cv_std: candidate.cv.as_ref().map(|c| c.std),
        })
    }

    pub fn run(&self, tuned: TunedCandidates, data: &SplitData) -> Result<Evaluation> {
        if data.y_test.is_empty() {
            return Err(MaintenanceError::DataError("test split is empty".to_string()));
        }

        let reports = tuned
            .candidates
            .iter()
            .map(|c| self.evaluate(c, data))
            .collect::<Result<Vec<_>>>()?;

        for r in &reports {
            info!(
                model = %r.name,
                accuracy = r.metrics.accuracy,
                precision = r.metrics.precision,
                recall = r.metrics.recall,
                f1 = r.metrics.f1_score,
                "Model evaluated"
            );
        }

        let accuracies: Vec<f64> = reports.iter().map(|r| r.metrics.accuracy).collect();
        let selected = select_best(&accuracies)
            .ok_or_else(|| MaintenanceError::TrainingConvergenceFailure("no candidate to evaluate".to_string()))?;
        info!(model = %reports[selected].name, accuracy = accuracies[selected], "Selected model");

        Ok(Evaluation {
            candidates: tuned.candidates,
            reports,
            selected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_best_ties_to_lowest_index() {
        assert_eq!(select_best(&[0.9, 0.95, 0.95]), Some(1));
        assert_eq!(select_best(&[0.5]), Some(0));
        assert_eq!(select_best(&[]), None);
    }

    #[test]
    fn test_select_best_ignores_ordering_of_cv() {
        // the last candidate wins on test accuracy regardless of position
        assert_eq!(select_best(&[0.80, 0.85, 0.83, 0.91]), Some(3));
    }
}
