//! Sequential study loop over a sampler and an objective

use super::config::OptimizerConfig;
use super::samplers::{RandomSampler, Sampler, SamplerType, TPESampler};
use super::search_space::{SearchSpace, TrialParams};
use crate::error::{MaintenanceError, Result};
use crate::training::CvScore;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of a trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrialState {
    Complete,
    /// The objective returned an error; the trial is never selected
    Failed(String),
}

/// Result of a single trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult {
    /// Trial number
    pub trial_id: usize,
    /// Parameters used
    pub params: TrialParams,
    /// Objective value (CV mean), absent for failed trials
    pub value: Option<f64>,
    pub cv: Option<CvScore>,
    pub state: TrialState,
    /// Trial duration in seconds
    pub duration_secs: f64,
}

/// Study containing all trials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Study {
    /// All trial results
    pub trials: Vec<TrialResult>,
    /// Best trial index
    pub best_trial_idx: Option<usize>,
    /// Total duration
    pub total_duration_secs: f64,
}

impl Study {
    /// Create an empty study; higher CV accuracy is better
    pub fn new() -> Self {
        Self {
            trials: Vec::new(),
            best_trial_idx: None,
            total_duration_secs: 0.0,
        }
    }

    /// Get the best trial
    pub fn best_trial(&self) -> Option<&TrialResult> {
        self.best_trial_idx.map(|idx| &self.trials[idx])
    }

    /// Get the best value
    pub fn best_value(&self) -> Option<f64> {
        self.best_trial().and_then(|t| t.value)
    }

    /// Get the best parameters
    pub fn best_params(&self) -> Option<&TrialParams> {
        self.best_trial().map(|t| &t.params)
    }

    pub fn n_failed(&self) -> usize {
        self.trials.iter().filter(|t| t.state != TrialState::Complete).count()
    }

    /// Add a trial result; failed trials are recorded but never become best
    pub fn add_trial(&mut self, result: TrialResult) {
        let idx = self.trials.len();

        if let (TrialState::Complete, Some(value)) = (&result.state, result.value) {
            let is_better = match self.best_value() {
                None => true,
                Some(best) => value > best,
            };
            if is_better {
                self.best_trial_idx = Some(idx);
            }
        }

        self.trials.push(result);
    }

    /// Completed trials as `(params, loss)`, lower loss being better
    fn history(&self) -> Vec<(TrialParams, f64)> {
        self.trials
            .iter()
            .filter(|t| t.state == TrialState::Complete)
            .filter_map(|t| {
                t.value.map(|v| (t.params.clone(), -v))
            })
            .collect()
    }
}

/// Runs a trial- and time-bounded search over a search space
pub struct Search {
    config: OptimizerConfig,
    search_space: SearchSpace,
    sampler: Box<dyn Sampler>,
    study: Study,
}

impl Search {
    pub fn new(config: OptimizerConfig, search_space: SearchSpace) -> Self {
        let sampler: Box<dyn Sampler> = match config.sampler {
            SamplerType::Random => Box::new(RandomSampler::new(config.random_state)),
            SamplerType::TPE => Box::new(
                TPESampler::new(config.random_state)
                    .with_n_startup(config.n_startup_trials)
                    .with_gamma(config.gamma)
                    .with_n_candidates(config.n_candidates),
            ),
        };
        let study = Study::new();

        Self {
            config,
            search_space,
            sampler,
            study,
        }
    }

    /// Run optimization with an objective scored by cross-validation
    pub fn optimize<F>(&mut self, mut objective: F) -> Result<&Study>
    where
        F: FnMut(&TrialParams) -> Result<CvScore>,
    {
        if self.search_space.is_empty() {
            return Err(MaintenanceError::ConfigError("search space is empty".to_string()));
        }

        let start = Instant::now();
        let timeout = self.config.timeout_secs;
        let patience = self.config.early_stopping_patience;
        let mut trials_without_improvement = 0;

        for trial_id in 0..self.config.n_trials {
            if let Some(t) = timeout {
                if start.elapsed().as_secs_f64() > t {
                    info!(trials = trial_id, timeout_secs = t, "Search timeout reached");
                    break;
                }
            }
            if let Some(p) = patience {
                if trials_without_improvement >= p {
                    info!(patience = p, "Early stopping: no improvement");
                    break;
                }
            }

            let trial_start = Instant::now();
            let history = self.study.history();
            let params = self.sampler.sample(&self.search_space, &history);

            let result = match objective(&params) {
                Ok(cv) => {
                    let improved = match self.study.best_value() {
                        None => true,
                        Some(best) => cv.mean > best + self.config.min_improvement,
                    };
                    if improved {
                        trials_without_improvement = 0;
                    } else {
                        trials_without_improvement += 1;
                    }
                    debug!(trial = trial_id, value = cv.mean, params = ?params, "Trial complete");

                    TrialResult {
                        trial_id,
                        params,
                        value: Some(cv.mean),
                        cv: Some(cv),
                        state: TrialState::Complete,
                        duration_secs: trial_start.elapsed().as_secs_f64(),
                    }
                }
                Err(e) => {
                    warn!(trial = trial_id, error = %e, "Trial failed");
                    trials_without_improvement += 1;
                    TrialResult {
                        trial_id,
                        params,
                        value: None,
                        cv: None,
                        state: TrialState::Failed(e.to_string()),
                        duration_secs: trial_start.elapsed().as_secs_f64(),
                    }
                }
            };

            self.study.add_trial(result);
        }

        self.study.total_duration_secs = start.elapsed().as_secs_f64();
        Ok(&self.study)
    }

    /// Get the study results
    pub fn study(&self) -> &Study {
        &self.study
    }

    pub fn into_study(self) -> Study {
        self.study
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(mean: f64) -> CvScore {
        CvScore {
            mean,
            std: 0.0,
            fold_scores: vec![mean],
        }
    }

    fn quadratic_objective(params: &TrialParams) -> Result<CvScore> {
        let x = params.get("x").and_then(|p| p.as_float()).unwrap_or(0.0);
        let y = params.get("y").and_then(|p| p.as_float()).unwrap_or(0.0);
        Ok(score(-(x * x + y * y)))
    }

    #[test]
    fn test_search_runs_trial_budget() {
        let config = OptimizerConfig::new().with_n_trials(20);
        let space = SearchSpace::new().float("x", -5.0, 5.0).float("y", -5.0, 5.0);

        let mut search = Search::new(config, space.clone());
        let study = search.optimize(quadratic_objective).unwrap();

        assert_eq!(study.trials.len(), 20);
        assert!(study.best_value().unwrap() > -25.0);
        assert!(study.trials.iter().all(|t| space.contains(&t.params)));
    }

    #[test]
    fn test_best_trial_has_highest_cv_mean() {
        let mut study = Study::new();
        for (i, mean) in [0.81, 0.93, 0.88].into_iter().enumerate() {
            study.add_trial(TrialResult {
                trial_id: i,
                params: TrialParams::new(),
                value: Some(mean),
                cv: Some(score(mean)),
                state: TrialState::Complete,
                duration_secs: 0.0,
            });
        }
        assert_eq!(study.best_trial().map(|t| t.trial_id), Some(1));
        // history is a loss: lower is better
        assert_eq!(study.history()[1].1, -0.93);
    }

    #[test]
    fn test_failed_trials_never_selected() {
        let config = OptimizerConfig::new().with_n_trials(10);
        let space = SearchSpace::new().float("x", 0.0, 1.0);
        let objective = |params: &TrialParams| -> Result<CvScore> {
            let x = params["x"].as_float().unwrap_or(0.0);
            if x > 0.5 {
                Err(MaintenanceError::DataError("diverged".into()))
            } else {
                Ok(score(x))
            }
        };

        let mut search = Search::new(config, space);
        let study = search.optimize(objective).unwrap();
        if let Some(best) = study.best_trial() {
            assert_eq!(best.state, TrialState::Complete);
            assert!(best.value.unwrap() <= 0.5);
        }
        assert_eq!(study.trials.len(), 10);
    }

    #[test]
    fn test_all_failed_has_no_best() {
        let config = OptimizerConfig::new().with_n_trials(3);
        let space = SearchSpace::new().float("x", 0.0, 1.0);
        let mut search = Search::new(config, space);
        let study = search
            .optimize(|_| Err(MaintenanceError::DataError("boom".into())))
            .unwrap();
        assert!(study.best_trial().is_none());
        assert_eq!(study.n_failed(), 3);
    }

    #[test]
    fn test_timeout_stops_search() {
        let config = OptimizerConfig::new().with_n_trials(1000).with_timeout(0.0);
        let space = SearchSpace::new().float("x", 0.0, 1.0);
        let mut search = Search::new(config, space);
        let study = search
            .optimize(|_| {
                std::thread::sleep(std::time::Duration::from_millis(2));
                Ok(score(1.0))
            })
            .unwrap();
        assert!(study.trials.len() <= 1);
    }
}
