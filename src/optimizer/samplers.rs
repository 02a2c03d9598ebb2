//! Sampling strategies for hyperparameter optimization

use super::search_space::{Parameter, SearchSpace, TrialParams};
use crate::utils::{normal_cdf, normal_pdf, sample_normal};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Type of sampler to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SamplerType {
    /// Random sampling
    Random,
    /// Tree-structured Parzen Estimator
    TPE,
}

/// Trait for hyperparameter samplers
pub trait Sampler: Send + Sync {
    /// Sample the next set of hyperparameters.
    ///
    /// `history` holds completed trials as `(params, loss)`; lower loss is better.
    fn sample(&mut self, search_space: &SearchSpace, history: &[(TrialParams, f64)]) -> TrialParams;
}

/// Random sampler
#[derive(Debug)]
pub struct RandomSampler {
    rng: Xoshiro256PlusPlus,
}

impl RandomSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }
}

impl Sampler for RandomSampler {
    fn sample(&mut self, search_space: &SearchSpace, _history: &[(TrialParams, f64)]) -> TrialParams {
        search_space.sample(&mut self.rng)
    }
}

/// One-dimensional Parzen estimator on [0, 1]: a uniform-width prior
/// component plus a truncated Gaussian per observation.
#[derive(Debug, Clone)]
struct ParzenEstimator {
    mus: Vec<f64>,
    sigmas: Vec<f64>,
}

impl ParzenEstimator {
    const PRIOR_MU: f64 = 0.5;
    const PRIOR_SIGMA: f64 = 1.0;
    const MIN_SIGMA: f64 = 0.01;

    fn new(observations: &[f64]) -> Self {
        let n = observations.len();
        let mut mus = Vec::with_capacity(n + 1);
        let mut sigmas = Vec::with_capacity(n + 1);

        mus.push(Self::PRIOR_MU);
        sigmas.push(Self::PRIOR_SIGMA);

        if n > 0 {
            // Scott's rule bandwidth, shared by all observation kernels
            let (_, std) = crate::utils::mean_std(observations);
            let bw = (1.06 * std.max(0.1) * (n as f64).powf(-0.2)).clamp(Self::MIN_SIGMA, 1.0);
            for &o in observations {
                mus.push(o);
                sigmas.push(bw);
            }
        }
        Self { mus, sigmas }
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        let k = rng.gen_range(0..self.mus.len());
        // Rejection sampling into [0, 1]; the last draw is clamped
        for _ in 0..64 {
            let v = sample_normal(rng, self.mus[k], self.sigmas[k]);
            if (0.0..=1.0).contains(&v) {
                return v;
            }
        }
        sample_normal(rng, self.mus[k], self.sigmas[k]).clamp(0.0, 1.0)
    }

    fn log_pdf(&self, x: f64) -> f64 {
        let weight = 1.0 / self.mus.len() as f64;
        let density: f64 = self
            .mus
            .iter()
            .zip(&self.sigmas)
            .map(|(&mu, &sigma)| {
                let mass = normal_cdf((1.0 - mu) / sigma) - normal_cdf(-mu / sigma);
                weight * normal_pdf((x - mu) / sigma) / (sigma * mass.max(1e-12))
            })
            .sum();
        density.max(1e-300).ln()
    }
}

/// Tree-structured Parzen Estimator sampler
///
/// After `n_startup_trials` random draws, completed trials are split at the
/// `gamma` quantile of their loss into a good set and a bad set. Each
/// parameter gets a Parzen density for both sets, l(x) and g(x);
/// `n_candidates` configurations are drawn from l and the one maximising
/// l(x)/g(x) is returned.
#[derive(Debug)]
pub struct TPESampler {
    rng: Xoshiro256PlusPlus,
    n_startup_trials: usize,
    gamma: f64,
    n_candidates: usize,
}

impl TPESampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
            n_startup_trials: 10,
            gamma: 0.25,
            n_candidates: 24,
        }
    }

    /// Set number of startup trials
    pub fn with_n_startup(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    /// Set gamma (quantile for splitting good/bad)
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_n_candidates(mut self, n: usize) -> Self {
        self.n_candidates = n.max(1);
        self
    }

    fn estimators(&self, param: &Parameter, good: &[&TrialParams], bad: &[&TrialParams]) -> (ParzenEstimator, ParzenEstimator) {
        let project = |set: &[&TrialParams]| -> Vec<f64> {
            set.iter()
                .filter_map(|p| p.get(&param.name).map(|v| param.to_unit(v)))
                .collect()
        };
        (ParzenEstimator::new(&project(good)), ParzenEstimator::new(&project(bad)))
    }
}

impl Sampler for TPESampler {
    fn sample(&mut self, search_space: &SearchSpace, history: &[(TrialParams, f64)]) -> TrialParams {
        // Use random sampling for startup trials
        if history.len() < self.n_startup_trials || history.len() < 2 {
            return search_space.sample(&mut self.rng);
        }

        let mut sorted: Vec<&(TrialParams, f64)> = history.iter().collect();
        sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

        let n_good = ((sorted.len() as f64 * self.gamma).ceil() as usize).clamp(1, sorted.len() - 1);
        let good: Vec<&TrialParams> = sorted[..n_good].iter().map(|(p, _)| p).collect();
        let bad: Vec<&TrialParams> = sorted[n_good..].iter().map(|(p, _)| p).collect();

        let models: Vec<(ParzenEstimator, ParzenEstimator)> = search_space
            .parameters()
            .iter()
            .map(|param| self.estimators(param, &good, &bad))
            .collect();

        let mut best: Option<(f64, TrialParams)> = None;
        for _ in 0..self.n_candidates {
            let mut params = TrialParams::new();
            let mut score = 0.0;
            for (param, (l, g)) in search_space.parameters().iter().zip(&models) {
                let u = l.sample(&mut self.rng);
                let value = param.from_unit(u);
                // Score the value actually used (integers are rounded)
                let u = param.to_unit(&value);
                score += l.log_pdf(u) - g.log_pdf(u);
                params.insert(param.name.clone(), value);
            }
            if best.as_ref().map_or(true, |(s, _)| score > *s) {
                best = Some((score, params));
            }
        }

        match best {
            Some((_, params)) => params,
            None => search_space.sample(&mut self.rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::ParameterValue;

    fn space() -> SearchSpace {
        SearchSpace::new().float("x", 0.0, 1.0).int("n", 100, 500)
    }

    #[test]
    fn test_random_sampler() {
        let mut sampler = RandomSampler::new(42);
        let params = sampler.sample(&space(), &[]);
        assert!(params.contains_key("x"));
        assert!(params.contains_key("n"));
    }

    #[test]
    fn test_parzen_density_peaks_near_observations() {
        let est = ParzenEstimator::new(&[0.2, 0.22, 0.25]);
        assert!(est.log_pdf(0.22) > est.log_pdf(0.9));
    }

    #[test]
    fn test_tpe_concentrates_on_good_region() {
        let space = SearchSpace::new().float("x", 0.0, 1.0);
        // Loss is distance from 0.8
        let history: Vec<(TrialParams, f64)> = (0..30)
            .map(|i| {
                let x = i as f64 / 29.0;
                let mut p = TrialParams::new();
                p.insert("x".to_string(), ParameterValue::Float(x));
                (p, (x - 0.8).abs())
            })
            .collect();

        let mut sampler = TPESampler::new(42);
        let draws: Vec<f64> = (0..20)
            .map(|_| sampler.sample(&space, &history)["x"].as_float().unwrap())
            .collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        assert!((mean - 0.8).abs() < 0.15, "mean draw = {}", mean);
    }

    #[test]
    fn test_tpe_respects_bounds() {
        let space = space();
        let mut sampler = TPESampler::new(7).with_n_startup(3);
        let mut history = Vec::new();
        for i in 0..40 {
            let params = sampler.sample(&space, &history);
            assert!(space.contains(&params));
            history.push((params, (i % 5) as f64));
        }
    }
}
