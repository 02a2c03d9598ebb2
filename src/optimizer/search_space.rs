//! Search space definition for hyperparameters

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type of parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterType {
    /// Continuous float parameter
    Float { low: f64, high: f64 },
    /// Integer parameter
    Int { low: i64, high: i64 },
}

/// A single hyperparameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: ParameterType,
}

impl Parameter {
    /// Create a float parameter
    pub fn float(name: impl Into<String>, low: f64, high: f64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Float { low, high },
        }
    }

    /// Create an integer parameter
    pub fn int(name: impl Into<String>, low: i64, high: i64) -> Self {
        Self {
            name: name.into(),
            param_type: ParameterType::Int { low, high },
        }
    }

    fn bounds(&self) -> (f64, f64) {
        match self.param_type {
            ParameterType::Float { low, high } => (low, high),
            ParameterType::Int { low, high } => (low as f64, high as f64),
        }
    }

    /// Map a value onto [0, 1]
    pub fn to_unit(&self, value: &ParameterValue) -> f64 {
        let (low, high) = self.bounds();
        let v = value.as_float().unwrap_or(low);
        if high > low {
            ((v - low) / (high - low)).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Inverse of `to_unit`; integers are rounded and the result always lies within bounds
    pub fn from_unit(&self, u: f64) -> ParameterValue {
        let u = u.clamp(0.0, 1.0);
        let (low, high) = self.bounds();
        let raw = low + u * (high - low);
        match self.param_type {
            ParameterType::Float { low, high } => ParameterValue::Float(raw.clamp(low, high)),
            ParameterType::Int { low, high } => ParameterValue::Int((raw.round() as i64).clamp(low, high)),
        }
    }

    /// Whether `value` lies within the parameter's bounds
    pub fn contains(&self, value: &ParameterValue) -> bool {
        match (&self.param_type, value) {
            (ParameterType::Float { low, high }, ParameterValue::Float(v)) => v >= low && v <= high,
            (ParameterType::Int { low, high }, ParameterValue::Int(v)) => v >= low && v <= high,
            _ => false,
        }
    }

    /// Sample a random value
    pub fn sample(&self, rng: &mut impl Rng) -> ParameterValue {
        match &self.param_type {
            ParameterType::Float { low, high } => {
                let val = rng.gen::<f64>() * (high - low) + low;
                ParameterValue::Float(val.clamp(*low, *high))
            }
            ParameterType::Int { low, high } => ParameterValue::Int(rng.gen_range(*low..=*high)),
        }
    }
}

/// Sampled parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            ParameterValue::Float(v) => Some(*v as i64),
        }
    }
}

/// Search space for hyperparameter optimization
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    parameters: Vec<Parameter>,
}

impl SearchSpace {
    /// Create a new empty search space
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the search space
    pub fn add(mut self, param: Parameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Add a float parameter
    pub fn float(self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.add(Parameter::float(name, low, high))
    }

    /// Add an integer parameter
    pub fn int(self, name: impl Into<String>, low: i64, high: i64) -> Self {
        self.add(Parameter::int(name, low, high))
    }

    /// Get all parameters
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Sample a random configuration
    pub fn sample(&self, rng: &mut impl Rng) -> TrialParams {
        self.parameters
            .iter()
            .map(|p| (p.name.clone(), p.sample(rng)))
            .collect()
    }

    /// Whether every parameter of the space is present and within bounds
    pub fn contains(&self, params: &TrialParams) -> bool {
        self.parameters
            .iter()
            .all(|p| params.get(&p.name).map_or(false, |v| p.contains(v)))
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

/// Alias for sampled configuration
pub type TrialParams = BTreeMap<String, ParameterValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_search_space_builder() {
        let space = SearchSpace::new()
            .float("learning_rate", 0.01, 0.3)
            .int("n_estimators", 100, 500)
            .float("subsample", 0.6, 1.0);

        assert_eq!(space.len(), 3);
    }

    #[test]
    fn test_sampling_stays_in_bounds() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let space = SearchSpace::new()
            .float("lr", 0.01, 0.3)
            .int("depth", 3, 15)
            .float("subsample", 0.6, 1.0);

        for _ in 0..200 {
            let params = space.sample(&mut rng);
            assert!(space.contains(&params));
        }
    }

    #[test]
    fn test_unit_mapping_round_trips_within_bounds() {
        let depth = Parameter::int("depth", 3, 15);
        assert_eq!(depth.from_unit(0.0), ParameterValue::Int(3));
        assert_eq!(depth.from_unit(1.0), ParameterValue::Int(15));
        assert_eq!(depth.from_unit(2.0), ParameterValue::Int(15));
        assert!((depth.to_unit(&ParameterValue::Int(9)) - 0.5).abs() < 1e-12);

        let lr = Parameter::float("lr", 0.01, 0.3);
        let mid = lr.from_unit(0.5).as_float().unwrap();
        assert!((mid - 0.155).abs() < 1e-9);
        assert!((lr.to_unit(&ParameterValue::Float(0.155)) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_contains_rejects_out_of_range() {
        let space = SearchSpace::new().float("lr", 0.01, 0.3);
        let mut params = TrialParams::new();
        params.insert("lr".to_string(), ParameterValue::Float(0.5));
        assert!(!space.contains(&params));
        assert!(!space.contains(&TrialParams::new()));
    }
}
