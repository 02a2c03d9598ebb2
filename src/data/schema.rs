//! Strongly typed raw records and the fixed column/feature schema

use crate::error::{MaintenanceError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const COL_TYPE: &str = "Type";
pub const COL_AIR_TEMPERATURE: &str = "Air temperature [K]";
pub const COL_PROCESS_TEMPERATURE: &str = "Process temperature [K]";
pub const COL_ROTATIONAL_SPEED: &str = "Rotational speed [rpm]";
pub const COL_TORQUE: &str = "Torque [Nm]";
pub const COL_TOOL_WEAR: &str = "Tool wear [min]";
pub const COL_FAILURE_TYPE: &str = "Failure Type";

pub const FEAT_TYPE_ENCODED: &str = "Type_encoded";
pub const FEAT_TEMP_DIFF: &str = "Temp_diff";
pub const FEAT_POWER: &str = "Power";
pub const FEAT_TOOL_WEAR_RATE: &str = "Tool_wear_rate";
pub const FEAT_TEMP_RATIO: &str = "Temp_ratio";
pub const FEAT_STRESS_INDICATOR: &str = "Stress_indicator";

/// The five raw numeric columns, in schema order
pub const RAW_NUMERIC_COLUMNS: [&str; 5] = [
    COL_AIR_TEMPERATURE,
    COL_PROCESS_TEMPERATURE,
    COL_ROTATIONAL_SPEED,
    COL_TORQUE,
    COL_TOOL_WEAR,
];

/// Engineered feature names, in schema order
pub const ENGINEERED_FEATURES: [&str; 5] = [
    FEAT_TEMP_DIFF,
    FEAT_POWER,
    FEAT_TOOL_WEAR_RATE,
    FEAT_TEMP_RATIO,
    FEAT_STRESS_INDICATOR,
];

/// Label used for the nominal class in the training data
pub const NO_FAILURE: &str = "No Failure";

/// Ordered model input: raw numeric columns, encoded grade, engineered features
pub fn feature_names() -> Vec<String> {
    RAW_NUMERIC_COLUMNS
        .iter()
        .chain(std::iter::once(&FEAT_TYPE_ENCODED))
        .chain(ENGINEERED_FEATURES.iter())
        .map(|s| s.to_string())
        .collect()
}

/// Product quality variant of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MachineGrade {
    Low,
    Medium,
    High,
}

impl MachineGrade {
    /// Single-letter code as it appears in the dataset
    pub fn code(&self) -> &'static str {
        match self {
            MachineGrade::Low => "L",
            MachineGrade::Medium => "M",
            MachineGrade::High => "H",
        }
    }

    pub fn all() -> [MachineGrade; 3] {
        [MachineGrade::Low, MachineGrade::Medium, MachineGrade::High]
    }
}

impl fmt::Display for MachineGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for MachineGrade {
    type Err = MaintenanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "low" => Ok(MachineGrade::Low),
            "m" | "medium" => Ok(MachineGrade::Medium),
            "h" | "high" => Ok(MachineGrade::High),
            other => Err(MaintenanceError::SchemaError(format!(
                "unknown machine grade '{}' (expected L/M/H)",
                other
            ))),
        }
    }
}

/// One row of sensor readings as ingested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub machine_grade: MachineGrade,
    /// Kelvin
    pub air_temperature: f64,
    /// Kelvin
    pub process_temperature: f64,
    /// rpm
    pub rotational_speed: f64,
    /// N·m
    pub torque: f64,
    /// minutes
    pub tool_wear: f64,
    /// Ground-truth failure mode (training only)
    pub failure_type: Option<String>,
}

impl RawRecord {
    /// Build a record without a label
    pub fn reading(
        machine_grade: MachineGrade,
        air_temperature: f64,
        process_temperature: f64,
        rotational_speed: f64,
        torque: f64,
        tool_wear: f64,
    ) -> Self {
        Self {
            machine_grade,
            air_temperature,
            process_temperature,
            rotational_speed,
            torque,
            tool_wear,
            failure_type: None,
        }
    }

    /// Attach a ground-truth label
    pub fn with_failure_type(mut self, label: impl Into<String>) -> Self {
        self.failure_type = Some(label.into());
        self
    }

    /// Raw numeric values in `RAW_NUMERIC_COLUMNS` order
    pub fn numeric_values(&self) -> [f64; 5] {
        [
            self.air_temperature,
            self.process_temperature,
            self.rotational_speed,
            self.torque,
            self.tool_wear,
        ]
    }
}

/// A filtered, encoded record with its engineered features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub raw: RawRecord,
    pub grade_index: usize,
    pub label_index: usize,
    pub engineered: EngineeredFeatures,
}

impl ProcessedRecord {
    /// Model input row in `feature_names()` order
    pub fn feature_row(&self) -> Vec<f64> {
        let mut row = Vec::with_capacity(11);
        row.extend_from_slice(&self.raw.numeric_values());
        row.push(self.grade_index as f64);
        row.extend_from_slice(&self.engineered.values());
        row
    }
}

/// The five derived features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngineeredFeatures {
    pub temp_diff: f64,
    pub power: f64,
    pub tool_wear_rate: f64,
    pub temp_ratio: f64,
    pub stress_indicator: f64,
}

impl EngineeredFeatures {
    /// Values in `ENGINEERED_FEATURES` order
    pub fn values(&self) -> [f64; 5] {
        [
            self.temp_diff,
            self.power,
            self.tool_wear_rate,
            self.temp_ratio,
            self.stress_indicator,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_order() {
        let names = feature_names();
        assert_eq!(names.len(), 11);
        assert_eq!(names[0], COL_AIR_TEMPERATURE);
        assert_eq!(names[3], COL_TORQUE);
        assert_eq!(names[5], FEAT_TYPE_ENCODED);
        assert_eq!(names[10], FEAT_STRESS_INDICATOR);
    }

    #[test]
    fn test_grade_parsing() {
        assert_eq!("M".parse::<MachineGrade>().unwrap(), MachineGrade::Medium);
        assert_eq!("high".parse::<MachineGrade>().unwrap(), MachineGrade::High);
        assert_eq!(" l ".parse::<MachineGrade>().unwrap(), MachineGrade::Low);
        assert!(matches!(
            "X".parse::<MachineGrade>(),
            Err(MaintenanceError::SchemaError(_))
        ));
    }
}
