//! Derived features from raw sensor readings

use crate::data::{EngineeredFeatures, RawRecord, RAW_NUMERIC_COLUMNS};
use crate::error::{MaintenanceError, Result};

/// Divisor converting torque·rpm to kW
pub const POWER_DIVISOR: f64 = 9549.0;

/// Reject readings that would produce non-finite features
pub fn validate_reading(record: &RawRecord, row: usize) -> Result<()> {
    for (name, value) in RAW_NUMERIC_COLUMNS.iter().zip(record.numeric_values()) {
        if !value.is_finite() {
            return Err(MaintenanceError::ValidationError(format!(
                "record {}: '{}' is not finite ({})",
                row, name, value
            )));
        }
    }
    if record.rotational_speed == 0.0 {
        return Err(MaintenanceError::ValidationError(format!(
            "record {}: rotational speed is zero",
            row
        )));
    }
    if record.air_temperature == 0.0 {
        return Err(MaintenanceError::ValidationError(format!(
            "record {}: air temperature is zero",
            row
        )));
    }
    Ok(())
}

/// Compute the five engineered features
pub fn engineer(record: &RawRecord, row: usize) -> Result<EngineeredFeatures> {
    validate_reading(record, row)?;

    let features = EngineeredFeatures {
        temp_diff: record.process_temperature - record.air_temperature,
        power: record.torque * record.rotational_speed / POWER_DIVISOR,
        tool_wear_rate: record.tool_wear / (record.rotational_speed / 1000.0),
        temp_ratio: record.process_temperature / record.air_temperature,
        stress_indicator: (record.torque * record.tool_wear) / record.rotational_speed,
    };

    if features.values().iter().any(|v| !v.is_finite()) {
        return Err(MaintenanceError::ValidationError(format!(
            "record {}: engineered features overflowed",
            row
        )));
    }
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MachineGrade;

    #[test]
    fn test_reference_reading() {
        let r = RawRecord::reading(MachineGrade::Medium, 298.0, 308.0, 1500.0, 40.0, 80.0);
        let f = engineer(&r, 0).unwrap();
        assert!((f.temp_diff - 10.0).abs() < 1e-9);
        assert!((f.power - 6.2834).abs() < 1e-3);
        assert!((f.tool_wear_rate - 53.333).abs() < 1e-3);
        assert!((f.temp_ratio - 1.03356).abs() < 1e-4);
        assert!((f.stress_indicator - 2.1333).abs() < 1e-3);
    }

    #[test]
    fn test_zero_speed_rejected() {
        let r = RawRecord::reading(MachineGrade::Low, 298.0, 308.0, 0.0, 40.0, 80.0);
        let err = engineer(&r, 3).unwrap_err();
        assert!(matches!(err, MaintenanceError::ValidationError(ref m) if m.contains("record 3")));
    }

    #[test]
    fn test_nan_rejected() {
        let r = RawRecord::reading(MachineGrade::Low, 298.0, f64::NAN, 1500.0, 40.0, 80.0);
        assert!(engineer(&r, 0).is_err());
    }
}
