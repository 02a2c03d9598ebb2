//! Tabular ingestion: CSV → typed `RawRecord`s
//!
//! The schema is checked at this boundary; later stages only see typed records.

use super::schema::*;
use crate::error::{MaintenanceError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Load a CSV file into a DataFrame
pub fn load_csv(path: impl AsRef<Path>) -> Result<DataFrame> {
    let path = path.as_ref();
    let file = File::open(path)?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(None)
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| MaintenanceError::DataError(format!("{}: {}", path.display(), e)))?;

    debug!(path = %path.display(), rows = df.height(), cols = df.width(), "Loaded CSV");
    Ok(df)
}

/// Load and validate training records from a CSV file
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<RawRecord>> {
    let df = load_csv(path.as_ref())?;
    let records = records_from_dataframe(&df, true)?;
    info!(
        path = %path.as_ref().display(),
        records = records.len(),
        "Ingested raw records"
    );
    Ok(records)
}

fn required_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| MaintenanceError::SchemaError(format!("required column '{}' is absent", name)))
}

fn numeric_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let series = required_column(df, name)?;
    let numeric = matches!(
        series.dtype(),
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    );
    if !numeric {
        return Err(MaintenanceError::SchemaError(format!(
            "column '{}' must be numeric, found {}",
            name,
            series.dtype()
        )));
    }
    let cast = series.cast(&DataType::Float64)?;
    let ca = cast.f64()?;
    ca.into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                MaintenanceError::SchemaError(format!("column '{}' has a null at row {}", name, row))
            })
        })
        .collect()
}

fn string_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let series = required_column(df, name)?;
    let cast = series.cast(&DataType::String)?;
    let ca = cast.str()?;
    ca.into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.map(|s| s.to_string()).ok_or_else(|| {
                MaintenanceError::SchemaError(format!("column '{}' has a null at row {}", name, row))
            })
        })
        .collect()
}

/// Convert a DataFrame into typed records.
///
/// Extra columns (identifiers, the binary failure flag, ...) are ignored.
pub fn records_from_dataframe(df: &DataFrame, require_label: bool) -> Result<Vec<RawRecord>> {
    let grades: Vec<MachineGrade> = string_column(df, COL_TYPE)?
        .iter()
        .map(|s| s.parse())
        .collect::<Result<_>>()?;
    let air = numeric_column(df, COL_AIR_TEMPERATURE)?;
    let process = numeric_column(df, COL_PROCESS_TEMPERATURE)?;
    let speed = numeric_column(df, COL_ROTATIONAL_SPEED)?;
    let torque = numeric_column(df, COL_TORQUE)?;
    let wear = numeric_column(df, COL_TOOL_WEAR)?;

    let labels: Option<Vec<String>> = if require_label {
        Some(string_column(df, COL_FAILURE_TYPE)?)
    } else if df.column(COL_FAILURE_TYPE).is_ok() {
        Some(string_column(df, COL_FAILURE_TYPE)?)
    } else {
        None
    };

    let records = (0..df.height())
        .map(|i| RawRecord {
            machine_grade: grades[i],
            air_temperature: air[i],
            process_temperature: process[i],
            rotational_speed: speed[i],
            torque: torque[i],
            tool_wear: wear[i],
            failure_type: labels.as_ref().map(|l| l[i].clone()),
        })
        .collect();

    Ok(records)
}

/// Build a DataFrame in the training-file layout
pub fn records_to_dataframe(records: &[RawRecord]) -> Result<DataFrame> {
    let udi: Vec<i64> = (1..=records.len() as i64).collect();
    let product_id: Vec<String> = records
        .iter()
        .zip(udi.iter())
        .map(|(r, id)| format!("{}{:05}", r.machine_grade.code(), id))
        .collect();
    let types: Vec<&str> = records.iter().map(|r| r.machine_grade.code()).collect();
    let failure_types: Vec<String> = records
        .iter()
        .map(|r| r.failure_type.clone().unwrap_or_else(|| NO_FAILURE.to_string()))
        .collect();
    let machine_failure: Vec<i64> = failure_types
        .iter()
        .map(|f| if f == NO_FAILURE { 0 } else { 1 })
        .collect();

    let df = df!(
        "UDI" => udi,
        "Product ID" => product_id,
        COL_TYPE => types,
        COL_AIR_TEMPERATURE => records.iter().map(|r| r.air_temperature).collect::<Vec<f64>>(),
        COL_PROCESS_TEMPERATURE => records.iter().map(|r| r.process_temperature).collect::<Vec<f64>>(),
        COL_ROTATIONAL_SPEED => records.iter().map(|r| r.rotational_speed).collect::<Vec<f64>>(),
        COL_TORQUE => records.iter().map(|r| r.torque).collect::<Vec<f64>>(),
        COL_TOOL_WEAR => records.iter().map(|r| r.tool_wear).collect::<Vec<f64>>(),
        "Machine failure" => machine_failure,
        COL_FAILURE_TYPE => failure_types
    )?;
    Ok(df)
}

/// Write records as a training CSV
pub fn write_records_csv(records: &[RawRecord], path: impl AsRef<Path>) -> Result<()> {
    let mut df = records_to_dataframe(records)?;
    let mut file = File::create(path.as_ref())?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(&mut df)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> DataFrame {
        df!(
            "UDI" => &[1i64, 2],
            COL_TYPE => &["M", "L"],
            COL_AIR_TEMPERATURE => &[298.1, 298.2],
            COL_PROCESS_TEMPERATURE => &[308.6, 308.7],
            COL_ROTATIONAL_SPEED => &[1551i64, 1408],
            COL_TORQUE => &[42.8, 46.3],
            COL_TOOL_WEAR => &[0i64, 3],
            COL_FAILURE_TYPE => &["No Failure", "Tool Wear Failure"]
        )
        .unwrap()
    }

    #[test]
    fn test_records_from_dataframe() {
        let records = records_from_dataframe(&sample_frame(), true).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].machine_grade, MachineGrade::Medium);
        assert_eq!(records[1].rotational_speed, 1408.0);
        assert_eq!(records[1].failure_type.as_deref(), Some("Tool Wear Failure"));
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let df = sample_frame().drop(COL_TORQUE).unwrap();
        let err = records_from_dataframe(&df, true).unwrap_err();
        assert!(matches!(err, MaintenanceError::SchemaError(ref m) if m.contains(COL_TORQUE)));
    }

    #[test]
    fn test_mistyped_column_is_schema_error() {
        let mut df = sample_frame();
        df.with_column(Series::new(COL_TOOL_WEAR.into(), &["a", "b"])).unwrap();
        let err = records_from_dataframe(&df, true).unwrap_err();
        assert!(matches!(err, MaintenanceError::SchemaError(_)));
    }

    #[test]
    fn test_csv_round_trip() {
        let records = records_from_dataframe(&sample_frame(), true).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("machines.csv");
        write_records_csv(&records, &path).unwrap();
        let loaded = load_records(&path).unwrap();
        assert_eq!(loaded, records);
    }
}
