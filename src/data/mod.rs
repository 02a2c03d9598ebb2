//! Raw data: schema, CSV ingestion, synthetic generation

pub mod generator;
pub mod loader;
mod schema;

pub use generator::{DatasetGenerator, GeneratorConfig};
pub use loader::{load_csv, load_records, records_from_dataframe, records_to_dataframe, write_records_csv};
pub use schema::*;
