//! Data preprocessing module
//!
//! - IQR outlier removal over the raw numeric columns
//! - Label encoding of machine grade and failure mode
//! - Feature engineering (temperature, power and wear ratios)
//! - Standard scaling fitted on the training split

mod config;
mod encoder;
mod features;
mod pipeline;
mod scaler;
pub mod outlier;

pub use config::PreprocessingConfig;
pub use encoder::LabelEncoder;
pub use features::{engineer, validate_reading, POWER_DIVISOR};
pub use outlier::{OutlierBounds, OutlierDetector, OutlierReport};
pub use pipeline::{DataPreprocessor, PreprocessedData, SplitData};
pub use scaler::StandardScaler;
