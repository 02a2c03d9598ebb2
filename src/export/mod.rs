//! Model bundle persistence
//!
//! A bundle directory holds one JSON blob per part plus a manifest carrying
//! the schema version, feature order and a SHA-256 checksum per blob.

mod bundle;
mod store;

pub use bundle::{
    Blob, BundleMetadata, CvSummary, EncoderBlob, Manifest, ModelBlob, ModelBundle, ScalerBlob, BLOB_FILES,
    FAILURE_ENCODER_FILE, FEATURE_NAMES_FILE, GRADE_ENCODER_FILE, MANIFEST_FILE, METADATA_FILE, MODEL_FILE,
    SCALER_FILE, SCHEMA_VERSION,
};
pub use store::{compute_sha256, ArtifactStore};
