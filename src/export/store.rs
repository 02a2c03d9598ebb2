//! Atomic, manifest-validated bundle persistence

use super::bundle::*;
use crate::error::{MaintenanceError, Result};
use crate::preprocessing::{LabelEncoder, StandardScaler};
use crate::training::Model;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Compute SHA-256 hash of data
pub fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn consistency(msg: impl Into<String>) -> MaintenanceError {
    MaintenanceError::BundleConsistencyError(msg.into())
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Sibling path `.<name>.<tag>-<uuid>` in the target's parent directory
fn sibling(target: &Path, tag: &str) -> Result<PathBuf> {
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| MaintenanceError::ConfigError(format!("invalid bundle path {}", target.display())))?;
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    Ok(parent.join(format!(".{}.{}-{}", name, tag, Uuid::new_v4().simple())))
}

/// Reads and writes bundle directories
pub struct ArtifactStore;

impl ArtifactStore {
    /// Persist `bundle` at `dir`.
    ///
    /// All blobs and the manifest are written to a hidden staging directory
    /// next to `dir`, which then replaces `dir` with a single rename. An
    /// existing bundle is moved aside first and removed after the swap.
    pub fn save(bundle: &ModelBundle, dir: impl AsRef<Path>) -> Result<Manifest> {
        let target = dir.as_ref();
        bundle.validate()?;

        if target.exists() && !target.is_dir() {
            return Err(MaintenanceError::ConfigError(format!(
                "{} exists and is not a directory",
                target.display()
            )));
        }
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let staging = sibling(target, "staging")?;
        fs::create_dir(&staging)?;

        let manifest = match Self::write_staged(bundle, &staging) {
            Ok(m) => m,
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                return Err(e);
            }
        };

        let backup = if target.exists() {
            let backup = sibling(target, "old")?;
            fs::rename(target, &backup)?;
            Some(backup)
        } else {
            None
        };

        if let Err(e) = fs::rename(&staging, target) {
            if let Some(backup) = &backup {
                let _ = fs::rename(backup, target);
            }
            let _ = fs::remove_dir_all(&staging);
            return Err(e.into());
        }
        if let Some(backup) = backup {
            if let Err(e) = fs::remove_dir_all(&backup) {
                warn!(path = %backup.display(), error = %e, "Failed to remove previous bundle");
            }
        }

        info!(
            path = %target.display(),
            bundle_id = %manifest.bundle_id,
            model = %bundle.metadata.selected_model,
            "Bundle saved"
        );
        Ok(manifest)
    }

    fn write_staged(bundle: &ModelBundle, staging: &Path) -> Result<Manifest> {
        let scaler = ScalerBlob {
            feature_names: bundle.scaler.feature_names().to_vec(),
            mean: bundle.scaler.mean().to_vec(),
            scale: bundle.scaler.scale().to_vec(),
        };
        let model = ModelBlob {
            family: bundle.classifier.family(),
            n_features: bundle.classifier.n_features(),
            n_classes: bundle.classifier.n_classes(),
            classifier: bundle.classifier.clone(),
        };

        let blobs: Vec<(&str, Vec<u8>)> = vec![
            (MODEL_FILE, to_blob_bytes(model)?),
            (SCALER_FILE, to_blob_bytes(scaler)?),
            (
                GRADE_ENCODER_FILE,
                to_blob_bytes(EncoderBlob {
                    classes: bundle.grade_encoder.classes().to_vec(),
                })?,
            ),
            (
                FAILURE_ENCODER_FILE,
                to_blob_bytes(EncoderBlob {
                    classes: bundle.failure_encoder.classes().to_vec(),
                })?,
            ),
            (FEATURE_NAMES_FILE, to_blob_bytes(bundle.feature_names.clone())?),
            (METADATA_FILE, to_blob_bytes(bundle.metadata.clone())?),
        ];

        let mut checksums = BTreeMap::new();
        for (name, bytes) in &blobs {
            write_synced(&staging.join(name), bytes)?;
            checksums.insert(name.to_string(), compute_sha256(bytes));
            debug!(file = *name, bytes = bytes.len(), "Blob written");
        }

        let manifest = Manifest {
            schema_version: SCHEMA_VERSION,
            bundle_id: Uuid::new_v4(),
            created_at: Utc::now(),
            model_family: bundle.classifier.family(),
            feature_names: bundle.feature_names.clone(),
            n_features: bundle.n_features(),
            n_classes: bundle.n_classes(),
            checksums,
        };
        write_synced(&staging.join(MANIFEST_FILE), &serde_json::to_vec_pretty(&manifest)?)?;
        Ok(manifest)
    }

    /// Read the manifest of the bundle at `dir` without loading any blob
    pub fn read_manifest(dir: impl AsRef<Path>) -> Result<Manifest> {
        let path = dir.as_ref().join(MANIFEST_FILE);
        let bytes = fs::read(&path).map_err(|e| consistency(format!("cannot read {}: {}", path.display(), e)))?;
        let manifest: Manifest =
            serde_json::from_slice(&bytes).map_err(|e| consistency(format!("invalid manifest: {}", e)))?;
        if manifest.schema_version != SCHEMA_VERSION {
            return Err(consistency(format!(
                "unsupported bundle schema version {} (expected {})",
                manifest.schema_version, SCHEMA_VERSION
            )));
        }
        Ok(manifest)
    }

    /// Load and cross-check the bundle at `dir`.
    ///
    /// The manifest and every checksum are verified before any blob is
    /// parsed; any disagreement is a `BundleConsistencyError`.
    pub fn load(dir: impl AsRef<Path>) -> Result<ModelBundle> {
        let dir = dir.as_ref();
        let manifest = Self::read_manifest(dir)?;

        let mut raw: BTreeMap<&str, Vec<u8>> = BTreeMap::new();
        for name in BLOB_FILES {
            let expected = manifest
                .checksums
                .get(name)
                .ok_or_else(|| consistency(format!("manifest does not list {}", name)))?;
            let path = dir.join(name);
            let bytes = fs::read(&path).map_err(|e| consistency(format!("cannot read {}: {}", name, e)))?;
            if &compute_sha256(&bytes) != expected {
                return Err(consistency(format!("checksum mismatch for {}", name)));
            }
            raw.insert(name, bytes);
        }

        let model: ModelBlob = parse_blob(&raw, MODEL_FILE)?;
        let scaler: ScalerBlob = parse_blob(&raw, SCALER_FILE)?;
        let grade: EncoderBlob = parse_blob(&raw, GRADE_ENCODER_FILE)?;
        let failure: EncoderBlob = parse_blob(&raw, FAILURE_ENCODER_FILE)?;
        let feature_names: Vec<String> = parse_blob(&raw, FEATURE_NAMES_FILE)?;
        let metadata: BundleMetadata = parse_blob(&raw, METADATA_FILE)?;

        if manifest.feature_names != feature_names {
            return Err(consistency("feature order differs between manifest and feature_names.json"));
        }
        if manifest.n_features != feature_names.len() || model.n_features != manifest.n_features {
            return Err(consistency(format!(
                "feature count mismatch: manifest {}, feature list {}, model {}",
                manifest.n_features,
                feature_names.len(),
                model.n_features
            )));
        }
        if model.n_classes != manifest.n_classes || failure.classes.len() != manifest.n_classes {
            return Err(consistency(format!(
                "class count mismatch: manifest {}, model {}, encoder {}",
                manifest.n_classes,
                model.n_classes,
                failure.classes.len()
            )));
        }
        if model.family != manifest.model_family || model.family != model.classifier.family() {
            return Err(consistency("model family differs between manifest and model.json"));
        }

        let bundle = ModelBundle {
            classifier: model.classifier,
            scaler: StandardScaler::from_parts(scaler.feature_names, scaler.mean, scaler.scale)?,
            grade_encoder: LabelEncoder::from_classes(grade.classes)?,
            failure_encoder: LabelEncoder::from_classes(failure.classes)?,
            feature_names,
            metadata,
        };
        bundle.validate()?;

        info!(
            path = %dir.display(),
            bundle_id = %manifest.bundle_id,
            model = %bundle.metadata.selected_model,
            "Bundle loaded"
        );
        Ok(bundle)
    }
}

fn to_blob_bytes<T: Serialize>(data: T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(&Blob::new(data))?)
}

fn parse_blob<T: DeserializeOwned>(raw: &BTreeMap<&str, Vec<u8>>, name: &str) -> Result<T> {
    let bytes = raw
        .get(name)
        .ok_or_else(|| consistency(format!("{} not loaded", name)))?;
    let blob: Blob<T> =
        serde_json::from_slice(bytes).map_err(|e| consistency(format!("cannot parse {}: {}", name, e)))?;
    if blob.schema_version != SCHEMA_VERSION {
        return Err(consistency(format!(
            "{} has schema version {} (expected {})",
            name, blob.schema_version, SCHEMA_VERSION
        )));
    }
    Ok(blob.data)
}
