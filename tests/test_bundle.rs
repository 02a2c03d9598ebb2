//! Integration test: bundle persistence, validation and tamper detection

mod common;

use predictive_maintenance::export::{
    compute_sha256, ArtifactStore, Manifest, BLOB_FILES, FAILURE_ENCODER_FILE, MANIFEST_FILE, MODEL_FILE,
    SCALER_FILE,
};
use predictive_maintenance::{InferenceService, MaintenanceError};
use std::fs;
use std::path::Path;

fn saved_bundle() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bundle");
    ArtifactStore::save(&common::trained().bundle, &path).unwrap();
    (dir, path)
}

fn assert_inconsistent(path: &Path) {
    match ArtifactStore::load(path) {
        Err(MaintenanceError::BundleConsistencyError(_)) => {}
        other => panic!("expected BundleConsistencyError, got {:?}", other.map(|_| ())),
    }
}

fn rewrite_manifest(path: &Path, edit: impl FnOnce(&mut Manifest)) {
    let manifest_path = path.join(MANIFEST_FILE);
    let mut manifest: Manifest = serde_json::from_slice(&fs::read(&manifest_path).unwrap()).unwrap();
    edit(&mut manifest);
    fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest).unwrap()).unwrap();
}

#[test]
fn test_save_writes_every_blob_and_manifest() {
    let (_dir, path) = saved_bundle();
    for name in BLOB_FILES.iter().chain(std::iter::once(&MANIFEST_FILE)) {
        assert!(path.join(name).is_file(), "{} missing", name);
    }

    let manifest = ArtifactStore::read_manifest(&path).unwrap();
    assert_eq!(manifest.n_features, 11);
    assert_eq!(manifest.feature_names, common::trained().bundle.feature_names);
    assert_eq!(manifest.checksums.len(), BLOB_FILES.len());
}

#[test]
fn test_round_trip_gives_identical_predictions() {
    let (_dir, path) = saved_bundle();
    let original = &common::trained().bundle;
    let loaded = ArtifactStore::load(&path).unwrap();

    assert_eq!(loaded.feature_names, original.feature_names);
    assert_eq!(loaded.metadata, original.metadata);
    assert_eq!(loaded.scaler, original.scaler);

    let before = InferenceService::new(original.clone()).unwrap();
    let after = InferenceService::new(loaded).unwrap();
    let records = vec![
        before.features_for(&common::normal_reading()).unwrap().into_map(),
        before.features_for(&common::high_wear_reading()).unwrap().into_map(),
    ];
    assert_eq!(
        before.predict(&records, true).unwrap(),
        after.predict(&records, true).unwrap()
    );
}

#[test]
fn test_overwrite_replaces_bundle_without_leftovers() {
    let (dir, path) = saved_bundle();
    let first = ArtifactStore::read_manifest(&path).unwrap();
    let second = ArtifactStore::save(&common::trained().bundle, &path).unwrap();
    assert_ne!(first.bundle_id, second.bundle_id);
    assert_eq!(ArtifactStore::read_manifest(&path).unwrap().bundle_id, second.bundle_id);

    let entries: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["bundle".to_string()]);
}

#[test]
fn test_missing_blob_rejected() {
    let (_dir, path) = saved_bundle();
    fs::remove_file(path.join(SCALER_FILE)).unwrap();
    assert_inconsistent(&path);
}

#[test]
fn test_checksum_mismatch_rejected() {
    let (_dir, path) = saved_bundle();
    let model_path = path.join(MODEL_FILE);
    let mut bytes = fs::read(&model_path).unwrap();
    bytes.push(b'\n');
    fs::write(&model_path, bytes).unwrap();
    assert_inconsistent(&path);
}

#[test]
fn test_class_count_mismatch_rejected() {
    let (_dir, path) = saved_bundle();
    let encoder_path = path.join(FAILURE_ENCODER_FILE);
    let mut blob: serde_json::Value = serde_json::from_slice(&fs::read(&encoder_path).unwrap()).unwrap();
    blob["data"]["classes"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::Value::String("Zzz Failure".to_string()));
    let bytes = serde_json::to_vec_pretty(&blob).unwrap();
    fs::write(&encoder_path, &bytes).unwrap();

    // checksum is made valid so the cross-check is what fails
    rewrite_manifest(&path, |m| {
        m.checksums.insert(FAILURE_ENCODER_FILE.to_string(), compute_sha256(&bytes));
    });
    assert_inconsistent(&path);
}

#[test]
fn test_feature_order_mismatch_rejected() {
    let (_dir, path) = saved_bundle();
    rewrite_manifest(&path, |m| m.feature_names.swap(0, 1));
    assert_inconsistent(&path);
}

#[test]
fn test_missing_bundle_directory_rejected() {
    let dir = tempfile::tempdir().unwrap();
    assert_inconsistent(&dir.path().join("nope"));
}
