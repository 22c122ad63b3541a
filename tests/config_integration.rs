//! Configuration file integration tests

use std::fs;
use stepwatch::config::{Measurement, RunConfig};
use stepwatch::SupervisorError;
use tempfile::TempDir;

#[test]
fn test_save_then_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut config = RunConfig::default();
    config.termination.measurement = Some(Measurement::Temperature);
    config.termination.tolerance = 5e-4;
    config.worker.progress_interval = 10;
    config.save(&path).unwrap();

    let loaded = RunConfig::load(Some(path)).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[termination]\nt_end = 2.0\nsteady_period = 0.01\ntolerance = 1e-3\n",
    )
    .unwrap();

    let loaded = RunConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded.termination.t_end, 2.0);
    assert_eq!(loaded.termination.measurement, None);
    assert_eq!(loaded.worker, RunConfig::default().worker);
    assert_eq!(loaded.monitor, RunConfig::default().monitor);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = RunConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, SupervisorError::ConfigIo { .. }));
}

#[test]
fn test_malformed_file_is_parse_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[termination\nt_end = ").unwrap();

    let err = RunConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SupervisorError::ConfigParse(_)));
}

#[test]
fn test_invalid_values_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[termination]\nmeasurement = \"heat_release\"\nt_end = 1.0\nsteady_period = 0.1\ntolerance = 2.0\n",
    )
    .unwrap();

    let err = RunConfig::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SupervisorError::ConfigValidation(_)));
}
