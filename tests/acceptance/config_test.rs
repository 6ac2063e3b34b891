//! Configuration resolution tests.
//!
//! Verify that the shipped default file, TOML parsing through disk, and host
//! core validation agree with the built-in defaults.

use std::io::Write;
use std::path::Path;

use schedcost_common::{BenchConfig, ExperimentKind};
use schedcost_harness::{online_cpus, validate_cores};
use tempfile::NamedTempFile;

#[test]
fn test_shipped_default_file_matches_builtin_defaults() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
    let from_file = BenchConfig::from_file(&path).expect("shipped default config must parse");
    assert_eq!(from_file, BenchConfig::default());
}

#[test]
fn test_config_round_trips_through_disk() {
    let mut config = BenchConfig::default();
    config.experiment = ExperimentKind::Migration;
    config.trials = 42;
    config.migration.initial_core = 5;
    config.migration.final_core = 6;

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(config.to_toml().unwrap().as_bytes())
        .unwrap();

    let loaded = BenchConfig::from_file(file.path()).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_core_validation_checks_the_selected_experiment() {
    let mut config = BenchConfig::default();
    config.experiment = ExperimentKind::Migration;
    config.migration.initial_core = online_cpus() + 64;
    assert!(validate_cores(&config).is_err());

    // The bogus core belongs to an experiment that is not selected, so it
    // is not checked.
    config.experiment = ExperimentKind::Interference;
    config.interference.core = 0;
    assert!(validate_cores(&config).is_ok());
}
