//! Shared foundation for the schedcost benchmarks.
//!
//! This crate holds everything the harness and the CLI agree on:
//! configuration loading, the error taxonomy, monotonic timestamp
//! arithmetic and trial statistics. It performs no scheduling syscalls
//! and needs no privileges, so its tests run on any Unix host.

pub mod config;
pub mod error;
pub mod stats;
pub mod time;

pub use config::{
    BenchConfig, CacheFillConfig, ConfigError, CorruptionPolicy, EvictorKind, ExperimentKind,
    InterferenceConfig, MigrationConfig, PreemptionConfig, RtConfig, SchedPolicy,
    MIN_MEASUREMENT_STACK,
};
pub use error::{Error, Result};
pub use stats::{ExperimentReport, TrialSeries};
pub use time::{MonotonicTimestamp, TimeDelta, NANOS_PER_SEC};
