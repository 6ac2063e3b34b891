//! Benchmark configuration loaded from TOML.
//!
//! Every knob has a default chosen so that `schedcost` runs meaningfully on
//! a 4-core real-time host with no configuration file at all: measurement
//! threads land on cores 2 and 3 rather than the housekeeping cores 0 and 1,
//! trials default to one hundred, and memory locking is on.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::error::{Error, Result};

/// Smallest stack, in bytes, accepted for a measurement thread.
///
/// Timestamp capture and trace recording need very little stack, but the
/// historical minimum-plus-slack sizing was close enough to the platform
/// floor to fault under instrumented builds. 128 KiB keeps a comfortable
/// margin on every supported target.
pub const MIN_MEASUREMENT_STACK: usize = 128 * 1024;

/// Serde helpers for human-readable durations ("1s", "250ms") in TOML.
mod humantime_serde {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(de::Error::custom)
    }
}

/// Errors produced while loading or saving a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the file from disk failed.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file contents are not valid TOML for [`BenchConfig`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Serializing a configuration back to TOML failed.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Which measurement the process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ExperimentKind {
    /// Voluntary-preemption latency between two cooperating threads.
    #[default]
    Preemption,
    /// Forced-migration latency of one thread between two cores.
    Migration,
    /// L2 refill cost of sweeping a half-L2 buffer after eviction.
    CacheFill,
    /// Scheduler interference bookkeeping around a CPU-bound workload.
    Interference,
}

impl fmt::Display for ExperimentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Preemption => "preemption",
            Self::Migration => "migration",
            Self::CacheFill => "cache-fill",
            Self::Interference => "interference",
        })
    }
}

/// Real-time scheduling class for measurement threads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchedPolicy {
    /// `SCHED_FIFO`: runs until it blocks or yields.
    #[default]
    Fifo,
    /// `SCHED_RR`: like FIFO with a time slice among equal priorities.
    Rr,
}

/// What to do when a preemption trial violates the protocol's causal order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CorruptionPolicy {
    /// Dump the offending trial's trace and exit non-zero without statistics.
    #[default]
    Abort,
    /// Log the corruption, dump the trace, and still report statistics.
    Warn,
}

/// How the cache-fill experiment evicts its buffer between sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EvictorKind {
    /// Flush the buffer's cache lines from user space.
    #[default]
    Flush,
    /// Open and close a kernel device whose driver clears the cache.
    Device,
}

/// Top-level benchmark configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// Experiment to run when none is named on the command line.
    pub experiment: ExperimentKind,
    /// Trials per run. Each trial yields one cost sample.
    pub trials: usize,
    /// Real-time context shared by all experiments.
    pub realtime: RtConfig,
    /// Preemption experiment knobs.
    pub preemption: PreemptionConfig,
    /// Migration experiment knobs.
    pub migration: MigrationConfig,
    /// Cache-fill experiment knobs.
    pub cache_fill: CacheFillConfig,
    /// Interference experiment knobs.
    pub interference: InterferenceConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            experiment: ExperimentKind::default(),
            trials: 100,
            realtime: RtConfig::default(),
            preemption: PreemptionConfig::default(),
            migration: MigrationConfig::default(),
            cache_fill: CacheFillConfig::default(),
            interference: InterferenceConfig::default(),
        }
    }
}

/// Scheduling class and memory-locking behavior for measurement threads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtConfig {
    /// Scheduling class entered before measuring. Priority is always the
    /// class maximum.
    pub policy: SchedPolicy,
    /// Lock current and future pages into RAM before measuring.
    pub lock_memory: bool,
}

impl Default for RtConfig {
    fn default() -> Self {
        Self {
            policy: SchedPolicy::Fifo,
            lock_memory: true,
        }
    }
}

/// Knobs for the voluntary-preemption experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreemptionConfig {
    /// Core both cooperating threads are pinned to.
    pub core: usize,
    /// Yield rounds run before the first recorded trial to warm caches and
    /// the scheduler's runqueue state. Their timestamps are kept in the
    /// trace but excluded from statistics.
    pub warmup_rounds: u32,
    /// Stack size in bytes for each measurement thread.
    pub stack_size: usize,
    /// Reaction to a trial whose timestamps contradict the yield protocol.
    pub on_corruption: CorruptionPolicy,
    /// Print the full timestamp trace even when every trial is clean.
    pub dump_trace: bool,
}

impl Default for PreemptionConfig {
    fn default() -> Self {
        Self {
            core: 3,
            warmup_rounds: 3,
            stack_size: 256 * 1024,
            on_corruption: CorruptionPolicy::Abort,
            dump_trace: false,
        }
    }
}

/// Knobs for the migration experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationConfig {
    /// Core the thread starts each trial on.
    pub initial_core: usize,
    /// Core the thread is forced onto mid-trial.
    pub final_core: usize,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            initial_core: 2,
            final_core: 3,
        }
    }
}

/// Knobs for the cache-fill experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheFillConfig {
    /// Core the sweeping thread is pinned to.
    pub core: usize,
    /// Total L2 size in bytes; the swept buffer is half of this.
    pub l2_size_bytes: usize,
    /// Eviction mechanism used between the hot and cold sweeps.
    pub evictor: EvictorKind,
    /// Device node opened by the device evictor.
    pub device_path: String,
    /// Pause after a device-driven eviction before the cold sweep.
    #[serde(with = "humantime_serde")]
    pub settle_delay: Duration,
}

impl Default for CacheFillConfig {
    fn default() -> Self {
        Self {
            core: 2,
            l2_size_bytes: 512 * 1024,
            evictor: EvictorKind::Flush,
            device_path: "/dev/clear_cache".to_owned(),
            settle_delay: Duration::from_secs(1),
        }
    }
}

/// Knobs for the interference experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterferenceConfig {
    /// Core the workload threads are pinned to.
    pub core: usize,
    /// Workload iterations per thread.
    pub iterations: u64,
    /// Run two workload threads on the same core instead of one.
    pub contended: bool,
    /// Scheduling class for the workload threads.
    pub policy: SchedPolicy,
}

impl Default for InterferenceConfig {
    fn default() -> Self {
        Self {
            core: 2,
            iterations: 1_000_000_000,
            contended: false,
            policy: SchedPolicy::Rr,
        }
    }
}

impl BenchConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(raw: &str) -> std::result::Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Render the configuration as TOML.
    pub fn to_toml(&self) -> std::result::Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject configurations that cannot produce a meaningful run.
    ///
    /// Core ids are only range-checked against the running host later, by
    /// the harness; everything here is host-independent.
    pub fn validate(&self) -> Result<()> {
        if self.trials == 0 {
            return Err(Error::Config("trials must be at least 1".into()));
        }
        if self.preemption.stack_size < MIN_MEASUREMENT_STACK {
            return Err(Error::Config(format!(
                "preemption.stack_size {} is below the {} byte minimum",
                self.preemption.stack_size, MIN_MEASUREMENT_STACK
            )));
        }
        if self.migration.initial_core == self.migration.final_core {
            return Err(Error::Config(format!(
                "migration requires two distinct cores, got {} for both",
                self.migration.initial_core
            )));
        }
        if self.cache_fill.l2_size_bytes == 0 {
            return Err(Error::Config(
                "cache_fill.l2_size_bytes must be non-zero".into(),
            ));
        }
        if self.interference.iterations == 0 {
            return Err(Error::Config(
                "interference.iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
