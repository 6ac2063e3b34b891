use crate::config::ExperimentKind;
use thiserror::Error;

/// Benchmark error types covering real-time setup, configuration, and
/// measurement corruption. None of them is retryable.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// Real-time setup failure (scheduler elevation, CPU affinity, memory
    /// locking). Always fatal; there is no degraded measurement mode.
    #[error("real-time setup failed: {0}")]
    Rt(String),

    /// Semantic configuration error (bad core id, zero trial count, ...).
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A trial's observed timestamp or core ordering contradicts the
    /// measurement protocol.
    #[error("{experiment} experiment corrupted at trial {trial}: {detail}")]
    Corrupted {
        /// Experiment that detected the corruption.
        experiment: ExperimentKind,
        /// Zero-based index of the offending trial.
        trial: usize,
        /// Human-readable description of the violated expectation.
        detail: String,
    },

    /// A measurement thread terminated abnormally (panicked or could not be
    /// spawned).
    #[error("measurement thread failed: {0}")]
    Thread(String),
}

/// Convenience alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;
