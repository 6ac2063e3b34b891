//! The scheduler-cost experiments.
//!
//! Each experiment is a self-contained run-to-completion function taking
//! the shared [`BenchConfig`](schedcost_common::BenchConfig) and returning
//! an outcome struct; policy decisions about corrupt or degraded results
//! belong to the caller.

pub mod cache_fill;
pub mod interference;
pub mod migration;
pub mod preemption;

pub use cache_fill::{run_cache_fill, CacheFillOutcome};
pub use interference::{run_interference, InterferenceReport, UsageDelta, UsageSnapshot};
pub use migration::{run_migration, MigrationOutcome};
pub use preemption::{run_preemption, PreemptionOutcome};
