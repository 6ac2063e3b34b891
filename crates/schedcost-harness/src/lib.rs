//! Measurement harness for the schedcost benchmarks.
//!
//! Provides the building blocks the experiments are assembled from:
//! - [`realtime`]: per-thread scheduling elevation, pinning and memory
//!   locking, all fatal on failure
//! - [`rendezvous`]: the dual-barrier meeting point for the two preemption
//!   participants
//! - [`trial`]: trace recording, the post-run arena and corruption checks
//! - [`cache`] and [`workload`]: the swept buffer, eviction capabilities
//!   and injectable CPU burners
//! - [`experiments`]: the four run-to-completion experiment drivers
//!
//! Everything that talks to the scheduler is Linux-only; the rest builds
//! anywhere so the arithmetic and protocol checks stay testable off-target.

pub mod cache;
pub mod experiments;
pub mod realtime;
pub mod rendezvous;
pub mod trial;
pub mod workload;

pub use cache::{create_evictor, CacheBuffer, CacheEvictor, DeviceEvictor, FlushEvictor};
pub use experiments::{
    run_cache_fill, run_interference, run_migration, run_preemption, CacheFillOutcome,
    InterferenceReport, MigrationOutcome, PreemptionOutcome, UsageDelta, UsageSnapshot,
};
pub use realtime::{current_cpu, online_cpus, pin_to_core, validate_cores, RtContext, RtParams};
pub use rendezvous::Rendezvous;
pub use trial::{ThreadTrace, TrialArena, TrialRunner};
pub use workload::{PolynomialWorkload, SpinWorkload, Workload};
