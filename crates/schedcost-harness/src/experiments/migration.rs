//! Forced-migration latency of one thread between two cores.
//!
//! A single real-time thread bounces between two cores. Per trial it is
//! pinned back to the initial core and the pin is confirmed with a core
//! query; then only the affinity call moving it to the final core sits
//! between the two timestamps, so the recorded delta is the kernel's cost
//! to honor that call.

use crate::realtime::{current_cpu, pin_to_core, RtContext, RtParams};
use crate::trial::TrialRunner;
use schedcost_common::{
    BenchConfig, Error, ExperimentKind, ExperimentReport, MonotonicTimestamp, Result, TimeDelta,
    TrialSeries,
};
use tracing::{debug, error};

/// A completed migration run.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    /// Signed per-trial costs.
    pub series: TrialSeries,
    /// Reduced statistics over the full series.
    pub report: ExperimentReport,
}

/// Run the migration experiment to completion.
///
/// # Errors
///
/// Fails on real-time elevation or affinity syscall failure, and on
/// [`Error::Corrupted`] when a core query contradicts the requested
/// placement. Corruption is fatal here: if the OS did not honor one
/// affinity request as expected, none of the collected deltas can be
/// trusted, so the run aborts before reducing statistics.
pub fn run_migration(config: &BenchConfig) -> Result<MigrationOutcome> {
    let runner = TrialRunner::new(config.trials)?;
    let cores = &config.migration;

    let params = RtParams::for_core(&config.realtime, cores.initial_core);
    let _rt = RtContext::enter(&params)?;

    debug!(
        initial_core = cores.initial_core,
        final_core = cores.final_core,
        trials = runner.trials(),
        "starting migration run"
    );

    // Kept alongside the runner's series so corrupt runs can still dump
    // every previously completed trial.
    let mut completed: Vec<i64> = Vec::with_capacity(runner.trials());

    let series = runner.collect(|trial| {
        pin_to_core(cores.initial_core)?;
        let observed = current_cpu()?;
        if observed != cores.initial_core {
            dump_completed_trials(&completed);
            return Err(corruption(
                trial,
                format!(
                    "running on core {observed} before migration, expected {}",
                    cores.initial_core
                ),
            ));
        }

        let before = MonotonicTimestamp::now();
        pin_to_core(cores.final_core)?;
        let after = MonotonicTimestamp::now();

        let observed = current_cpu()?;
        if observed != cores.final_core {
            dump_completed_trials(&completed);
            return Err(corruption(
                trial,
                format!(
                    "running on core {observed} after migration, expected {}",
                    cores.final_core
                ),
            ));
        }

        let cost = TimeDelta::between(before, after).as_signed_nanos();
        completed.push(cost);
        Ok(cost)
    })?;

    let report = ExperimentReport::from_series(&series)
        .ok_or_else(|| Error::Config("trials must be at least 1".into()))?;
    Ok(MigrationOutcome { series, report })
}

fn corruption(trial: usize, detail: String) -> Error {
    Error::Corrupted {
        experiment: ExperimentKind::Migration,
        trial,
        detail,
    }
}

fn dump_completed_trials(costs: &[i64]) {
    for (trial, cost_ns) in costs.iter().enumerate() {
        error!(trial, cost_ns, "migration trial completed before corruption");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_trials_rejected_before_elevation() {
        let mut config = BenchConfig::default();
        config.trials = 0;
        let err = run_migration(&config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_corruption_error_names_experiment_and_trial() {
        let err = corruption(7, "running on core 2 after migration, expected 3".into());
        let message = err.to_string();
        assert!(message.contains("migration"));
        assert!(message.contains("trial 7"));
    }
}
