//! L2 refill cost of sweeping a half-L2 buffer after eviction.
//!
//! Per trial the pinned real-time thread sweeps the buffer once untimed to
//! make it resident, times a hot sweep, evicts, and times a cold sweep.
//! The recorded cost is cold minus hot, canceling the loop overhead both
//! sweeps share and leaving the refill latency itself.

use crate::cache::{create_evictor, CacheBuffer};
use crate::realtime::{RtContext, RtParams};
use crate::trial::TrialRunner;
use schedcost_common::{
    BenchConfig, Error, ExperimentReport, MonotonicTimestamp, Result, TimeDelta, TrialSeries,
};
use tracing::debug;

/// A completed cache-fill run.
#[derive(Debug, Clone)]
pub struct CacheFillOutcome {
    /// Signed per-trial costs; negative entries mean the eviction path did
    /// not actually evict on this host.
    pub series: TrialSeries,
    /// Reduced statistics over the full series.
    pub report: ExperimentReport,
}

/// Run the cache-fill experiment to completion.
///
/// # Errors
///
/// Fails on real-time elevation failure or a zero trial count. A missing
/// cache-clear device is not an error; the evictor degrades with a warning.
pub fn run_cache_fill(config: &BenchConfig) -> Result<CacheFillOutcome> {
    let runner = TrialRunner::new(config.trials)?;
    let settings = &config.cache_fill;

    let params = RtParams::for_core(&config.realtime, settings.core);
    let _rt = RtContext::enter(&params)?;

    // Allocated after mlockall so MCL_FUTURE pins the pages as they fault.
    let buffer = CacheBuffer::half_of_l2(settings.l2_size_bytes);
    let evictor = create_evictor(settings);

    debug!(
        core = settings.core,
        buffer_bytes = buffer.len(),
        evictor = evictor.name(),
        trials = runner.trials(),
        "starting cache-fill run"
    );

    let series = runner.collect(|_trial| {
        // Untimed warm pass: everything resident before the hot sweep.
        buffer.sweep();

        let hot_start = MonotonicTimestamp::now();
        buffer.sweep();
        let hot_end = MonotonicTimestamp::now();

        evictor.evict(&buffer)?;

        let cold_start = MonotonicTimestamp::now();
        buffer.sweep();
        let cold_end = MonotonicTimestamp::now();

        let hot = TimeDelta::between(hot_start, hot_end).as_signed_nanos();
        let cold = TimeDelta::between(cold_start, cold_end).as_signed_nanos();
        Ok(cold - hot)
    })?;

    let report = ExperimentReport::from_series(&series)
        .ok_or_else(|| Error::Config("trials must be at least 1".into()))?;
    Ok(CacheFillOutcome { series, report })
}
