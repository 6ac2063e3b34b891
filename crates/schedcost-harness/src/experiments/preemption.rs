//! Voluntary-preemption latency between two cooperating threads.
//!
//! Both threads are pinned to the same core at real-time priority, so the
//! scheduler has to interleave them. Per trial each thread meets the peer
//! at the start barrier, timestamps, yields, timestamps again, yields again
//! and meets the peer at the end barrier. The cost of one trial is the gap
//! between the two threads' first timestamps; the second timestamp only
//! exists to prove afterwards that the yields really interleaved.

use crate::realtime::{RtContext, RtParams};
use crate::rendezvous::Rendezvous;
use crate::trial::{ThreadTrace, TrialArena};
use schedcost_common::{
    BenchConfig, Error, ExperimentReport, MonotonicTimestamp, Result, TrialSeries,
};
use std::thread;
use tracing::{debug, warn};

/// Everything a completed preemption run produced.
///
/// The harness always reduces statistics, corrupt trials included; whether
/// corruption aborts the report or merely accompanies it is the caller's
/// policy.
#[derive(Debug, Clone)]
pub struct PreemptionOutcome {
    /// Both participants' raw traces.
    pub arena: TrialArena,
    /// Signed per-trial costs derived from the arena.
    pub series: TrialSeries,
    /// Reduced statistics over the full series.
    pub report: ExperimentReport,
    /// Trials whose timestamps violate the yield protocol, in order.
    pub corrupt_trials: Vec<usize>,
}

/// Run the preemption experiment to completion.
///
/// # Errors
///
/// Fails on real-time elevation, thread spawn/join failure, or traces that
/// cannot form a coherent arena. Protocol corruption is not an error here;
/// it is reported through [`PreemptionOutcome::corrupt_trials`].
pub fn run_preemption(config: &BenchConfig) -> Result<PreemptionOutcome> {
    let trials = config.trials;
    if trials == 0 {
        return Err(Error::Config("trials must be at least 1".into()));
    }

    let params = RtParams::for_core(&config.realtime, config.preemption.core);
    let warmup_rounds = config.preemption.warmup_rounds;
    let stack_size = config.preemption.stack_size;

    debug!(
        core = params.core,
        trials, warmup_rounds, "starting preemption run"
    );

    let (ours, theirs) = Rendezvous::pair();
    let first = spawn_participant(0, ours, trials, warmup_rounds, params, stack_size)?;
    let second = spawn_participant(1, theirs, trials, warmup_rounds, params, stack_size)?;

    let trace_a = join_participant(first)?;
    let trace_b = join_participant(second)?;

    let arena = TrialArena::from_traces(trace_a, trace_b)?;
    let series = arena.cost_series();
    let report = ExperimentReport::from_series(&series)
        .ok_or_else(|| Error::Config("trials must be at least 1".into()))?;

    let corrupt_trials = arena.corrupt_trials();
    if !corrupt_trials.is_empty() {
        warn!(
            count = corrupt_trials.len(),
            first = corrupt_trials[0],
            "trials violated the yield protocol"
        );
    }

    Ok(PreemptionOutcome {
        arena,
        series,
        report,
        corrupt_trials,
    })
}

fn spawn_participant(
    participant: usize,
    rendezvous: Rendezvous,
    trials: usize,
    warmup_rounds: u32,
    params: RtParams,
    stack_size: usize,
) -> Result<thread::JoinHandle<Result<ThreadTrace>>> {
    thread::Builder::new()
        .name(format!("schedcost-p{participant}"))
        .stack_size(stack_size)
        .spawn(move || participant_run(participant, trials, warmup_rounds, &params, &rendezvous))
        .map_err(|err| Error::Thread(format!("failed to spawn participant {participant}: {err}")))
}

fn join_participant(handle: thread::JoinHandle<Result<ThreadTrace>>) -> Result<ThreadTrace> {
    handle
        .join()
        .map_err(|_| Error::Thread("measurement thread panicked".into()))?
}

fn participant_run(
    participant: usize,
    trials: usize,
    warmup_rounds: u32,
    params: &RtParams,
    rendezvous: &Rendezvous,
) -> Result<ThreadTrace> {
    let _rt = RtContext::enter(params)?;
    let mut trace = ThreadTrace::new(participant, trials, warmup_rounds);

    // Warm-up rounds yield exactly like trials do; their timestamps stay in
    // the trace but never reach the reducer.
    for _ in 0..warmup_rounds {
        trace.record_warmup(MonotonicTimestamp::now());
        thread::yield_now();
    }

    for _ in 0..trials {
        rendezvous.await_start();

        let measure = MonotonicTimestamp::now();
        thread::yield_now();

        let debug = MonotonicTimestamp::now();
        thread::yield_now();

        rendezvous.await_end();
        // Recording happens outside the measured window, after both
        // participants have crossed the end barrier.
        trace.record_trial(measure, debug);
    }

    Ok(trace)
}
