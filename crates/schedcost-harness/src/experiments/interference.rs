//! Scheduler interference bookkeeping around a CPU-bound workload.
//!
//! Unlike the latency experiments this one measures nothing inside the
//! workload; it brackets the run with per-thread rusage snapshots and
//! reports the deltas: user and system time consumed, and how often the
//! scheduler switched the thread out voluntarily versus involuntarily.
//! Adding a contending thread on the same core shows how the chosen
//! scheduling class (run-to-completion FIFO versus time-sliced RR) shapes
//! those counts.

use crate::realtime::{RtContext, RtParams};
use crate::workload::Workload;
use schedcost_common::{BenchConfig, Error, Result};
use std::thread;
use tracing::{debug, info};

/// Point-in-time rusage reading for the calling thread.
#[derive(Debug, Clone, Copy)]
pub struct UsageSnapshot {
    user_secs: i64,
    user_micros: i64,
    system_secs: i64,
    system_micros: i64,
    voluntary_switches: i64,
    involuntary_switches: i64,
}

impl UsageSnapshot {
    /// Capture the calling thread's accumulated usage.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rt`] if the kernel rejects the query, or on
    /// platforms without per-thread rusage accounting.
    #[cfg(target_os = "linux")]
    pub fn capture() -> Result<Self> {
        use nix::sys::resource::{getrusage, UsageWho};

        let usage = getrusage(UsageWho::RUSAGE_THREAD)
            .map_err(|err| Error::Rt(format!("getrusage failed: {err}")))?;
        let user = usage.user_time();
        let system = usage.system_time();
        Ok(Self {
            user_secs: i64::from(user.tv_sec()),
            user_micros: i64::from(user.tv_usec()),
            system_secs: i64::from(system.tv_sec()),
            system_micros: i64::from(system.tv_usec()),
            voluntary_switches: i64::from(usage.voluntary_context_switches()),
            involuntary_switches: i64::from(usage.involuntary_context_switches()),
        })
    }

    #[cfg(not(target_os = "linux"))]
    pub fn capture() -> Result<Self> {
        Err(Error::Rt("per-thread rusage requires Linux".into()))
    }

    /// Usage accumulated since `earlier`.
    #[must_use]
    pub fn since(&self, earlier: &UsageSnapshot) -> UsageDelta {
        let (user_secs, user_micros) = normalize(
            self.user_secs - earlier.user_secs,
            self.user_micros - earlier.user_micros,
        );
        let (system_secs, system_micros) = normalize(
            self.system_secs - earlier.system_secs,
            self.system_micros - earlier.system_micros,
        );
        UsageDelta {
            user_secs,
            user_micros,
            system_secs,
            system_micros,
            voluntary_switches: self.voluntary_switches - earlier.voluntary_switches,
            involuntary_switches: self.involuntary_switches - earlier.involuntary_switches,
        }
    }
}

/// Borrow one second when the microsecond subtraction goes negative.
fn normalize(mut secs: i64, mut micros: i64) -> (i64, i64) {
    if micros < 0 {
        secs -= 1;
        micros += 1_000_000;
    }
    (secs, micros)
}

/// Usage accumulated between two snapshots, microsecond-normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageDelta {
    /// Whole seconds of user time.
    pub user_secs: i64,
    /// Microsecond remainder of user time, `0..1_000_000`.
    pub user_micros: i64,
    /// Whole seconds of system time.
    pub system_secs: i64,
    /// Microsecond remainder of system time, `0..1_000_000`.
    pub system_micros: i64,
    /// Context switches the thread asked for (blocking, yielding).
    pub voluntary_switches: i64,
    /// Context switches forced on the thread by the scheduler.
    pub involuntary_switches: i64,
}

/// A completed interference run.
#[derive(Debug, Clone, Copy)]
pub struct InterferenceReport {
    /// Usage the primary workload thread accumulated over its run.
    pub usage: UsageDelta,
    /// Workload iterations the primary thread executed.
    pub iterations: u64,
    /// Whether a contending thread shared the core.
    pub contended: bool,
}

/// Run the interference experiment to completion.
///
/// # Errors
///
/// Fails on real-time elevation, rusage capture, or thread failure.
pub fn run_interference<W: Workload>(config: &BenchConfig, workload: &W) -> Result<InterferenceReport> {
    let settings = &config.interference;
    if settings.iterations == 0 {
        return Err(Error::Config("interference.iterations must be at least 1".into()));
    }

    // The interference experiment carries its own scheduling class; FIFO
    // and RR produce deliberately different switch counts here.
    let params = RtParams {
        policy: settings.policy,
        core: settings.core,
        lock_memory: config.realtime.lock_memory,
    };
    let iterations = settings.iterations;

    debug!(
        core = settings.core,
        iterations,
        contended = settings.contended,
        workload = workload.name(),
        "starting interference run"
    );

    let usage = thread::scope(|scope| {
        let competitor = if settings.contended {
            let handle = thread::Builder::new()
                .name("schedcost-rival".into())
                .spawn_scoped(scope, || competitor_run(&params, iterations, workload))
                .map_err(|err| Error::Thread(format!("failed to spawn competitor: {err}")))?;
            Some(handle)
        } else {
            None
        };

        let primary = thread::Builder::new()
            .name("schedcost-load".into())
            .spawn_scoped(scope, || primary_run(&params, iterations, workload))
            .map_err(|err| Error::Thread(format!("failed to spawn workload thread: {err}")))?;

        let usage = primary
            .join()
            .map_err(|_| Error::Thread("workload thread panicked".into()))??;
        if let Some(handle) = competitor {
            handle
                .join()
                .map_err(|_| Error::Thread("competitor thread panicked".into()))??;
        }
        Ok(usage)
    })?;

    info!(
        user_secs = usage.user_secs,
        user_micros = usage.user_micros,
        voluntary = usage.voluntary_switches,
        involuntary = usage.involuntary_switches,
        "interference run complete"
    );

    Ok(InterferenceReport {
        usage,
        iterations,
        contended: settings.contended,
    })
}

fn primary_run<W: Workload>(params: &RtParams, iterations: u64, workload: &W) -> Result<UsageDelta> {
    let _rt = RtContext::enter(params)?;
    let before = UsageSnapshot::capture()?;
    workload.run(iterations);
    let after = UsageSnapshot::capture()?;
    Ok(after.since(&before))
}

fn competitor_run<W: Workload>(params: &RtParams, iterations: u64, workload: &W) -> Result<()> {
    let _rt = RtContext::enter(params)?;
    workload.run(iterations);
    Ok(())
}
