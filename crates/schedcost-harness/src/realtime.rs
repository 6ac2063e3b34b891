//! Real-time execution context for measurement threads.
//!
//! Entering the context elevates the calling thread for deterministic
//! execution, in a fixed order:
//! - Real-time scheduling (SCHED_FIFO/SCHED_RR) at the class maximum priority
//! - CPU affinity restricted to exactly one core
//! - Memory locking (mlockall) to prevent page faults mid-trial
//!
//! Every step is fatal on failure, permission errors included. A thread
//! left in the time-shared class would measure the wrong scheduling regime,
//! so there is no degraded mode.

use schedcost_common::{BenchConfig, Error, ExperimentKind, Result, RtConfig, SchedPolicy};
use tracing::{debug, warn};

/// Parameters for one thread's real-time elevation.
#[derive(Debug, Clone, Copy)]
pub struct RtParams {
    /// Scheduling class entered at its maximum priority.
    pub policy: SchedPolicy,
    /// Core the thread is pinned to.
    pub core: usize,
    /// Lock current and future pages into RAM before measuring.
    pub lock_memory: bool,
}

impl RtParams {
    /// Parameters pinning to `core` under the shared real-time settings.
    #[must_use]
    pub fn for_core(realtime: &RtConfig, core: usize) -> Self {
        Self {
            policy: realtime.policy,
            core,
            lock_memory: realtime.lock_memory,
        }
    }
}

/// A measurement thread's acquired real-time state.
///
/// Dropping the context unlocks memory if it was locked on entry. The
/// scheduling class and affinity are left in place; measurement threads
/// exit right after their run.
#[derive(Debug)]
pub struct RtContext {
    policy: SchedPolicy,
    priority: i32,
    core: usize,
    locked: bool,
}

impl RtContext {
    /// Elevate the calling thread: scheduling class, then affinity, then
    /// memory locking.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Rt`] with the OS-level cause if any step fails,
    /// including EPERM when the process lacks `CAP_SYS_NICE` or
    /// `CAP_IPC_LOCK`.
    #[cfg(target_os = "linux")]
    pub fn enter(params: &RtParams) -> Result<Self> {
        let priority = max_priority(params.policy)?;
        set_scheduler(params.policy, priority)?;
        pin_to_core(params.core)?;
        if params.lock_memory {
            lock_memory()?;
        }

        let context = Self {
            policy: params.policy,
            priority,
            core: params.core,
            locked: params.lock_memory,
        };
        debug!(?context, "real-time context entered");
        Ok(context)
    }

    #[cfg(not(target_os = "linux"))]
    pub fn enter(_params: &RtParams) -> Result<Self> {
        Err(Error::Rt("real-time measurement requires Linux".into()))
    }

    /// Scheduling class in effect.
    #[must_use]
    pub fn policy(&self) -> SchedPolicy {
        self.policy
    }

    /// Priority the thread runs at.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Core the thread is pinned to.
    #[must_use]
    pub fn core(&self) -> usize {
        self.core
    }

    /// Whether this context locked memory on entry.
    #[must_use]
    pub fn memory_locked(&self) -> bool {
        self.locked
    }
}

impl Drop for RtContext {
    fn drop(&mut self) {
        if self.locked {
            unlock_memory();
        }
    }
}

#[cfg(target_os = "linux")]
fn linux_policy(policy: SchedPolicy) -> libc::c_int {
    match policy {
        SchedPolicy::Fifo => libc::SCHED_FIFO,
        SchedPolicy::Rr => libc::SCHED_RR,
    }
}

/// Highest priority the kernel accepts for `policy`.
#[cfg(target_os = "linux")]
fn max_priority(policy: SchedPolicy) -> Result<i32> {
    // SAFETY: sched_get_priority_max reads no caller memory and reports
    // errors through its return value.
    let priority = unsafe { libc::sched_get_priority_max(linux_policy(policy)) };
    if priority == -1 {
        return Err(Error::Rt(format!(
            "sched_get_priority_max failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(priority)
}

#[cfg(target_os = "linux")]
fn set_scheduler(policy: SchedPolicy, priority: i32) -> Result<()> {
    let param = libc::sched_param {
        sched_priority: priority,
    };

    // SAFETY: param is a valid sched_param that outlives the call; pid 0
    // targets the calling thread.
    let ret = unsafe { libc::sched_setscheduler(0, linux_policy(policy), &param) };
    if ret == -1 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::EPERM) {
            return Err(Error::Rt(format!(
                "sched_setscheduler({policy:?}) denied: run as root or grant CAP_SYS_NICE"
            )));
        }
        return Err(Error::Rt(format!("sched_setscheduler failed: {err}")));
    }

    debug!(?policy, priority, "scheduling class entered");
    Ok(())
}

/// Pin the calling thread to exactly one core.
///
/// Does no logging on the success path: the migration experiment calls this
/// inside its measured window.
#[cfg(target_os = "linux")]
pub fn pin_to_core(core: usize) -> Result<()> {
    use nix::sched::{sched_setaffinity, CpuSet};
    use nix::unistd::Pid;

    let mut cpu_set = CpuSet::new();
    cpu_set
        .set(core)
        .map_err(|err| Error::Config(format!("invalid core index {core}: {err}")))?;

    sched_setaffinity(Pid::from_raw(0), &cpu_set)
        .map_err(|err| Error::Rt(format!("sched_setaffinity to core {core} failed: {err}")))
}

#[cfg(not(target_os = "linux"))]
pub fn pin_to_core(_core: usize) -> Result<()> {
    Err(Error::Rt("CPU pinning requires Linux".into()))
}

/// Core the calling thread is executing on right now.
#[cfg(target_os = "linux")]
pub fn current_cpu() -> Result<usize> {
    // SAFETY: sched_getcpu reads no caller memory.
    let cpu = unsafe { libc::sched_getcpu() };
    if cpu < 0 {
        return Err(Error::Rt(format!(
            "sched_getcpu failed: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(cpu as usize)
}

#[cfg(not(target_os = "linux"))]
pub fn current_cpu() -> Result<usize> {
    Err(Error::Rt("core queries require Linux".into()))
}

/// Number of online CPUs on the host.
#[cfg(unix)]
#[must_use]
pub fn online_cpus() -> usize {
    // SAFETY: sysconf reads no caller memory.
    let count = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    if count < 1 {
        1
    } else {
        count as usize
    }
}

#[cfg(not(unix))]
#[must_use]
pub fn online_cpus() -> usize {
    1
}

/// Check every core the configured experiment will use against the host.
///
/// An offline core is a configuration error. Cores 0 and 1 are accepted but
/// flagged: on most hosts they carry the bulk of interrupt and housekeeping
/// load, which contaminates latency measurements.
pub fn validate_cores(config: &BenchConfig) -> Result<()> {
    let online = online_cpus();
    let required = match config.experiment {
        ExperimentKind::Preemption => vec![config.preemption.core],
        ExperimentKind::Migration => {
            vec![config.migration.initial_core, config.migration.final_core]
        }
        ExperimentKind::CacheFill => vec![config.cache_fill.core],
        ExperimentKind::Interference => vec![config.interference.core],
    };

    for &core in &required {
        if core >= online {
            return Err(Error::Config(format!(
                "core {core} is not online (host has {online} cpus)"
            )));
        }
        if core < 2 {
            warn!(core, "measurement core overlaps the interrupt-heavy cores 0-1");
        }
    }
    Ok(())
}

#[cfg(target_os = "linux")]
fn lock_memory() -> Result<()> {
    use nix::sys::mman::{mlockall, MlockAllFlags};

    mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE).map_err(|err| match err {
        nix::errno::Errno::EPERM => {
            Error::Rt("mlockall denied: run as root or grant CAP_IPC_LOCK".into())
        }
        other => Error::Rt(format!("mlockall failed: {other}")),
    })
}

#[cfg(target_os = "linux")]
fn unlock_memory() {
    use nix::sys::mman::munlockall;

    if let Err(err) = munlockall() {
        warn!("munlockall failed: {err}");
    }
}

#[cfg(not(target_os = "linux"))]
fn unlock_memory() {}
