//! Common utilities for integration tests.
//!
//! Provides helpers for:
//! - Checking real-time prerequisites (PREEMPT_RT, privileges, core count)
//! - Picking measurement cores that exist on the running host

use std::fs;

/// Check if the system has PREEMPT_RT kernel.
pub fn has_preempt_rt() -> bool {
    if let Ok(version) = fs::read_to_string("/proc/version") {
        version.contains("PREEMPT_RT") || version.contains("PREEMPT RT")
    } else {
        false
    }
}

/// Check if running as root (required for RT priority).
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Get the number of CPUs available to this process.
pub fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

/// Highest-numbered core available to this process.
///
/// Single-threaded experiments pin here; it is the core least likely to be
/// servicing interrupts.
pub fn pick_core() -> usize {
    num_cpus() - 1
}

/// Two distinct cores for the migration experiment, highest-numbered first.
///
/// Only meaningful when [`num_cpus`] is at least 2.
pub fn measurement_cores() -> (usize, usize) {
    let cpus = num_cpus();
    (cpus - 2, cpus - 1)
}

/// Check all prerequisites for full real-time measurement runs.
pub fn check_rt_prerequisites() -> Result<(), String> {
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    if !is_root() {
        errors.push("Not running as root - real-time scheduling will be denied");
    }

    if num_cpus() < 2 {
        errors.push("Need at least 2 CPUs for the migration experiment");
    } else if num_cpus() < 4 {
        warnings.push("Fewer than 4 CPUs - measurement cores overlap the interrupt-heavy cores");
    }

    if !has_preempt_rt() {
        warnings.push("PREEMPT_RT kernel not detected - latency results may be unreliable");
    }

    for warning in &warnings {
        eprintln!("WARNING: {}", warning);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}
