//! End-to-end experiment tests.
//!
//! The ungated tests exercise the measurement plumbing on any host and
//! tolerate the kernel denying real-time scheduling. The `#[ignore]` tests
//! are full runs with real scheduling classes, pinned cores, and locked
//! memory; run them with `cargo test -- --ignored` as root on a quiet host.

use schedcost_common::{BenchConfig, Error, ExperimentReport, MonotonicTimestamp};
use schedcost_harness::experiments::{
    run_cache_fill, run_interference, run_migration, run_preemption,
};
use schedcost_harness::{PolynomialWorkload, Rendezvous, ThreadTrace, TrialArena};

use super::common::{check_rt_prerequisites, measurement_cores, num_cpus, pick_core};

/// Drive the preemption trial protocol with ordinary threads.
///
/// Without real-time classes the yield order is up to the kernel, so trials
/// may interleave badly; the plumbing must still produce a full trace and a
/// report.
#[test]
fn test_trial_plumbing_without_privilege() {
    const TRIALS: usize = 50;
    const WARMUPS: u32 = 2;

    let (leader, follower) = Rendezvous::pair();

    let spawn = |rendezvous: Rendezvous, participant: usize| {
        std::thread::spawn(move || {
            let mut trace = ThreadTrace::new(participant, TRIALS, WARMUPS);
            for _ in 0..WARMUPS {
                trace.record_warmup(MonotonicTimestamp::now());
                std::thread::yield_now();
            }
            for _ in 0..TRIALS {
                rendezvous.await_start();
                let measure = MonotonicTimestamp::now();
                std::thread::yield_now();
                let debug = MonotonicTimestamp::now();
                std::thread::yield_now();
                rendezvous.await_end();
                trace.record_trial(measure, debug);
            }
            trace
        })
    };

    let first = spawn(leader, 0);
    let second = spawn(follower, 1);
    let arena =
        TrialArena::from_traces(first.join().unwrap(), second.join().unwrap()).unwrap();

    assert_eq!(arena.trial_count(), TRIALS);
    assert_eq!(arena.trace(0).warmup_points().len(), WARMUPS as usize);

    let series = arena.cost_series();
    assert_eq!(series.len(), TRIALS);
    let report = ExperimentReport::from_series(&series).unwrap();
    assert!(report.min_ns <= report.max_ns);
}

#[test]
fn test_preemption_degrades_to_rt_error_without_privilege() {
    let mut config = BenchConfig::default();
    config.trials = 2;
    config.preemption.core = pick_core();

    match run_preemption(&config) {
        // Privileged hosts run the real experiment.
        Ok(outcome) => assert_eq!(outcome.series.len(), 2),
        Err(Error::Rt(_)) => {}
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_migration_degrades_to_rt_error_without_privilege() {
    if num_cpus() < 2 {
        eprintln!("Skipping test: single-CPU host");
        return;
    }

    let mut config = BenchConfig::default();
    config.trials = 2;
    let (initial, final_core) = measurement_cores();
    config.migration.initial_core = initial;
    config.migration.final_core = final_core;

    match run_migration(&config) {
        Ok(outcome) => assert_eq!(outcome.series.len(), 2),
        Err(Error::Rt(_)) => {}
        // Lost the core race on a busy host.
        Err(Error::Corrupted { .. }) => {}
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_cache_fill_degrades_to_rt_error_without_privilege() {
    let mut config = BenchConfig::default();
    config.trials = 3;
    config.cache_fill.core = pick_core();
    config.cache_fill.l2_size_bytes = 64 * 1024;

    match run_cache_fill(&config) {
        Ok(outcome) => assert_eq!(outcome.series.len(), 3),
        Err(Error::Rt(_)) => {}
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_interference_degrades_to_rt_error_without_privilege() {
    let mut config = BenchConfig::default();
    config.interference.core = pick_core();
    config.interference.iterations = 200_000;

    let workload = PolynomialWorkload::new();
    match run_interference(&config, &workload) {
        Ok(outcome) => {
            assert_eq!(outcome.iterations, 200_000);
            assert!(outcome.usage.user_micros < 1_000_000);
        }
        Err(Error::Rt(_)) => {}
        Err(other) => panic!("unexpected error: {other}"),
    }
}

#[test]
#[ignore = "Requires root and real-time scheduling"]
fn test_preemption_full_run() {
    if let Err(e) = check_rt_prerequisites() {
        eprintln!("Skipping test: {}", e);
        return;
    }

    let mut config = BenchConfig::default();
    config.trials = 50;
    config.preemption.core = pick_core();

    let outcome = run_preemption(&config).expect("preemption run failed");
    assert_eq!(outcome.series.len(), 50);
    assert_eq!(outcome.arena.trial_count(), 50);
    assert_eq!(outcome.arena.trace(0).warmup_points().len(), 3);

    println!(
        "preemption: min={} ns avg={} ns max={} ns ({} corrupt trials)",
        outcome.report.min_ns,
        outcome.report.avg_ns,
        outcome.report.max_ns,
        outcome.corrupt_trials.len()
    );
}

#[test]
#[ignore = "Requires root and real-time scheduling"]
fn test_migration_full_run() {
    if let Err(e) = check_rt_prerequisites() {
        eprintln!("Skipping test: {}", e);
        return;
    }

    let mut config = BenchConfig::default();
    config.trials = 50;
    let (initial, final_core) = measurement_cores();
    config.migration.initial_core = initial;
    config.migration.final_core = final_core;

    let outcome = run_migration(&config).expect("migration run failed");
    assert_eq!(outcome.series.len(), 50);
    assert!(outcome.report.min_ns <= outcome.report.max_ns);

    println!(
        "migration {} -> {}: min={} ns avg={} ns max={} ns",
        initial, final_core, outcome.report.min_ns, outcome.report.avg_ns, outcome.report.max_ns
    );
}

#[test]
#[ignore = "Requires root and real-time scheduling"]
fn test_cache_fill_full_run() {
    if let Err(e) = check_rt_prerequisites() {
        eprintln!("Skipping test: {}", e);
        return;
    }

    let mut config = BenchConfig::default();
    config.trials = 20;
    config.cache_fill.core = pick_core();

    let outcome = run_cache_fill(&config).expect("cache-fill run failed");
    assert_eq!(outcome.series.len(), 20);

    println!(
        "cache fill: min={} ns avg={} ns max={} ns",
        outcome.report.min_ns, outcome.report.avg_ns, outcome.report.max_ns
    );
}

#[test]
#[ignore = "Requires root and real-time scheduling"]
fn test_interference_contended_full_run() {
    if let Err(e) = check_rt_prerequisites() {
        eprintln!("Skipping test: {}", e);
        return;
    }

    let mut config = BenchConfig::default();
    config.interference.core = pick_core();
    config.interference.iterations = 10_000_000;
    config.interference.contended = true;

    let workload = PolynomialWorkload::new();
    let outcome = run_interference(&config, &workload).expect("interference run failed");
    assert!(outcome.contended);
    assert_eq!(outcome.iterations, 10_000_000);

    println!(
        "interference: user {} s {} us, {} voluntary / {} involuntary switches",
        outcome.usage.user_secs,
        outcome.usage.user_micros,
        outcome.usage.voluntary_switches,
        outcome.usage.involuntary_switches
    );
}
