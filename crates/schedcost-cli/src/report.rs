//! Fixed-format report rendering.
//!
//! Every byte printed on stdout comes from this module. The result block and
//! the trace dump reproduce the historical report format so existing parsing
//! scripts keep working; diagnostics belong on stderr via `tracing` instead.

use std::fmt::Write;

use schedcost_common::{ExperimentKind, ExperimentReport, MonotonicTimestamp};
use schedcost_harness::experiments::UsageDelta;
use schedcost_harness::TrialArena;

/// Render the result block for a completed run.
///
/// The trailing space after "Experiment result:" is part of the historical
/// format and must stay.
#[must_use]
pub fn format_report(kind: ExperimentKind, report: &ExperimentReport) -> String {
    let label = cost_label(kind);
    format!(
        "Experiment result: \n\
         \tNumber of experiments: {}\n\
         \tMinimum cost of {label}: {} ns\n\
         \tMaximum cost of {label}: {} ns\n\
         \tAverage cost of {label}: {} ns\n",
        report.trial_count, report.min_ns, report.max_ns, report.avg_ns
    )
}

fn cost_label(kind: ExperimentKind) -> &'static str {
    match kind {
        ExperimentKind::Preemption => "preemption",
        ExperimentKind::Migration => "migration",
        ExperimentKind::CacheFill => "fill half l2 cache",
        ExperimentKind::Interference => "interference",
    }
}

/// Render the per-thread timestamp trace of a preemption run.
///
/// When `corrupt_trial` names an offender the "Test with error" header comes
/// first. All recorded trials are printed, not just the offender, so ordering
/// problems can be inspected across the whole run. Warm-up rounds get their
/// own blocks at the end when any were recorded.
#[must_use]
pub fn format_preemption_trace(arena: &TrialArena, corrupt_trial: Option<usize>) -> String {
    let mut out = String::new();
    if let Some(trial) = corrupt_trial {
        let _ = writeln!(out, "Test with error {trial}");
    }
    for participant in 0..2 {
        let _ = writeln!(out, "Preemption points:\n\tThread {}:", participant + 1);
        append_points(&mut out, arena.trace(participant).measure_points());
    }
    for participant in 0..2 {
        let _ = writeln!(out, "Debug points:\n\tThread {}:", participant + 1);
        append_points(&mut out, arena.trace(participant).debug_points());
    }
    if !arena.trace(0).warmup_points().is_empty() {
        for participant in 0..2 {
            let _ = writeln!(out, "Warm-up points:\n\tThread {}:", participant + 1);
            append_points(&mut out, arena.trace(participant).warmup_points());
        }
    }
    out
}

fn append_points(out: &mut String, points: &[MonotonicTimestamp]) {
    for (index, point) in points.iter().enumerate() {
        let _ = writeln!(
            out,
            "\t\tPoint {index}: {} s and {} ns",
            point.secs(),
            point.subsec_nanos()
        );
    }
}

/// Render one CSV record of interference accounting: user time split into
/// whole seconds and microseconds, then voluntary and involuntary context
/// switch counts.
#[must_use]
pub fn format_interference_csv(usage: &UsageDelta) -> String {
    format!(
        "{}, {}, {}, {}\n",
        usage.user_secs, usage.user_micros, usage.voluntary_switches, usage.involuntary_switches
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use schedcost_common::TrialSeries;
    use schedcost_harness::ThreadTrace;

    fn ts(secs: i64, nanos: i64) -> MonotonicTimestamp {
        MonotonicTimestamp::from_parts(secs, nanos)
    }

    fn two_trial_arena() -> TrialArena {
        let mut first = ThreadTrace::new(0, 2, 0);
        let mut second = ThreadTrace::new(1, 2, 0);
        first.record_trial(ts(0, 100), ts(0, 400));
        second.record_trial(ts(0, 200), ts(0, 300));
        first.record_trial(ts(1, 100), ts(1, 400));
        second.record_trial(ts(1, 200), ts(1, 300));
        TrialArena::from_traces(first, second).unwrap()
    }

    #[test]
    fn test_report_block_is_byte_exact() {
        let mut series = TrialSeries::default();
        series.extend([100, 250, 175, 400, 50]);
        let report = ExperimentReport::from_series(&series).unwrap();

        let rendered = format_report(ExperimentKind::Preemption, &report);
        assert_eq!(
            rendered,
            "Experiment result: \n\
             \tNumber of experiments: 5\n\
             \tMinimum cost of preemption: 50 ns\n\
             \tMaximum cost of preemption: 400 ns\n\
             \tAverage cost of preemption: 195 ns\n"
        );
    }

    #[test]
    fn test_report_labels_per_experiment() {
        let report = ExperimentReport {
            trial_count: 1,
            min_ns: -30,
            max_ns: -30,
            avg_ns: -30,
        };
        let migration = format_report(ExperimentKind::Migration, &report);
        assert!(migration.contains("Minimum cost of migration: -30 ns"));

        let cache = format_report(ExperimentKind::CacheFill, &report);
        assert!(cache.contains("Average cost of fill half l2 cache: -30 ns"));
    }

    #[test]
    fn test_trace_dump_block_order() {
        let arena = two_trial_arena();
        let rendered = format_preemption_trace(&arena, Some(1));

        assert!(rendered.starts_with("Test with error 1\n"));
        let preemption_one = rendered.find("Preemption points:\n\tThread 1:").unwrap();
        let preemption_two = rendered.find("Preemption points:\n\tThread 2:").unwrap();
        let debug_one = rendered.find("Debug points:\n\tThread 1:").unwrap();
        let debug_two = rendered.find("Debug points:\n\tThread 2:").unwrap();
        assert!(preemption_one < preemption_two);
        assert!(preemption_two < debug_one);
        assert!(debug_one < debug_two);
    }

    #[test]
    fn test_trace_dump_point_lines() {
        let arena = two_trial_arena();
        let rendered = format_preemption_trace(&arena, None);

        assert!(!rendered.contains("Test with error"));
        assert!(rendered.contains("\t\tPoint 0: 0 s and 100 ns\n"));
        assert!(rendered.contains("\t\tPoint 1: 1 s and 100 ns\n"));
        // No warm-up rounds were recorded, so no warm-up blocks.
        assert!(!rendered.contains("Warm-up points:"));
    }

    #[test]
    fn test_trace_dump_includes_warmups_when_recorded() {
        let mut first = ThreadTrace::new(0, 1, 1);
        let mut second = ThreadTrace::new(1, 1, 1);
        first.record_warmup(ts(0, 10));
        second.record_warmup(ts(0, 20));
        first.record_trial(ts(0, 100), ts(0, 400));
        second.record_trial(ts(0, 200), ts(0, 300));
        let arena = TrialArena::from_traces(first, second).unwrap();

        let rendered = format_preemption_trace(&arena, None);
        assert!(rendered.contains("Warm-up points:\n\tThread 1:\n\t\tPoint 0: 0 s and 10 ns\n"));
        assert!(rendered.contains("Warm-up points:\n\tThread 2:\n\t\tPoint 0: 0 s and 20 ns\n"));
    }

    #[test]
    fn test_interference_csv_line() {
        let usage = UsageDelta {
            user_secs: 1,
            user_micros: 250_000,
            system_secs: 0,
            system_micros: 0,
            voluntary_switches: 12,
            involuntary_switches: 3,
        };
        assert_eq!(format_interference_csv(&usage), "1, 250000, 12, 3\n");
    }
}
