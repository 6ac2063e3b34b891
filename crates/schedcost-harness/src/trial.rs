//! Per-trial result collection.
//!
//! The preemption experiment's two threads each record timestamps into a
//! private [`ThreadTrace`] and hand it back through their join handle; the
//! controller then assembles both traces into a [`TrialArena`] and derives
//! costs and corruption verdicts from it. Nothing is shared while trials
//! run, so the join is the only ownership-transfer point.
//!
//! Single-threaded experiments use [`TrialRunner`] directly to collect one
//! cost per trial.

use schedcost_common::{Error, MonotonicTimestamp, Result, TimeDelta, TrialSeries};

/// One measurement thread's raw timestamps for a whole run.
#[derive(Debug, Clone)]
pub struct ThreadTrace {
    participant: usize,
    warmup_points: Vec<MonotonicTimestamp>,
    measure_points: Vec<MonotonicTimestamp>,
    debug_points: Vec<MonotonicTimestamp>,
}

impl ThreadTrace {
    /// Empty trace for `participant` (0 or 1), sized for the run.
    #[must_use]
    pub fn new(participant: usize, trials: usize, warmup_rounds: u32) -> Self {
        Self {
            participant,
            warmup_points: Vec::with_capacity(warmup_rounds as usize),
            measure_points: Vec::with_capacity(trials),
            debug_points: Vec::with_capacity(trials),
        }
    }

    /// Record one warm-up round's timestamp.
    pub fn record_warmup(&mut self, point: MonotonicTimestamp) {
        self.warmup_points.push(point);
    }

    /// Record one trial's measure and debug timestamps.
    pub fn record_trial(&mut self, measure: MonotonicTimestamp, debug: MonotonicTimestamp) {
        self.measure_points.push(measure);
        self.debug_points.push(debug);
    }

    /// Which participant this trace belongs to.
    #[must_use]
    pub fn participant(&self) -> usize {
        self.participant
    }

    /// Timestamps captured during warm-up rounds, excluded from statistics.
    #[must_use]
    pub fn warmup_points(&self) -> &[MonotonicTimestamp] {
        &self.warmup_points
    }

    /// Per-trial timestamps taken right before the first voluntary yield.
    #[must_use]
    pub fn measure_points(&self) -> &[MonotonicTimestamp] {
        &self.measure_points
    }

    /// Per-trial timestamps taken after resuming from the first yield.
    #[must_use]
    pub fn debug_points(&self) -> &[MonotonicTimestamp] {
        &self.debug_points
    }
}

/// Both participants' traces for one completed preemption run.
#[derive(Debug, Clone)]
pub struct TrialArena {
    traces: [ThreadTrace; 2],
}

impl TrialArena {
    /// Assemble the arena from two joined traces, in either join order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Thread`] if the traces do not form a participant
    /// 0/1 pair or their lengths disagree; either means a thread died or
    /// skipped trials, and the run cannot be interpreted.
    pub fn from_traces(a: ThreadTrace, b: ThreadTrace) -> Result<Self> {
        let (first, second) = match (a.participant, b.participant) {
            (0, 1) => (a, b),
            (1, 0) => (b, a),
            (x, y) => {
                return Err(Error::Thread(format!(
                    "traces do not form a participant pair: got ids {x} and {y}"
                )))
            }
        };

        for trace in [&first, &second] {
            if trace.measure_points.len() != trace.debug_points.len() {
                return Err(Error::Thread(format!(
                    "participant {} recorded {} measure points but {} debug points",
                    trace.participant,
                    trace.measure_points.len(),
                    trace.debug_points.len()
                )));
            }
        }
        if first.measure_points.len() != second.measure_points.len() {
            return Err(Error::Thread(format!(
                "participants recorded unequal trial counts: {} vs {}",
                first.measure_points.len(),
                second.measure_points.len()
            )));
        }

        Ok(Self {
            traces: [first, second],
        })
    }

    /// Number of recorded trials.
    #[must_use]
    pub fn trial_count(&self) -> usize {
        self.traces[0].measure_points.len()
    }

    /// Full trace of `participant` (0 or 1).
    #[must_use]
    pub fn trace(&self, participant: usize) -> &ThreadTrace {
        &self.traces[participant]
    }

    /// Signed preemption cost of one trial: participant 0's measure point
    /// minus participant 1's.
    ///
    /// The sign records which thread won the race to resume; the magnitude
    /// is the voluntary-preemption latency.
    #[must_use]
    pub fn trial_cost(&self, trial: usize) -> TimeDelta {
        TimeDelta::between(
            self.traces[1].measure_points[trial],
            self.traces[0].measure_points[trial],
        )
    }

    /// Whether one trial's timestamps respect the yield protocol.
    ///
    /// Each participant's measure point must fall strictly before the
    /// peer's debug point: the debug point is only reached after resuming
    /// from the yield that let the peer run its measure point.
    #[must_use]
    pub fn is_clean(&self, trial: usize) -> bool {
        self.traces[0].measure_points[trial] < self.traces[1].debug_points[trial]
            && self.traces[1].measure_points[trial] < self.traces[0].debug_points[trial]
    }

    /// Indices of every trial that violates the yield protocol, in order.
    #[must_use]
    pub fn corrupt_trials(&self) -> Vec<usize> {
        (0..self.trial_count())
            .filter(|&trial| !self.is_clean(trial))
            .collect()
    }

    /// All trial costs as a series, corrupt trials included.
    ///
    /// Filtering is the caller's policy decision, not the arena's.
    #[must_use]
    pub fn cost_series(&self) -> TrialSeries {
        let mut series = TrialSeries::with_trials(self.trial_count());
        for trial in 0..self.trial_count() {
            series.record(self.trial_cost(trial).as_signed_nanos());
        }
        series
    }
}

/// Drives a fixed number of trials for single-threaded experiments.
#[derive(Debug, Clone, Copy)]
pub struct TrialRunner {
    trials: usize,
}

impl TrialRunner {
    /// Runner for `trials` trials.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a zero trial count; the reducer has no
    /// meaningful output for an empty series.
    pub fn new(trials: usize) -> Result<Self> {
        if trials == 0 {
            return Err(Error::Config("trials must be at least 1".into()));
        }
        Ok(Self { trials })
    }

    /// Configured trial count.
    #[must_use]
    pub fn trials(&self) -> usize {
        self.trials
    }

    /// Run every trial in order, collecting one signed cost each.
    ///
    /// The first trial error aborts the run; partial series are never
    /// reduced.
    pub fn collect<F>(&self, mut trial: F) -> Result<TrialSeries>
    where
        F: FnMut(usize) -> Result<i64>,
    {
        let mut series = TrialSeries::with_trials(self.trials);
        for index in 0..self.trials {
            series.record(trial(index)?);
        }
        Ok(series)
    }
}
