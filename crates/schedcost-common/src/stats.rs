//! Trial collection and summary reduction.
//!
//! Experiments append one signed nanosecond cost per trial to a
//! [`TrialSeries`]; once the run completes, the series is reduced to an
//! [`ExperimentReport`] carrying the count, extrema and truncated mean.

use serde::Serialize;

/// An append-only sequence of per-trial costs, in signed nanoseconds.
///
/// Negative entries are legal: a cache-refill delta can come out negative
/// on hosts where the eviction path is a no-op, and the reducer must not
/// hide that.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrialSeries {
    costs_ns: Vec<i64>,
}

impl TrialSeries {
    /// Create an empty series with room for `trials` entries.
    #[must_use]
    pub fn with_trials(trials: usize) -> Self {
        Self {
            costs_ns: Vec::with_capacity(trials),
        }
    }

    /// Append one trial cost.
    pub fn record(&mut self, cost_ns: i64) {
        self.costs_ns.push(cost_ns);
    }

    /// All recorded costs, in trial order.
    #[must_use]
    pub fn values(&self) -> &[i64] {
        &self.costs_ns
    }

    /// Number of recorded trials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.costs_ns.len()
    }

    /// Whether no trial has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.costs_ns.is_empty()
    }
}

impl Extend<i64> for TrialSeries {
    fn extend<T: IntoIterator<Item = i64>>(&mut self, iter: T) {
        self.costs_ns.extend(iter);
    }
}

/// Summary statistics over one completed experiment run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExperimentReport {
    /// Number of trials that contributed to the statistics.
    pub trial_count: usize,
    /// Smallest observed cost, in nanoseconds.
    pub min_ns: i64,
    /// Largest observed cost, in nanoseconds.
    pub max_ns: i64,
    /// Mean cost in nanoseconds, truncated toward zero.
    pub avg_ns: i64,
}

impl ExperimentReport {
    /// Reduce a series to its summary, or `None` for an empty series.
    ///
    /// The sum wraps on overflow. Keeping `trial_count * |cost|` inside
    /// `i64` is the caller's obligation; a wrapped average is documented
    /// behavior, not an error.
    #[must_use]
    pub fn from_series(series: &TrialSeries) -> Option<Self> {
        let values = series.values();
        let first = *values.first()?;

        let mut min_ns = first;
        let mut max_ns = first;
        let mut sum_ns: i64 = 0;
        for &cost in values {
            min_ns = min_ns.min(cost);
            max_ns = max_ns.max(cost);
            sum_ns = sum_ns.wrapping_add(cost);
        }

        Some(Self {
            trial_count: values.len(),
            min_ns,
            max_ns,
            avg_ns: sum_ns / values.len() as i64,
        })
    }
}
