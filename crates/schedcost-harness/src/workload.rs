//! CPU-bound workloads for the interference experiment.
//!
//! The experiment measures what the scheduler does around a workload, not
//! the workload itself, so anything that burns a deterministic amount of
//! user time qualifies. Implementations are injectable to keep the harness
//! independent of one specific numeric computation.

use std::hint::black_box;

/// A deterministic consumer of CPU time.
pub trait Workload: Send + Sync {
    /// Burn CPU for `iterations` rounds.
    fn run(&self, iterations: u64);

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// The historical polynomial burner.
///
/// Each round evaluates `3.186 * x^4 + x` in single precision and then
/// resets `x` to 14.0; the reset keeps the value finite over a billion
/// rounds. `black_box` plays the role a volatile variable historically
/// did, keeping the loop from being folded away.
#[derive(Debug, Clone, Copy)]
pub struct PolynomialWorkload {
    seed: f32,
}

impl PolynomialWorkload {
    /// Burner with the historical seed of 14.0.
    #[must_use]
    pub fn new() -> Self {
        Self { seed: 14.0 }
    }
}

impl Default for PolynomialWorkload {
    fn default() -> Self {
        Self::new()
    }
}

impl Workload for PolynomialWorkload {
    fn run(&self, iterations: u64) {
        let mut x = self.seed;
        for _ in 0..iterations {
            x = black_box(3.186_f32 * x * x * x * x + x);
            x = black_box(self.seed);
        }
        black_box(x);
    }

    fn name(&self) -> &'static str {
        "polynomial"
    }
}

/// Minimal busy-spin workload for tests and smoke runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinWorkload;

impl Workload for SpinWorkload {
    fn run(&self, iterations: u64) {
        for round in 0..iterations {
            black_box(round);
        }
    }

    fn name(&self) -> &'static str {
        "spin"
    }
}
