//! Monotonic timestamps and signed time deltas.
//!
//! All measurements in the harness are differences between two readings of
//! `CLOCK_MONOTONIC`, a clock that never runs backward and is immune to
//! wall-clock adjustments. Timestamps are captured fresh at each measurement
//! point and never persisted; only the reduced deltas outlive an experiment.

use std::fmt;

/// Nanoseconds per second, the normalization base for [`TimeDelta`].
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// An opaque instant read from `CLOCK_MONOTONIC`.
///
/// Comparison follows chronological order (seconds first, then the
/// sub-second component).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonotonicTimestamp {
    secs: i64,
    nanos: i64,
}

impl MonotonicTimestamp {
    /// Capture the current monotonic clock reading.
    ///
    /// This is called inside measured windows, so it does no allocation and
    /// no error plumbing: `clock_gettime(CLOCK_MONOTONIC)` cannot fail for a
    /// valid clock id and out pointer (POSIX only specifies EINVAL/EFAULT).
    #[must_use]
    pub fn now() -> Self {
        let mut ts = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: ts is valid for writes and CLOCK_MONOTONIC is a valid
        // clock id on every supported platform.
        let ret = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts) };
        debug_assert_eq!(ret, 0, "clock_gettime(CLOCK_MONOTONIC) failed");
        Self {
            secs: i64::from(ts.tv_sec),
            nanos: i64::from(ts.tv_nsec),
        }
    }

    /// Build a timestamp from raw second/nanosecond components.
    ///
    /// `nanos` must already be normalized (`0 <= nanos < 1_000_000_000`).
    #[must_use]
    pub fn from_parts(secs: i64, nanos: i64) -> Self {
        debug_assert!((0..NANOS_PER_SEC).contains(&nanos));
        Self { secs, nanos }
    }

    /// Whole-second component of the reading.
    #[must_use]
    pub fn secs(&self) -> i64 {
        self.secs
    }

    /// Sub-second component of the reading, in nanoseconds.
    #[must_use]
    pub fn subsec_nanos(&self) -> i64 {
        self.nanos
    }
}

/// A signed duration `end - start` with an explicit sign flag and a
/// normalized magnitude.
///
/// Invariant: `0 <= subsec_nanos() < 1_000_000_000` and `secs() >= 0`
/// regardless of sign. Whenever the sub-second subtraction would go
/// negative, one whole second is borrowed into the second component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeDelta {
    positive: bool,
    secs: i64,
    nanos: u32,
}

impl TimeDelta {
    /// Compute `end - start` as a signed, normalized delta.
    ///
    /// The sign is positive iff `end` is chronologically at or after
    /// `start`; a zero-length delta is positive.
    #[must_use]
    pub fn between(start: MonotonicTimestamp, end: MonotonicTimestamp) -> Self {
        let positive = end >= start;
        let (later, earlier) = if positive { (end, start) } else { (start, end) };

        let mut secs = later.secs - earlier.secs;
        let mut nanos = later.nanos - earlier.nanos;
        if nanos < 0 {
            nanos += NANOS_PER_SEC;
            secs -= 1;
        }

        Self {
            positive,
            secs,
            nanos: nanos as u32,
        }
    }

    /// Whether the delta is non-negative (`end >= start`).
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.positive
    }

    /// Magnitude of the whole-second component.
    #[must_use]
    pub fn secs(&self) -> i64 {
        self.secs
    }

    /// Magnitude of the sub-second component, in nanoseconds.
    #[must_use]
    pub fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    /// The delta with its sign inverted and the magnitude unchanged.
    #[must_use]
    pub fn negated(&self) -> Self {
        Self {
            positive: !self.positive,
            ..*self
        }
    }

    /// Collapse the delta into a single signed nanosecond count.
    ///
    /// Overflows `i64` only for magnitudes beyond roughly 292 years, far
    /// outside anything a scheduler measurement can produce.
    #[must_use]
    pub fn as_signed_nanos(&self) -> i64 {
        let magnitude = self.secs * NANOS_PER_SEC + i64::from(self.nanos);
        if self.positive {
            magnitude
        } else {
            -magnitude
        }
    }
}

impl fmt::Display for TimeDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ns", self.as_signed_nanos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(secs: i64, nanos: i64) -> MonotonicTimestamp {
        MonotonicTimestamp::from_parts(secs, nanos)
    }

    #[test]
    fn test_forward_delta_is_positive() {
        let d = TimeDelta::between(ts(10, 500), ts(12, 700));
        assert!(d.is_positive());
        assert_eq!(d.secs(), 2);
        assert_eq!(d.subsec_nanos(), 200);
        assert_eq!(d.as_signed_nanos(), 2 * NANOS_PER_SEC + 200);
    }

    #[test]
    fn test_backward_delta_is_negative() {
        let d = TimeDelta::between(ts(12, 700), ts(10, 500));
        assert!(!d.is_positive());
        assert_eq!(d.secs(), 2);
        assert_eq!(d.subsec_nanos(), 200);
        assert_eq!(d.as_signed_nanos(), -(2 * NANOS_PER_SEC + 200));
    }

    #[test]
    fn test_nanosecond_borrow() {
        // 11.000000100 - 10.999999900 = 0.000000200: the sub-second
        // subtraction goes negative and borrows one second.
        let d = TimeDelta::between(ts(10, 999_999_900), ts(11, 100));
        assert!(d.is_positive());
        assert_eq!(d.secs(), 0);
        assert_eq!(d.subsec_nanos(), 200);
    }

    #[test]
    fn test_nanos_always_normalized() {
        let cases = [
            (ts(0, 0), ts(0, 0)),
            (ts(5, 1), ts(5, 0)),
            (ts(5, 0), ts(5, 1)),
            (ts(3, 999_999_999), ts(4, 0)),
            (ts(4, 0), ts(3, 999_999_999)),
            (ts(100, 123), ts(7, 999_999_999)),
        ];
        for (start, end) in cases {
            let d = TimeDelta::between(start, end);
            assert!(i64::from(d.subsec_nanos()) < NANOS_PER_SEC);
            assert!(d.secs() >= 0);
        }
    }

    #[test]
    fn test_zero_delta_counts_as_positive() {
        let d = TimeDelta::between(ts(42, 42), ts(42, 42));
        assert!(d.is_positive());
        assert_eq!(d.as_signed_nanos(), 0);
    }

    #[test]
    fn test_negation_symmetry() {
        let start = ts(10, 300);
        let end = ts(11, 200);
        let forward = TimeDelta::between(start, end);
        let backward = TimeDelta::between(end, start);
        assert_eq!(forward.negated(), backward);
        assert_eq!(forward.as_signed_nanos(), -backward.as_signed_nanos());
        assert_eq!(forward.secs(), backward.secs());
        assert_eq!(forward.subsec_nanos(), backward.subsec_nanos());
    }

    #[test]
    fn test_chronological_ordering() {
        assert!(ts(1, 999_999_999) < ts(2, 0));
        assert!(ts(2, 1) > ts(2, 0));
        assert_eq!(ts(2, 0), ts(2, 0));
    }

    #[test]
    fn test_clock_never_runs_backward() {
        let mut previous = MonotonicTimestamp::now();
        for _ in 0..1_000 {
            let current = MonotonicTimestamp::now();
            assert!(current >= previous);
            assert!(TimeDelta::between(previous, current).is_positive());
            previous = current;
        }
    }

    #[test]
    fn test_elapsed_sleep_is_measurable() {
        let start = MonotonicTimestamp::now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let end = MonotonicTimestamp::now();
        let d = TimeDelta::between(start, end);
        assert!(d.is_positive());
        assert!(d.as_signed_nanos() >= 5_000_000);
    }
}
