//! Stopwatch abstraction used to time computations and stamp entries.
//!
//! Caches never read the wall clock directly. They ask a [`Stopwatch`] for the
//! time elapsed since the stopwatch started, which keeps timestamps monotonic
//! and lets tests substitute a [`ManualStopwatch`].

use core::fmt;
use core::time::Duration;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source of monotonically increasing timestamps.
///
/// Timestamps are durations since an arbitrary, per-stopwatch origin. Only
/// differences and ordering between timestamps from the same stopwatch are
/// meaningful.
pub trait Stopwatch: Send + Sync {
    /// Returns the time elapsed since this stopwatch's origin.
    fn elapsed(&self) -> Duration;
}

/// Default stopwatch backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct MonotonicStopwatch {
    origin: Instant,
}

impl MonotonicStopwatch {
    /// Starts a new stopwatch at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicStopwatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Stopwatch for MonotonicStopwatch {
    #[inline]
    fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Stopwatch that only moves when told to.
///
/// Useful for deterministic tests of time-based ranking.
///
/// ```
/// use memo_cache::clock::{ManualStopwatch, Stopwatch};
/// use core::time::Duration;
///
/// let clock = ManualStopwatch::new();
/// assert_eq!(clock.elapsed(), Duration::ZERO);
/// clock.advance(Duration::from_millis(5));
/// assert_eq!(clock.elapsed(), Duration::from_millis(5));
/// ```
#[derive(Default)]
pub struct ManualStopwatch {
    nanos: AtomicU64,
}

impl ManualStopwatch {
    /// Creates a stopwatch reading zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the stopwatch forward by `by`.
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(duration_nanos(by), Ordering::Relaxed);
    }
}

impl Stopwatch for ManualStopwatch {
    #[inline]
    fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::Relaxed))
    }
}

impl fmt::Debug for ManualStopwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualStopwatch")
            .field("elapsed", &self.elapsed())
            .finish()
    }
}

/// Saturating conversion of a duration to whole nanoseconds.
#[inline]
pub(crate) fn duration_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}
