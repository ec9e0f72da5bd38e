//! Injectable time sources.
//!
//! The cache reads the clock when it allocates a buffer, on every append, and
//! when it checks whether a time-bound buffer has expired. Production code uses
//! [`SystemClock`]; tests and replays drive a [`ManualClock`] so time-bound
//! rotation is deterministic.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use crate::telem::TimeStamp;

/// A source of the current time.
///
/// Any `Fn() -> TimeStamp + Send + Sync` closure is a clock.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> TimeStamp;
}

impl<F> Clock for F
where
    F: Fn() -> TimeStamp + Send + Sync,
{
    fn now(&self) -> TimeStamp {
        self()
    }
}

/// Wall-clock time from the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> TimeStamp {
        TimeStamp::now()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same instant, so a test can keep one handle and give
/// another to the cache.
///
/// # Examples
///
/// ```rust
/// use livetail::clock::{Clock, ManualClock};
/// use livetail::TimeStamp;
/// use std::time::Duration;
///
/// let clock = ManualClock::new(TimeStamp::from_millis(1_000));
/// let shared = clock.clone();
/// clock.advance(Duration::from_millis(250));
/// assert_eq!(shared.now(), TimeStamp::from_millis(1_250));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicI64>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: TimeStamp) -> Self {
        Self {
            nanos: Arc::new(AtomicI64::new(start.nanos())),
        }
    }

    /// Moves the clock to `ts`.
    pub fn set(&self, ts: TimeStamp) {
        self.nanos.store(ts.nanos(), Ordering::SeqCst);
    }

    /// Moves the clock forward by `span`.
    pub fn advance(&self, span: Duration) {
        let next = self.now().saturating_add(span);
        self.set(next);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> TimeStamp {
        TimeStamp::new(self.nanos.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_set_and_advance() {
        let clock = ManualClock::new(TimeStamp::ZERO);
        assert_eq!(clock.now(), TimeStamp::ZERO);

        clock.advance(Duration::from_nanos(5));
        assert_eq!(clock.now(), TimeStamp::new(5));

        clock.set(TimeStamp::new(100));
        assert_eq!(clock.now(), TimeStamp::new(100));
    }

    #[test]
    fn test_closure_is_a_clock() {
        let clock: Arc<dyn Clock> = Arc::new(|| TimeStamp::new(42));
        assert_eq!(clock.now(), TimeStamp::new(42));
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
