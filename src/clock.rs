//! Injectable time source
//!
//! All time-derived state (check-in stamps, frozen wait durations, overdue
//! projections, the session day itself) flows through [`Clock`] so tests can
//! drive the engine deterministically with [`ManualClock`].

use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::Mutex;

/// Source of the current wall-clock time
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;

    /// Calendar day used to key sessions
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Production clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests
///
/// # Examples
///
/// ```
/// use queue_engine::clock::{Clock, ManualClock};
/// use chrono::{Duration, Utc};
///
/// let clock = ManualClock::new(Utc::now());
/// let before = clock.now();
/// clock.advance(Duration::minutes(10));
/// assert_eq!(clock.now() - before, Duration::minutes(10));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    /// Jump to an absolute instant
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
