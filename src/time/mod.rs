//! Time sources for the managed loop.
//!
//! The loop samples time through the [`TimeSource`] trait, which lets the
//! same driver run against monotonic host time ([`WallClock`]) or
//! poll-advanced virtual time ([`VirtualClock`]).

use crate::types::Time;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[inline]
fn duration_to_nanos_saturating(duration: Duration) -> u64 {
    duration.as_nanos().min(u128::from(u64::MAX)) as u64
}

/// Time source abstraction for sampling the current time.
pub trait TimeSource: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Time;
}

/// Monotonic host clock.
///
/// Uses `std::time::Instant` internally; the epoch is the moment this source
/// was created. Suitable when the harness polls real time instead of
/// modelling it.
#[derive(Debug)]
pub struct WallClock {
    epoch: std::time::Instant,
}

impl WallClock {
    /// Creates a wall clock anchored at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for WallClock {
    fn now(&self) -> Time {
        Time::from_nanos(duration_to_nanos_saturating(self.epoch.elapsed()))
    }
}

/// Virtual time source.
///
/// Time advances only when told to, either manually through
/// [`advance`](Self::advance) or by the driver's tick quantum. This is what
/// makes wait loops deterministic: the same tick sequence observes the same
/// timestamps.
///
/// # Example
///
/// ```
/// use awaitlab::time::{TimeSource, VirtualClock};
/// use awaitlab::types::Time;
/// use std::time::Duration;
///
/// let clock = VirtualClock::new();
/// assert_eq!(clock.now(), Time::ZERO);
///
/// clock.advance(Duration::from_secs(1));
/// assert_eq!(clock.now(), Time::from_secs(1));
/// ```
#[derive(Debug, Default)]
pub struct VirtualClock {
    now: AtomicU64,
}

impl VirtualClock {
    /// Creates a virtual clock starting at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: AtomicU64::new(0),
        }
    }

    /// Creates a virtual clock starting at the given time.
    #[must_use]
    pub fn starting_at(time: Time) -> Self {
        Self {
            now: AtomicU64::new(time.as_nanos()),
        }
    }

    /// Advances time by the given duration.
    pub fn advance(&self, by: Duration) {
        self.now
            .fetch_add(duration_to_nanos_saturating(by), Ordering::AcqRel);
    }

    /// Advances time to the given absolute time.
    ///
    /// A target in the past is a no-op; virtual time never moves backwards.
    pub fn advance_to(&self, time: Time) {
        self.now.fetch_max(time.as_nanos(), Ordering::AcqRel);
    }

    /// Sets the current time (for testing).
    pub fn set(&self, time: Time) {
        self.now.store(time.as_nanos(), Ordering::Release);
    }
}

impl TimeSource for VirtualClock {
    fn now(&self) -> Time {
        Time::from_nanos(self.now.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_clock_starts_at_zero() {
        let clock = VirtualClock::new();
        assert_eq!(clock.now(), Time::ZERO);
    }

    #[test]
    fn advance_accumulates() {
        let clock = VirtualClock::new();
        clock.advance(Duration::from_millis(3));
        clock.advance(Duration::from_millis(4));
        assert_eq!(clock.now(), Time::from_millis(7));
    }

    #[test]
    fn advance_to_never_regresses() {
        let clock = VirtualClock::starting_at(Time::from_millis(100));
        clock.advance_to(Time::from_millis(40));
        assert_eq!(clock.now(), Time::from_millis(100));
        clock.advance_to(Time::from_millis(140));
        assert_eq!(clock.now(), Time::from_millis(140));
    }

    #[test]
    fn wall_clock_is_monotonic() {
        let clock = WallClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
