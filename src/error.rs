//! Error types for blocking waits.

use std::time::Duration;
use thiserror::Error;

/// The deadline passed before the awaited value settled.
///
/// Carries the duration actually elapsed inside the wait loop, which is
/// always at least the requested timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("timed out after {elapsed:?} while awaiting settlement")]
pub struct TimedOut {
    /// Time spent in the wait loop before giving up.
    pub elapsed: Duration,
}

/// Outcome of [`Await::result`](crate::wait::Await::result) short of success.
///
/// Replaces the thrown-exception signaling of exception-based runtimes with
/// a matchable result: the awaited value either never settled in time or
/// settled to a failure, whose original cause is carried directly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WaitError<E> {
    /// The deadline passed while the value was still pending.
    #[error(transparent)]
    TimedOut(#[from] TimedOut),
    /// The awaited value settled to a failure.
    #[error("awaited value failed")]
    Failed(E),
}

impl<E> WaitError<E> {
    /// Returns true for the timeout variant.
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }

    /// Elapsed wait duration, when this is a timeout.
    #[must_use]
    pub const fn elapsed(&self) -> Option<Duration> {
        match self {
            Self::TimedOut(timed_out) => Some(timed_out.elapsed),
            Self::Failed(_) => None,
        }
    }

    /// The propagated cause, when the awaited value failed.
    pub fn into_cause(self) -> Option<E> {
        match self {
            Self::TimedOut(_) => None,
            Self::Failed(cause) => Some(cause),
        }
    }
}
