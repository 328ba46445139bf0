//! Blocking waiter.
//!
//! [`Await`] resolves an asynchronous value synchronously by cooperatively
//! driving a loop: raise blocking depth, tick until the value settles or
//! the deadline passes, restore depth. "Blocking" is a polling loop on the
//! caller's own thread — due handlers run inside each tick, which is what
//! lets the awaited value make progress at all.

use crate::driver::LoopDriver;
use crate::error::{TimedOut, WaitError};
use crate::tracing_compat::{debug, trace};
use std::time::Duration;

/// An asynchronous value whose state can be inspected without blocking.
///
/// At any instant the value is pending, succeeded, or failed, and the
/// pending → settled transition happens at most once, from code outside
/// the waiter (typically a fired event handler).
pub trait Observable {
    /// Value produced on success.
    type Output;
    /// Cause carried on failure.
    type Error;

    /// Returns true once the value has settled, either way.
    fn is_settled(&self) -> bool;

    /// Takes the settled outcome, if any.
    ///
    /// Returns `None` while pending. Implementations may hand the outcome
    /// out only once; [`Await::result`] calls this at most once per wait.
    fn try_take(&self) -> Option<Result<Self::Output, Self::Error>>;
}

/// Restores non-blocking mode on every exit path, including panics from
/// fired handlers.
struct BlockingGuard<'a> {
    driver: &'a LoopDriver,
}

impl<'a> BlockingGuard<'a> {
    fn enter(driver: &'a LoopDriver) -> Self {
        driver.set_blocking();
        Self { driver }
    }
}

impl Drop for BlockingGuard<'_> {
    fn drop(&mut self) {
        self.driver.reset_blocking();
    }
}

/// Synchronous resolution of [`Observable`] values.
///
/// Handlers fired during a wait may start nested waits; the blocking depth
/// nests and only the outermost wait touches host-hook state.
#[derive(Debug, Clone, Copy)]
pub struct Await;

impl Await {
    /// Drives the loop until `value` settles or `timeout` elapses, and
    /// extracts the outcome.
    ///
    /// Returns the success value, [`WaitError::Failed`] with the original
    /// cause if the value settled to a failure, or [`WaitError::TimedOut`]
    /// carrying the elapsed duration (always ≥ `timeout`) if the deadline
    /// passed first.
    pub fn result<W: Observable>(
        driver: &LoopDriver,
        value: &W,
        timeout: Duration,
    ) -> Result<W::Output, WaitError<W::Error>> {
        let started = driver.now();
        let deadline = started + timeout;
        trace!(timeout = ?timeout, "blocking wait started");
        let _guard = BlockingGuard::enter(driver);
        loop {
            let now = driver.tick();
            if now > deadline {
                let elapsed = now.duration_since(started);
                debug!(elapsed = ?elapsed, "blocking wait timed out");
                return Err(TimedOut { elapsed }.into());
            }
            match value.try_take() {
                Some(Ok(output)) => return Ok(output),
                Some(Err(cause)) => return Err(WaitError::Failed(cause)),
                None => {}
            }
        }
    }

    /// Drives the loop until `value` settles or `timeout` elapses, without
    /// extracting anything.
    ///
    /// Use this when only completion matters; the value is left settled for
    /// a later [`result`](Self::result) or direct inspection.
    pub fn ready<W: Observable>(
        driver: &LoopDriver,
        value: &W,
        timeout: Duration,
    ) -> Result<(), TimedOut> {
        let started = driver.now();
        let deadline = started + timeout;
        trace!(timeout = ?timeout, "readiness wait started");
        let _guard = BlockingGuard::enter(driver);
        loop {
            let now = driver.tick();
            if now > deadline {
                let elapsed = now.duration_since(started);
                debug!(elapsed = ?elapsed, "readiness wait timed out");
                return Err(TimedOut { elapsed });
            }
            if value.is_settled() {
                return Ok(());
            }
        }
    }
}
