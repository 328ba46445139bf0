//! Countdown latch.

use crate::driver::LoopDriver;
use crate::error::TimedOut;
use crate::sync::Promise;
use crate::tracing_compat::debug;
use crate::wait::Await;
use parking_lot::Mutex;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

struct LatchInner {
    count: u64,
    initial: u64,
    signal: Promise<(), Infallible>,
}

/// Releases waiters once a fixed number of completions have occurred.
///
/// The latch owns a counter and a single-fire completion signal. Each
/// [`count_down`](Self::count_down) decrements the counter; the crossing to
/// exactly zero completes the signal, which [`wait`](Self::wait) awaits
/// through the blocking waiter. Counting down past zero is a no-op.
///
/// Clones share the same counter, so handlers scheduled on the loop can
/// count the latch down while the caller waits on it.
///
/// # Example
///
/// ```
/// use awaitlab::{CountdownLatch, ManagedLoop};
/// use std::time::Duration;
///
/// let lab = ManagedLoop::new();
/// lab.manage();
///
/// let latch = CountdownLatch::new(lab.driver(), 2);
/// for _ in 0..2 {
///     let latch = latch.clone();
///     lab.adapter().schedule_once(Duration::from_millis(10), move || {
///         latch.count_down();
///     });
/// }
///
/// assert!(latch.wait(Duration::from_millis(100)).is_ok());
/// ```
pub struct CountdownLatch {
    driver: LoopDriver,
    inner: Arc<Mutex<LatchInner>>,
}

impl CountdownLatch {
    /// Creates a latch requiring `count` completions.
    ///
    /// A zero-count latch is born open: its signal completes immediately.
    #[must_use]
    pub fn new(driver: LoopDriver, count: u64) -> Self {
        let signal = Promise::new();
        if count == 0 {
            signal.complete(());
        }
        Self {
            driver,
            inner: Arc::new(Mutex::new(LatchInner {
                count,
                initial: count,
                signal,
            })),
        }
    }

    /// Records one completion.
    ///
    /// The decrement that reaches zero completes the signal, releasing
    /// every waiter. Further calls are no-ops until [`reset`](Self::reset).
    pub fn count_down(&self) {
        let opened = {
            let mut inner = self.inner.lock();
            if inner.count == 0 {
                None
            } else {
                inner.count -= 1;
                (inner.count == 0).then(|| inner.signal.clone())
            }
        };
        if let Some(signal) = opened {
            signal.complete(());
            debug!("latch opened");
        }
    }

    /// Current counter value, non-blocking.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.inner.lock().count
    }

    /// Restores the counter to its initial value and installs a fresh
    /// completion signal.
    ///
    /// A fired signal cannot be un-fired, so reuse without a fresh signal
    /// would let post-reset waiters observe a moot completion; each
    /// [`wait`](Self::wait) snapshots whichever signal is current.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.count = inner.initial;
        inner.signal = Promise::new();
        if inner.initial == 0 {
            inner.signal.complete(());
        }
        debug!(count = inner.initial, "latch reset");
    }

    /// Waits for the latch to open, driving the loop for at most `timeout`.
    ///
    /// Returns immediately when the counter already reached zero. On
    /// timeout the error carries the elapsed duration; callers wanting the
    /// plain boolean use `wait(..).is_ok()`.
    pub fn wait(&self, timeout: Duration) -> Result<(), TimedOut> {
        let signal = self.inner.lock().signal.clone();
        Await::ready(&self.driver, &signal, timeout)
    }
}

impl Clone for CountdownLatch {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for CountdownLatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CountdownLatch")
            .field("count", &inner.count)
            .field("initial", &inner.initial)
            .finish()
    }
}
