//! Host scheduler interface.
//!
//! The managed loop never owns timer dispatch outright: outside of blocking
//! waits, events are also armed ("globalized") with the host environment's
//! own scheduler so they fire without anyone ticking. That scheduler is
//! abstracted as [`HostTimers`] and injected at construction, which keeps
//! the interception explicit instead of rebinding global entry points.
//!
//! Two implementations ship with the crate:
//!
//! - [`NullHost`]: accepts registrations and never fires them; the pure
//!   virtual-time configuration where every firing goes through `tick()`.
//! - [`ManualHost`]: records armed hooks and lets the caller fire them,
//!   with counters for hook-discipline assertions.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A zero-argument callback armed with a host scheduler.
pub type HostCallback = Arc<dyn Fn() + Send + Sync>;

/// Opaque reference to an armed host timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostHandle(u64);

impl HostHandle {
    /// Wraps a raw handle value.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw handle value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HostHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H{}", self.0)
    }
}

/// The host environment's scheduling primitives.
///
/// Implementations must hand back a fresh [`HostHandle`] per registration
/// and treat [`cancel`](Self::cancel) of an unknown or already-fired handle
/// as a no-op.
pub trait HostTimers: Send + Sync {
    /// Arms `callback` to fire once after `delay`.
    fn schedule_once(&self, callback: HostCallback, delay: Duration) -> HostHandle;

    /// Arms `callback` to fire every `interval` until cancelled.
    fn schedule_repeating(&self, callback: HostCallback, interval: Duration) -> HostHandle;

    /// Disarms a previously armed timer.
    fn cancel(&self, handle: HostHandle);
}

/// A host that never fires.
///
/// Registrations are accepted and handed distinct handles so hook
/// bookkeeping stays exercised, but nothing ever runs through the host
/// path. Use this when all firing should happen through manual ticking.
#[derive(Debug, Default)]
pub struct NullHost {
    next: AtomicU64,
}

impl NullHost {
    /// Creates a new null host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostTimers for NullHost {
    fn schedule_once(&self, _callback: HostCallback, _delay: Duration) -> HostHandle {
        HostHandle(self.next.fetch_add(1, Ordering::Relaxed))
    }

    fn schedule_repeating(&self, _callback: HostCallback, _interval: Duration) -> HostHandle {
        HostHandle(self.next.fetch_add(1, Ordering::Relaxed))
    }

    fn cancel(&self, _handle: HostHandle) {}
}

struct ArmedTimer {
    callback: HostCallback,
    period: Duration,
    repeating: bool,
}

#[derive(Default)]
struct ManualHostState {
    armed: BTreeMap<u64, ArmedTimer>,
    next: u64,
    total_armed: u64,
}

/// A manually driven host scheduler.
///
/// Armed hooks are held until the caller fires or cancels them. The armed
/// and cumulative counters make globalize/de-globalize discipline
/// observable: after any blocking sequence netting to zero depth, every
/// pending event must be armed here exactly once.
#[derive(Default)]
pub struct ManualHost {
    state: Mutex<ManualHostState>,
}

impl ManualHost {
    /// Creates a new manual host with no armed timers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of currently armed timers.
    #[must_use]
    pub fn armed(&self) -> usize {
        self.state.lock().armed.len()
    }

    /// Returns the cumulative number of arm operations ever performed.
    #[must_use]
    pub fn total_armed(&self) -> u64 {
        self.state.lock().total_armed
    }

    /// Returns the requested period of an armed timer, if still armed.
    #[must_use]
    pub fn period_of(&self, handle: HostHandle) -> Option<Duration> {
        self.state.lock().armed.get(&handle.as_u64()).map(|t| t.period)
    }

    /// Fires an armed timer now, regardless of its requested delay.
    ///
    /// One-shot timers are disarmed before their callback runs; repeating
    /// timers stay armed. Returns false if the handle is not armed.
    pub fn fire(&self, handle: HostHandle) -> bool {
        let callback = {
            let mut state = self.state.lock();
            let Some(timer) = state.armed.get(&handle.as_u64()) else {
                return false;
            };
            let callback = Arc::clone(&timer.callback);
            if !timer.repeating {
                state.armed.remove(&handle.as_u64());
            }
            callback
        };
        // Run with no lock held; the callback may re-enter the host.
        callback();
        true
    }

    /// Fires every currently armed timer once, in arming order.
    ///
    /// Returns the number of callbacks run.
    pub fn fire_all(&self) -> usize {
        let handles: Vec<u64> = self.state.lock().armed.keys().copied().collect();
        let mut fired = 0;
        for raw in handles {
            if self.fire(HostHandle(raw)) {
                fired += 1;
            }
        }
        fired
    }
}

impl fmt::Debug for ManualHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ManualHost")
            .field("armed", &state.armed.len())
            .field("total_armed", &state.total_armed)
            .finish()
    }
}

impl HostTimers for ManualHost {
    fn schedule_once(&self, callback: HostCallback, delay: Duration) -> HostHandle {
        let mut state = self.state.lock();
        let raw = state.next;
        state.next += 1;
        state.total_armed += 1;
        state.armed.insert(
            raw,
            ArmedTimer {
                callback,
                period: delay,
                repeating: false,
            },
        );
        HostHandle(raw)
    }

    fn schedule_repeating(&self, callback: HostCallback, interval: Duration) -> HostHandle {
        let mut state = self.state.lock();
        let raw = state.next;
        state.next += 1;
        state.total_armed += 1;
        state.armed.insert(
            raw,
            ArmedTimer {
                callback,
                period: interval,
                repeating: true,
            },
        );
        HostHandle(raw)
    }

    fn cancel(&self, handle: HostHandle) {
        self.state.lock().armed.remove(&handle.as_u64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counting_callback() -> (Arc<AtomicUsize>, HostCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        let callback: HostCallback = Arc::new(move || {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        (count, callback)
    }

    #[test]
    fn null_host_hands_out_distinct_handles() {
        let host = NullHost::new();
        let (_, cb) = counting_callback();
        let a = host.schedule_once(Arc::clone(&cb), Duration::from_millis(1));
        let b = host.schedule_repeating(cb, Duration::from_millis(1));
        assert_ne!(a, b);
        host.cancel(a);
    }

    #[test]
    fn manual_host_fire_disarms_one_shot() {
        let host = ManualHost::new();
        let (count, cb) = counting_callback();
        let handle = host.schedule_once(cb, Duration::from_millis(5));
        assert_eq!(host.armed(), 1);

        assert!(host.fire(handle));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(host.armed(), 0);

        // Already fired: firing and cancelling are no-ops.
        assert!(!host.fire(handle));
        host.cancel(handle);
    }

    #[test]
    fn manual_host_repeating_stays_armed() {
        let host = ManualHost::new();
        let (count, cb) = counting_callback();
        let handle = host.schedule_repeating(cb, Duration::from_millis(10));

        assert!(host.fire(handle));
        assert!(host.fire(handle));
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(host.armed(), 1);

        host.cancel(handle);
        assert!(!host.fire(handle));
    }

    #[test]
    fn total_armed_is_cumulative() {
        let host = ManualHost::new();
        let (_, cb) = counting_callback();
        let handle = host.schedule_once(Arc::clone(&cb), Duration::from_millis(1));
        host.cancel(handle);
        host.schedule_once(cb, Duration::from_millis(1));
        assert_eq!(host.armed(), 1);
        assert_eq!(host.total_armed(), 2);
    }
}
