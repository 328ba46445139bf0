//! Managed loop root.
//!
//! A [`ManagedLoop`] is the explicit context object owning everything the
//! harness shares: the virtual event registry, the blocking-depth counter,
//! the clock, and the injected host scheduler. One loop per test run;
//! [`reset`](ManagedLoop::reset) tears interception down and drains pending
//! events so nothing leaks into the next run.
//!
//! The loop itself is inert. Callers hold two cheap facades onto it:
//! [`TimerAdapter`](crate::adapter::TimerAdapter) for registration and
//! [`LoopDriver`](crate::driver::LoopDriver) for blocking-mode transitions
//! and manual ticking.

use crate::adapter::TimerAdapter;
use crate::config::LoopConfig;
use crate::driver::LoopDriver;
use crate::host::{HostCallback, HostHandle, HostTimers, NullHost};
use crate::registry::{EventRegistry, ScheduledEvent};
use crate::time::{TimeSource, VirtualClock, WallClock};
use crate::tracing_compat::{debug, trace};
use crate::types::{EventId, EventKind, Time};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// State shared between the loop and its facades.
pub(crate) struct LoopShared {
    registry: Mutex<EventRegistry>,
    /// Pass-through registrations made while interception is uninstalled:
    /// event id to the host handle it forwards to.
    direct: Mutex<BTreeMap<u64, HostHandle>>,
    next_id: AtomicU64,
    depth: AtomicU32,
    managed: AtomicBool,
    clock: Arc<dyn TimeSource>,
    virtual_clock: Option<Arc<VirtualClock>>,
    host: Arc<dyn HostTimers>,
    tick_quantum: Duration,
}

/// Host-path wrapper for a one-shot event.
///
/// Takes the event out of the registry *before* running its handler, so a
/// reentrant tick inside the handler cannot fire it a second time.
fn once_hook(shared: &Arc<LoopShared>, id: EventId) -> HostCallback {
    let weak = Arc::downgrade(shared);
    Arc::new(move || {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let event = shared.registry.lock().remove(id);
        if let Some(event) = event {
            trace!(%id, "one-shot event fired through host scheduler");
            let handler = event.handler();
            handler();
        }
    })
}

/// Host-path wrapper for a repeating event. The host re-arms it; the
/// registry only records the firing time.
fn repeating_hook(shared: &Arc<LoopShared>, id: EventId) -> HostCallback {
    let weak = Arc::downgrade(shared);
    Arc::new(move || {
        let Some(shared) = weak.upgrade() else {
            return;
        };
        let now = shared.clock.now();
        let handler = shared.registry.lock().mark_repeat_fired(id, now);
        if let Some(handler) = handler {
            trace!(%id, "repeating event fired through host scheduler");
            handler();
        }
    })
}

impl LoopShared {
    fn alloc_id(&self) -> EventId {
        EventId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn now(&self) -> Time {
        self.clock.now()
    }

    pub(crate) fn is_managed(&self) -> bool {
        self.managed.load(Ordering::Acquire)
    }

    pub(crate) fn blocking_depth(&self) -> u32 {
        self.depth.load(Ordering::Acquire)
    }

    pub(crate) fn pending_events(&self) -> usize {
        self.registry.lock().len()
    }

    pub(crate) fn manage(&self) {
        self.managed.store(true, Ordering::Release);
        debug!("timer interception installed");
    }

    pub(crate) fn reset(&self) {
        self.managed.store(false, Ordering::Release);
        let hooks = self.registry.lock().drain_hooks_and_clear();
        debug!(disarmed = hooks.len(), "timer interception removed; registry drained");
        for hook in hooks {
            self.host.cancel(hook);
        }
    }

    /// Registers a callback. Under interception it joins the registry and,
    /// at depth zero, is also armed with the host; otherwise it forwards
    /// straight to the host.
    pub(crate) fn schedule(
        self: &Arc<Self>,
        kind: EventKind,
        period: Duration,
        handler: HostCallback,
    ) -> EventId {
        if !self.is_managed() {
            return self.schedule_direct(kind, period, handler);
        }
        let id = self.alloc_id();
        let now = self.clock.now();
        self.registry
            .lock()
            .insert(id, ScheduledEvent::new(kind, period, now, handler));
        if self.depth.load(Ordering::Acquire) == 0 {
            self.globalize(id);
        }
        trace!(%id, ?kind, "event registered");
        id
    }

    fn schedule_direct(
        self: &Arc<Self>,
        kind: EventKind,
        period: Duration,
        handler: HostCallback,
    ) -> EventId {
        let id = self.alloc_id();
        let hook = match kind {
            EventKind::Once => {
                // Drop the side-table entry when the host fires it, so
                // stale ids do not accumulate between runs.
                let weak = Arc::downgrade(self);
                let wrapped: HostCallback = Arc::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.direct.lock().remove(&id.as_u64());
                    }
                    handler();
                });
                self.host.schedule_once(wrapped, period)
            }
            EventKind::Repeating => self.host.schedule_repeating(handler, period),
        };
        self.direct.lock().insert(id.as_u64(), hook);
        trace!(%id, ?kind, "event passed through to host scheduler");
        id
    }

    /// Removes an event wherever it lives. Idempotent.
    pub(crate) fn cancel(&self, id: EventId) {
        if let Some(hook) = self.direct.lock().remove(&id.as_u64()) {
            self.host.cancel(hook);
            trace!(%id, "pass-through event cancelled");
            return;
        }
        let hook = {
            self.registry
                .lock()
                .remove(id)
                .and_then(|event| event.host_hook())
        };
        if let Some(hook) = hook {
            self.host.cancel(hook);
        }
        trace!(%id, "event cancelled");
    }

    /// Arms a registry event with the host scheduler. No-op if the event is
    /// gone or already hooked.
    fn globalize(self: &Arc<Self>, id: EventId) {
        let now = self.clock.now();
        let info = { self.registry.lock().arming_info(id, now) };
        let Some((kind, delay)) = info else {
            return;
        };
        let hook = match kind {
            EventKind::Once => self.host.schedule_once(once_hook(self, id), delay),
            EventKind::Repeating => self.host.schedule_repeating(repeating_hook(self, id), delay),
        };
        if !self.registry.lock().attach_hook(id, hook) {
            // Cancelled while the hook was being armed.
            self.host.cancel(hook);
        }
    }

    /// Raises the blocking depth. The 0→1 transition detaches every hooked
    /// event from the host scheduler; deeper nesting leaves hooks alone.
    pub(crate) fn set_blocking(&self) {
        let previous = self.depth.fetch_add(1, Ordering::AcqRel);
        if previous == 0 {
            let hooks = self.registry.lock().take_hooks();
            debug!(detached = hooks.len(), "entered blocking mode; events detached from host");
            for hook in hooks {
                self.host.cancel(hook);
            }
        }
    }

    /// Lowers the blocking depth. The 1→0 transition re-arms every event
    /// still pending. Calling at depth zero is ignored.
    pub(crate) fn reset_blocking(self: &Arc<Self>) {
        let previous =
            self.depth
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |depth| {
                    depth.checked_sub(1)
                });
        match previous {
            Ok(1) => {
                let ids = self.registry.lock().unhooked_ids();
                debug!(reattached = ids.len(), "left blocking mode; events reattached to host");
                for id in ids {
                    self.globalize(id);
                }
            }
            Ok(_) => {}
            Err(_) => debug!("reset_blocking at depth zero ignored"),
        }
    }

    /// Advances the owned virtual clock by one quantum, samples the time,
    /// and fires every due event in registration order.
    ///
    /// Each event is re-checked for liveness immediately before it runs, so
    /// a handler cancelling a later-due event suppresses it within the same
    /// tick, and reentrant ticks never double-fire. Handlers run with no
    /// lock held.
    pub(crate) fn tick(self: &Arc<Self>) -> Time {
        if !self.tick_quantum.is_zero() {
            if let Some(clock) = &self.virtual_clock {
                clock.advance(self.tick_quantum);
            }
        }
        let now = self.clock.now();
        let due = { self.registry.lock().due_ids(now) };
        for id in due {
            let claimed = { self.registry.lock().claim_due(id, now) };
            if let Some((handler, hook)) = claimed {
                // A one-shot claimed here may still hold a host hook (the
                // loop can be ticked outside blocking mode); disarm it.
                if let Some(hook) = hook {
                    self.host.cancel(hook);
                }
                trace!(%id, at = %now, "event fired by tick");
                handler();
            }
        }
        now
    }

    pub(crate) fn virtual_clock(&self) -> Option<Arc<VirtualClock>> {
        self.virtual_clock.clone()
    }
}

/// The managed/virtual event-loop context.
///
/// # Example
///
/// ```
/// use awaitlab::{Await, ManagedLoop, Promise};
/// use std::time::Duration;
///
/// let lab = ManagedLoop::new();
/// lab.manage();
///
/// let promise: Promise<i32> = Promise::new();
/// let settle = promise.clone();
/// lab.adapter().schedule_once(Duration::from_millis(50), move || {
///     settle.complete(42);
/// });
///
/// let value = Await::result(&lab.driver(), &promise, Duration::from_millis(200));
/// assert_eq!(value.unwrap(), 42);
/// ```
pub struct ManagedLoop {
    shared: Arc<LoopShared>,
}

impl ManagedLoop {
    /// Creates a loop with the default configuration: virtual clock, 1 ms
    /// tick quantum, and a [`NullHost`].
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a loop with explicit host, clock, and configuration.
    #[must_use]
    pub fn builder() -> LoopBuilder {
        LoopBuilder::new()
    }

    /// Installs timer interception: subsequent registrations go through the
    /// virtual registry.
    pub fn manage(&self) {
        self.shared.manage();
    }

    /// Uninstalls interception and drains the registry, disarming any host
    /// hooks still attached. Subsequent registrations pass straight through
    /// to the host scheduler.
    pub fn reset(&self) {
        self.shared.reset();
    }

    /// Returns true while interception is installed.
    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.shared.is_managed()
    }

    /// Returns a registration facade onto this loop.
    #[must_use]
    pub fn adapter(&self) -> TimerAdapter {
        TimerAdapter::new(Arc::clone(&self.shared))
    }

    /// Returns a driving facade onto this loop.
    #[must_use]
    pub fn driver(&self) -> LoopDriver {
        LoopDriver::new(Arc::clone(&self.shared))
    }

    /// The owned virtual clock, when the loop was built with one.
    #[must_use]
    pub fn virtual_clock(&self) -> Option<Arc<VirtualClock>> {
        self.shared.virtual_clock()
    }

    /// Samples the current time without ticking.
    #[must_use]
    pub fn now(&self) -> Time {
        self.shared.now()
    }

    /// Number of events logically pending in the registry.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.shared.pending_events()
    }
}

impl Default for ManagedLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ManagedLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedLoop")
            .field("managed", &self.shared.is_managed())
            .field("pending_events", &self.shared.pending_events())
            .field("blocking_depth", &self.shared.blocking_depth())
            .finish()
    }
}

enum ClockChoice {
    Virtual(Arc<VirtualClock>),
    Wall,
}

/// Builder for [`ManagedLoop`].
pub struct LoopBuilder {
    config: LoopConfig,
    host: Arc<dyn HostTimers>,
    clock: ClockChoice,
}

impl LoopBuilder {
    fn new() -> Self {
        Self {
            config: LoopConfig::new(),
            host: Arc::new(NullHost::new()),
            clock: ClockChoice::Virtual(Arc::new(VirtualClock::new())),
        }
    }

    /// Replaces the loop configuration.
    #[must_use]
    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Injects the host scheduler events globalize to.
    #[must_use]
    pub fn host(mut self, host: Arc<dyn HostTimers>) -> Self {
        self.host = host;
        self
    }

    /// Runs the loop on monotonic host time instead of virtual time.
    ///
    /// The tick quantum is not applied to a wall clock; real time drives
    /// the wait loops.
    #[must_use]
    pub fn wall_clock(mut self) -> Self {
        self.clock = ClockChoice::Wall;
        self
    }

    /// Runs the loop on the given virtual clock (shared with the caller,
    /// which may advance it manually).
    #[must_use]
    pub fn virtual_clock(mut self, clock: Arc<VirtualClock>) -> Self {
        self.clock = ClockChoice::Virtual(clock);
        self
    }

    /// Shorthand for setting the tick quantum on the configuration.
    #[must_use]
    pub fn tick_quantum(mut self, quantum: Duration) -> Self {
        self.config = self.config.tick_quantum(quantum);
        self
    }

    /// Builds the loop. Interception starts uninstalled; call
    /// [`ManagedLoop::manage`] to install it.
    #[must_use]
    pub fn build(self) -> ManagedLoop {
        let (clock, virtual_clock): (Arc<dyn TimeSource>, Option<Arc<VirtualClock>>) =
            match self.clock {
                ClockChoice::Virtual(virtual_clock) => (
                    Arc::<VirtualClock>::clone(&virtual_clock),
                    Some(virtual_clock),
                ),
                ClockChoice::Wall => (Arc::new(WallClock::new()), None),
            };
        ManagedLoop {
            shared: Arc::new(LoopShared {
                registry: Mutex::new(EventRegistry::new()),
                direct: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(0),
                depth: AtomicU32::new(0),
                managed: AtomicBool::new(false),
                clock,
                virtual_clock,
                host: self.host,
                tick_quantum: self.config.tick_quantum,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ManualHost;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn builder_defaults_to_virtual_clock() {
        let lab = ManagedLoop::new();
        assert!(lab.virtual_clock().is_some());
        assert_eq!(lab.now(), Time::ZERO);
        assert!(!lab.is_managed());
    }

    #[test]
    fn unmanaged_registrations_pass_through() {
        let host = Arc::new(ManualHost::new());
        let lab = ManagedLoop::builder()
            .host(host.clone())
            .build();

        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        let adapter = lab.adapter();
        let id = adapter.schedule_once(Duration::from_millis(10), move || {
            inner.fetch_add(1, Ordering::SeqCst);
        });

        // Forwarded to the host, never entered the registry.
        assert_eq!(host.armed(), 1);
        assert_eq!(lab.pending_events(), 0);

        assert_eq!(host.fire_all(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(host.armed(), 0);

        // Cancelling a fired pass-through id is a no-op.
        adapter.cancel(id);
    }

    #[test]
    fn managed_registrations_globalize_at_depth_zero() {
        let host = Arc::new(ManualHost::new());
        let lab = ManagedLoop::builder()
            .host(host.clone())
            .build();
        lab.manage();

        lab.adapter().schedule_once(Duration::from_millis(10), || {});
        assert_eq!(lab.pending_events(), 1);
        assert_eq!(host.armed(), 1);

        let driver = lab.driver();
        driver.set_blocking();
        lab.adapter().schedule_once(Duration::from_millis(10), || {});
        // Registered while blocking: not armed with the host.
        assert_eq!(lab.pending_events(), 2);
        assert_eq!(host.armed(), 0);
        driver.reset_blocking();
        assert_eq!(host.armed(), 2);
    }

    #[test]
    fn host_fired_one_shot_leaves_registry() {
        let host = Arc::new(ManualHost::new());
        let lab = ManagedLoop::builder()
            .host(host.clone())
            .build();
        lab.manage();

        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        lab.adapter().schedule_once(Duration::from_millis(10), move || {
            inner.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(host.fire_all(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(lab.pending_events(), 0);

        // Already gone: ticking past its deadline must not fire it again.
        lab.driver().tick();
        lab.virtual_clock().unwrap().advance(Duration::from_millis(50));
        lab.driver().tick();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_drains_registry_and_disarms_hooks() {
        let host = Arc::new(ManualHost::new());
        let lab = ManagedLoop::builder()
            .host(host.clone())
            .build();
        lab.manage();

        lab.adapter().schedule_once(Duration::from_millis(10), || {});
        lab.adapter()
            .schedule_repeating(Duration::from_millis(5), || {});
        assert_eq!(host.armed(), 2);

        lab.reset();
        assert!(!lab.is_managed());
        assert_eq!(lab.pending_events(), 0);
        assert_eq!(host.armed(), 0);
    }

    #[test]
    fn cancel_is_idempotent() {
        let host = Arc::new(ManualHost::new());
        let lab = ManagedLoop::builder()
            .host(host.clone())
            .build();
        lab.manage();

        let adapter = lab.adapter();
        let id = adapter.schedule_once(Duration::from_millis(10), || {});
        adapter.cancel(id);
        assert_eq!(lab.pending_events(), 0);
        assert_eq!(host.armed(), 0);
        adapter.cancel(id);
        assert_eq!(lab.pending_events(), 0);
    }
}
