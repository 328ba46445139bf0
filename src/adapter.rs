//! Timer adapter.
//!
//! The registration facade of a [`ManagedLoop`](crate::managed::ManagedLoop).
//! While interception is installed every registration joins the virtual
//! registry (and, outside blocking mode, is also armed with the host
//! scheduler); while uninstalled, registrations forward straight to the
//! host. Either way the caller holds one id that cancels the event
//! wherever it lives.

use crate::managed::LoopShared;
use crate::types::{EventId, EventKind};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Registration facade for a managed loop. Cheap to clone, so handlers can
/// schedule and cancel further events.
#[derive(Clone)]
pub struct TimerAdapter {
    shared: Arc<LoopShared>,
}

impl TimerAdapter {
    pub(crate) fn new(shared: Arc<LoopShared>) -> Self {
        Self { shared }
    }

    /// Schedules `handler` to fire once after `delay`.
    pub fn schedule_once<F>(&self, delay: Duration, handler: F) -> EventId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared
            .schedule(EventKind::Once, delay, Arc::new(handler))
    }

    /// Schedules `handler` to fire every `interval` until cancelled.
    pub fn schedule_repeating<F>(&self, interval: Duration, handler: F) -> EventId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared
            .schedule(EventKind::Repeating, interval, Arc::new(handler))
    }

    /// Cancels a scheduled event. Takes effect immediately and is a no-op
    /// for events that already fired or were already cancelled.
    pub fn cancel(&self, id: EventId) {
        self.shared.cancel(id);
    }

    /// Number of events logically pending in the registry.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.shared.pending_events()
    }
}

impl fmt::Debug for TimerAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerAdapter")
            .field("pending_events", &self.shared.pending_events())
            .finish()
    }
}
