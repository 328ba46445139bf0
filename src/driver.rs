//! Event loop driver.
//!
//! The driver is the manual face of a [`ManagedLoop`](crate::managed::ManagedLoop):
//! it toggles blocking mode and advances virtual time one tick at a time.
//! Blocking mode is a depth counter, not a flag — a handler fired during a
//! tick may start a nested wait, and only the outermost transitions touch
//! host-hook state.

use crate::managed::LoopShared;
use crate::types::Time;
use std::fmt;
use std::sync::Arc;

/// Driving facade for a managed loop. Cheap to clone.
#[derive(Clone)]
pub struct LoopDriver {
    shared: Arc<LoopShared>,
}

impl LoopDriver {
    pub(crate) fn new(shared: Arc<LoopShared>) -> Self {
        Self { shared }
    }

    /// Raises the blocking depth.
    ///
    /// On the 0→1 transition every hooked event is detached from the host
    /// scheduler, so firing can only happen through [`tick`](Self::tick)
    /// until the matching [`reset_blocking`](Self::reset_blocking).
    pub fn set_blocking(&self) {
        self.shared.set_blocking();
    }

    /// Lowers the blocking depth.
    ///
    /// On the 1→0 transition every event still pending is re-armed with the
    /// host scheduler. Calling at depth zero is ignored.
    pub fn reset_blocking(&self) {
        self.shared.reset_blocking();
    }

    /// Advances virtual time by one quantum and fires every due event, in
    /// registration order. Returns the sampled time so callers can compare
    /// it against a deadline.
    pub fn tick(&self) -> Time {
        self.shared.tick()
    }

    /// Samples the current time without advancing or firing.
    #[must_use]
    pub fn now(&self) -> Time {
        self.shared.now()
    }

    /// Current nesting depth of blocking waits.
    #[must_use]
    pub fn blocking_depth(&self) -> u32 {
        self.shared.blocking_depth()
    }

    /// Number of events logically pending in the registry.
    #[must_use]
    pub fn pending_events(&self) -> usize {
        self.shared.pending_events()
    }
}

impl fmt::Debug for LoopDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopDriver")
            .field("blocking_depth", &self.shared.blocking_depth())
            .field("pending_events", &self.shared.pending_events())
            .finish()
    }
}
