//! Configuration for the managed loop.

use std::time::Duration;

/// Configuration for a [`ManagedLoop`](crate::managed::ManagedLoop).
///
/// The tick quantum is how far the owned virtual clock advances per
/// [`tick`](crate::driver::LoopDriver::tick); it bounds the polling
/// granularity of blocking waits. A zero quantum disables auto-advance,
/// leaving the clock entirely to manual control (or, on a wall clock,
/// letting real time drive the loop).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopConfig {
    /// Virtual-time advancement applied by each tick.
    pub tick_quantum: Duration,
}

impl LoopConfig {
    /// Creates the default configuration: a 1 ms tick quantum.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            tick_quantum: Duration::from_millis(1),
        }
    }

    /// Sets the tick quantum.
    #[must_use]
    pub const fn tick_quantum(mut self, quantum: Duration) -> Self {
        self.tick_quantum = quantum;
        self
    }

    /// Disables auto-advance; virtual time moves only when told to.
    #[must_use]
    pub const fn manual_advance(mut self) -> Self {
        self.tick_quantum = Duration::ZERO;
        self
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::new()
    }
}
