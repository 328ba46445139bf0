//! Awaitlab: deterministic blocking waits over virtualized timers.
//!
//! # Overview
//!
//! Awaitlab lets single-threaded test harnesses assert on asynchronous
//! results with synchronous-looking calls. Instead of suspending a thread,
//! a blocking wait here is a polling loop that manually drives a virtual
//! timer queue: every pending callback lives in an explicit registry, and
//! each tick advances logical time and fires whatever came due.
//!
//! # Core Guarantees
//!
//! - **No double firing**: an event fires through the manual tick path or
//!   the host scheduler path, never both
//! - **No leaked hooks**: after any blocking sequence netting to zero
//!   depth, every pending event is armed with the host exactly once
//! - **Reentrancy**: handlers fired by a tick may start nested waits;
//!   blocking depth is a counter and only boundary transitions touch hooks
//! - **Determinism**: events due on the same tick fire in registration
//!   order; virtual time advances only by explicit polling
//!
//! # Module Structure
//!
//! - [`types`]: core types (timestamps, event identity)
//! - [`time`](mod@time): time sources (wall clock, virtual clock)
//! - [`host`]: the injected host scheduler interface
//! - [`adapter`]: registration facade over registry and host
//! - [`driver`]: blocking-mode transitions and manual ticking
//! - [`managed`]: the loop context object and its builder
//! - [`wait`]: the blocking waiter
//! - [`sync`]: promise cell and countdown latch
//! - [`error`](mod@error): error types
//! - [`config`]: loop configuration
//! - [`tracing_compat`]: optional tracing integration (requires the
//!   `tracing-integration` feature)
//!
//! # Quick Start
//!
//! ```
//! use awaitlab::{Await, ManagedLoop, Promise};
//! use std::time::Duration;
//!
//! let lab = ManagedLoop::new();
//! lab.manage();
//!
//! let promise: Promise<&str> = Promise::new();
//! let settle = promise.clone();
//! lab.adapter().schedule_once(Duration::from_millis(25), move || {
//!     settle.complete("done");
//! });
//!
//! let value = Await::result(&lab.driver(), &promise, Duration::from_millis(100));
//! assert_eq!(value.unwrap(), "done");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod adapter;
pub mod config;
pub mod driver;
pub mod error;
pub mod host;
pub mod managed;
mod registry;
pub mod sync;
pub mod time;
pub mod tracing_compat;
pub mod types;
pub mod wait;

pub use adapter::TimerAdapter;
pub use config::LoopConfig;
pub use driver::LoopDriver;
pub use error::{TimedOut, WaitError};
pub use host::{HostCallback, HostHandle, HostTimers, ManualHost, NullHost};
pub use managed::{LoopBuilder, ManagedLoop};
pub use sync::{CountdownLatch, Promise};
pub use time::{TimeSource, VirtualClock, WallClock};
pub use types::{EventId, EventKind, Time};
pub use wait::{Await, Observable};
