//! Synchronization primitives layered on the waiter.
//!
//! - [`Promise`]: a settable asynchronous value cell
//! - [`CountdownLatch`]: releases waiters once a fixed number of
//!   completions have occurred

mod latch;
mod promise;

pub use latch::CountdownLatch;
pub use promise::Promise;
