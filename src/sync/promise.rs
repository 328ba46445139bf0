//! Settable asynchronous value cell.

use crate::wait::Observable;
use parking_lot::Mutex;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

enum PromiseState<T, E> {
    Pending,
    Succeeded(T),
    Failed(E),
    /// Outcome already handed to a waiter.
    Consumed,
}

impl<T, E> PromiseState<T, E> {
    fn name(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Succeeded(_) => "Succeeded",
            Self::Failed(_) => "Failed",
            Self::Consumed => "Consumed",
        }
    }
}

/// A value that settles at most once.
///
/// Clones share the same cell, so one clone can be moved into a scheduled
/// handler to settle the value while another is awaited. The first
/// [`complete`](Self::complete) or [`fail`](Self::fail) wins; later settle
/// attempts are ignored and report `false`.
///
/// The outcome is *taken*, not copied: [`Observable::try_take`] moves it to
/// the caller exactly once, after which the cell reads as consumed.
///
/// # Example
///
/// ```
/// use awaitlab::Promise;
/// use awaitlab::wait::Observable;
///
/// let promise: Promise<u32> = Promise::new();
/// assert!(!promise.is_settled());
///
/// assert!(promise.complete(7));
/// assert!(!promise.complete(8)); // already settled
/// assert_eq!(promise.try_take(), Some(Ok(7)));
/// ```
pub struct Promise<T, E = Infallible> {
    state: Arc<Mutex<PromiseState<T, E>>>,
}

impl<T, E> Promise<T, E> {
    /// Creates a pending promise.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PromiseState::Pending)),
        }
    }

    /// Settles the promise to success. Returns false if already settled.
    pub fn complete(&self, value: T) -> bool {
        let mut state = self.state.lock();
        if matches!(*state, PromiseState::Pending) {
            *state = PromiseState::Succeeded(value);
            true
        } else {
            false
        }
    }

    /// Settles the promise to failure. Returns false if already settled.
    pub fn fail(&self, cause: E) -> bool {
        let mut state = self.state.lock();
        if matches!(*state, PromiseState::Pending) {
            *state = PromiseState::Failed(cause);
            true
        } else {
            false
        }
    }

    /// Returns true while no settle has happened yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(*self.state.lock(), PromiseState::Pending)
    }
}

impl<T, E> Default for Promise<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for Promise<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T, E> fmt::Debug for Promise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Promise").field(&self.state.lock().name()).finish()
    }
}

impl<T, E> Observable for Promise<T, E> {
    type Output = T;
    type Error = E;

    fn is_settled(&self) -> bool {
        !matches!(*self.state.lock(), PromiseState::Pending)
    }

    fn try_take(&self) -> Option<Result<T, E>> {
        let mut state = self.state.lock();
        match *state {
            PromiseState::Pending | PromiseState::Consumed => None,
            PromiseState::Succeeded(_) | PromiseState::Failed(_) => {
                match std::mem::replace(&mut *state, PromiseState::Consumed) {
                    PromiseState::Succeeded(value) => Some(Ok(value)),
                    PromiseState::Failed(cause) => Some(Err(cause)),
                    PromiseState::Pending | PromiseState::Consumed => None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_settle_wins() {
        let promise: Promise<u32, String> = Promise::new();
        assert!(promise.complete(1));
        assert!(!promise.complete(2));
        assert!(!promise.fail("late".to_owned()));
        assert_eq!(promise.try_take(), Some(Ok(1)));
    }

    #[test]
    fn failure_carries_cause() {
        let promise: Promise<u32, String> = Promise::new();
        assert!(promise.fail("broken".to_owned()));
        assert!(promise.is_settled());
        assert_eq!(promise.try_take(), Some(Err("broken".to_owned())));
    }

    #[test]
    fn take_is_single_shot() {
        let promise: Promise<u32> = Promise::new();
        promise.complete(9);
        assert_eq!(promise.try_take(), Some(Ok(9)));
        assert_eq!(promise.try_take(), None);
        // Consumed still reads as settled for readiness checks.
        assert!(promise.is_settled());
    }

    #[test]
    fn clones_share_state() {
        let promise: Promise<u32> = Promise::new();
        let other = promise.clone();
        other.complete(3);
        assert!(promise.is_settled());
        assert_eq!(promise.try_take(), Some(Ok(3)));
        assert_eq!(other.try_take(), None);
    }
}
