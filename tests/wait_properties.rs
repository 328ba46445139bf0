//! Property tests for the waiter's timing contract.

use awaitlab::{Await, ManagedLoop, Promise};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn managed_lab() -> ManagedLoop {
    let lab = ManagedLoop::new();
    lab.manage();
    lab
}

proptest! {
    /// For all d and t with t > d: a one-shot settling the value after d
    /// resolves `result(value, t)` without error.
    #[test]
    fn settles_when_timeout_exceeds_delay(delay_ms in 1u64..60, gap_ms in 1u64..40) {
        let timeout_ms = delay_ms + gap_ms;
        let lab = managed_lab();
        let promise: Promise<u64> = Promise::new();
        let settle = promise.clone();
        lab.adapter().schedule_once(Duration::from_millis(delay_ms), move || {
            settle.complete(delay_ms);
        });

        let value = Await::result(
            &lab.driver(),
            &promise,
            Duration::from_millis(timeout_ms),
        );
        prop_assert_eq!(value.unwrap(), delay_ms);
        prop_assert_eq!(lab.driver().blocking_depth(), 0);
    }

    /// For all d and t with t < d: `result(value, t)` times out and reports
    /// elapsed ≥ t.
    #[test]
    fn times_out_when_delay_exceeds_timeout(timeout_ms in 1u64..40, gap_ms in 1u64..40) {
        let delay_ms = timeout_ms + gap_ms;
        let lab = managed_lab();
        let promise: Promise<u64> = Promise::new();
        let settle = promise.clone();
        lab.adapter().schedule_once(Duration::from_millis(delay_ms), move || {
            settle.complete(delay_ms);
        });

        let err = Await::result(
            &lab.driver(),
            &promise,
            Duration::from_millis(timeout_ms),
        )
        .unwrap_err();
        prop_assert!(err.is_timed_out());
        prop_assert!(err.elapsed().unwrap() >= Duration::from_millis(timeout_ms));
        prop_assert_eq!(lab.driver().blocking_depth(), 0);
    }

    /// A repeating event fires exactly once per full interval of elapsed
    /// virtual time, and never leaves the registry by firing.
    #[test]
    fn repeating_fires_once_per_interval(interval_ms in 1u64..20, ticks in 1u64..200) {
        let lab = managed_lab();
        let count = Arc::new(AtomicUsize::new(0));
        let inner = Arc::clone(&count);
        lab.adapter().schedule_repeating(
            Duration::from_millis(interval_ms),
            move || {
                inner.fetch_add(1, Ordering::SeqCst);
            },
        );

        let driver = lab.driver();
        for _ in 0..ticks {
            driver.tick();
        }
        let expected = (ticks / interval_ms) as usize;
        prop_assert_eq!(count.load(Ordering::SeqCst), expected);
        prop_assert_eq!(lab.pending_events(), 1);
    }
}
