//! Unbounded counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{checked_release, CountSignal, ObjectCounter, DEFAULT_SLEEP_DURATION};

/// Counter without a capacity limit: every on-ramp succeeds immediately.
///
/// Used for schedulers that only need to know how much work is in flight, for
/// `unprocessed_task_count()` and `flush()`.
#[derive(Debug)]
pub struct StandardObjectCounter {
    count: AtomicU64,
    signal: CountSignal,
}

impl Default for StandardObjectCounter {
    fn default() -> Self {
        Self::new(DEFAULT_SLEEP_DURATION)
    }
}

impl StandardObjectCounter {
    /// Creates an empty counter. `sleep_duration` bounds how long `wait_until_empty`
    /// sleeps between checks.
    #[must_use]
    pub const fn new(sleep_duration: Duration) -> Self {
        Self {
            count: AtomicU64::new(0),
            signal: CountSignal::new(sleep_duration),
        }
    }
}

impl ObjectCounter for StandardObjectCounter {
    fn on_ramp(&self, weight: u64) {
        self.count.fetch_add(weight, Ordering::AcqRel);
    }

    fn attempt_on_ramp(&self, weight: u64) -> bool {
        self.count.fetch_add(weight, Ordering::AcqRel);
        true
    }

    fn force_on_ramp(&self, weight: u64) {
        self.count.fetch_add(weight, Ordering::AcqRel);
    }

    fn off_ramp(&self, weight: u64) {
        checked_release(&self.count, weight);
        self.signal.notify();
    }

    fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    fn wait_until_empty(&self) {
        if self.count() == 0 {
            return;
        }
        self.signal.wait_until(|| self.count() == 0);
    }
}
