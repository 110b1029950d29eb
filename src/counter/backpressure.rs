//! Bounded counter that applies backpressure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::trace;

use super::{checked_release, CountSignal, ObjectCounter, DEFAULT_SLEEP_DURATION};

/// Counter with a fixed capacity.
///
/// `on_ramp` blocks while the reservation would exceed capacity. An empty counter
/// always admits one reservation, even one heavier than the whole capacity, so a single
/// oversized payload cannot wedge a scheduler forever. `force_on_ramp` may push the
/// count past capacity.
#[derive(Debug)]
pub struct BackpressureObjectCounter {
    capacity: u64,
    count: AtomicU64,
    signal: CountSignal,
}

impl BackpressureObjectCounter {
    /// Creates a counter with the given capacity and the default sleep duration.
    ///
    /// A zero capacity behaves like a capacity of one.
    #[must_use]
    pub const fn new(capacity: u64) -> Self {
        Self::with_sleep_duration(capacity, DEFAULT_SLEEP_DURATION)
    }

    /// Creates a counter whose blocked callers re-check capacity at least every
    /// `sleep_duration`.
    #[must_use]
    pub const fn with_sleep_duration(capacity: u64, sleep_duration: Duration) -> Self {
        Self {
            capacity: if capacity == 0 { 1 } else { capacity },
            count: AtomicU64::new(0),
            signal: CountSignal::new(sleep_duration),
        }
    }

    /// Try to reserve capacity atomically using CAS loop.
    fn try_reserve(&self, weight: u64) -> bool {
        let mut current = self.count.load(Ordering::Acquire);
        loop {
            if current != 0 && current.saturating_add(weight) > self.capacity {
                return false;
            }
            match self.count.compare_exchange_weak(
                current,
                current + weight,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}

impl ObjectCounter for BackpressureObjectCounter {
    fn on_ramp(&self, weight: u64) {
        if self.try_reserve(weight) {
            return;
        }
        trace!(
            capacity = self.capacity,
            weight = weight,
            "counter at capacity; blocking on-ramp"
        );
        self.signal.wait_until(|| self.try_reserve(weight));
    }

    fn attempt_on_ramp(&self, weight: u64) -> bool {
        self.try_reserve(weight)
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

    fn capacity(&self) -> Option<u64> {
        Some(self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_attempt_respects_capacity() {
        let counter = BackpressureObjectCounter::new(2);
        assert!(counter.attempt_on_ramp(1));
        assert!(counter.attempt_on_ramp(1));
        assert!(!counter.attempt_on_ramp(1));
        assert_eq!(counter.count(), 2);

        counter.off_ramp(1);
        assert!(counter.attempt_on_ramp(1));
        assert_eq!(counter.capacity(), Some(2));
    }

    #[test]
    fn test_force_exceeds_capacity() {
        let counter = BackpressureObjectCounter::new(1);
        counter.on_ramp(1);
        counter.force_on_ramp(1);
        assert_eq!(counter.count(), 2);
        assert!(!counter.attempt_on_ramp(1));
    }

    #[test]
    fn test_empty_counter_admits_oversized_weight() {
        let counter = BackpressureObjectCounter::new(4);
        assert!(counter.attempt_on_ramp(10));
        assert!(!counter.attempt_on_ramp(1));
        counter.off_ramp(10);
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_zero_capacity_acts_as_one() {
        let counter = BackpressureObjectCounter::new(0);
        assert_eq!(counter.capacity(), Some(1));
        assert!(counter.attempt_on_ramp(1));
        assert!(!counter.attempt_on_ramp(1));
    }

    #[test]
    fn test_on_ramp_blocks_until_off_ramp() {
        let counter = Arc::new(BackpressureObjectCounter::new(1));
        counter.on_ramp(1);

        let admitted = Arc::new(AtomicBool::new(false));
        let blocked = {
            let counter = Arc::clone(&counter);
            let admitted = Arc::clone(&admitted);
            thread::spawn(move || {
                counter.on_ramp(1);
                admitted.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!admitted.load(Ordering::SeqCst));

        counter.off_ramp(1);
        blocked.join().unwrap();
        assert!(admitted.load(Ordering::SeqCst));
        assert_eq!(counter.count(), 1);
    }
}
