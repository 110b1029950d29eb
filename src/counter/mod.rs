//! Capacity counters: the sole backpressure mechanism of every scheduler.
//!
//! A counter tracks the weight of work that has been accepted but not yet completed.
//! Schedulers reserve weight when work is inserted ("on-ramp") and release it exactly
//! once when the work completes ("off-ramp"). Blocking waits run under
//! [`managed_block`](crate::core::worker_pool::managed_block) so that a pool worker
//! blocked on a full counter does not starve the pool.

pub mod backpressure;
pub mod multi;
pub mod standard;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::error;

use crate::core::worker_pool::managed_block;

pub use backpressure::BackpressureObjectCounter;
pub use multi::MultiObjectCounter;
pub use standard::StandardObjectCounter;

/// Default poll interval used while blocked on a counter.
pub const DEFAULT_SLEEP_DURATION: Duration = Duration::from_millis(1);

/// Tracks in-flight weight on a scheduler.
///
/// Every unit reserved through one of the on-ramp operations must be released through
/// [`off_ramp`](Self::off_ramp) exactly once.
pub trait ObjectCounter: Send + Sync {
    /// Blocks until capacity is available, then reserves `weight`.
    fn on_ramp(&self, weight: u64);

    /// Reserves `weight` if capacity allows; never blocks.
    fn attempt_on_ramp(&self, weight: u64) -> bool;

    /// Reserves `weight` regardless of capacity.
    fn force_on_ramp(&self, weight: u64);

    /// Releases `weight` previously reserved.
    fn off_ramp(&self, weight: u64);

    /// Current reserved weight.
    fn count(&self) -> u64;

    /// Blocks until the reserved weight drops to zero.
    fn wait_until_empty(&self);

    /// Maximum weight this counter admits, or `None` when unbounded.
    fn capacity(&self) -> Option<u64> {
        None
    }
}

/// Wakes threads blocked on a counter whenever its count drops.
///
/// Waiters re-check their condition under the lock and also on every poll interval, so
/// a missed notification costs at most one interval.
#[derive(Debug)]
pub(crate) struct CountSignal {
    lock: Mutex<()>,
    changed: Condvar,
    waiters: AtomicUsize,
    poll: Duration,
}

impl CountSignal {
    pub(crate) const fn new(poll: Duration) -> Self {
        Self {
            lock: Mutex::new(()),
            changed: Condvar::new(),
            waiters: AtomicUsize::new(0),
            poll,
        }
    }

    /// Wakes every waiter. Must be called after the count has been updated.
    pub(crate) fn notify(&self) {
        if self.waiters.load(Ordering::SeqCst) == 0 {
            return;
        }
        let _guard = self.lock.lock();
        self.changed.notify_all();
    }

    /// Blocks until `done` returns true. `done` may have side effects (e.g. reserving).
    pub(crate) fn wait_until(&self, mut done: impl FnMut() -> bool) {
        managed_block(|| {
            self.waiters.fetch_add(1, Ordering::SeqCst);
            let mut guard = self.lock.lock();
            while !done() {
                self.changed.wait_for(&mut guard, self.poll);
            }
            drop(guard);
            self.waiters.fetch_sub(1, Ordering::SeqCst);
        });
    }
}

/// Decrements `count` by `weight`, refusing to go below zero.
pub(crate) fn checked_release(count: &std::sync::atomic::AtomicU64, weight: u64) {
    let released = count.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
        current.checked_sub(weight)
    });
    if let Err(current) = released {
        error!(
            current = current,
            weight = weight,
            "off-ramp without matching on-ramp; count left unchanged"
        );
    }
}
