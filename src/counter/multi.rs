//! Counter that fans out to several counters.

use std::fmt;
use std::sync::Arc;

use super::ObjectCounter;

/// Combines several counters into one.
///
/// Used when a scheduler has its own capacity and must also respect an external
/// backpressure counter shared with other schedulers. The first counter is the primary:
/// it provides `count()`, `capacity()` and `wait_until_empty()`, so a flush never waits
/// on work that belongs to other schedulers sharing an external counter.
pub struct MultiObjectCounter {
    counters: Vec<Arc<dyn ObjectCounter>>,
}

impl fmt::Debug for MultiObjectCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiObjectCounter")
            .field("counters", &self.counters.len())
            .finish()
    }
}

impl MultiObjectCounter {
    /// Combines `primary` with any number of additional counters.
    pub fn new(
        primary: Arc<dyn ObjectCounter>,
        others: impl IntoIterator<Item = Arc<dyn ObjectCounter>>,
    ) -> Self {
        let mut counters = vec![primary];
        counters.extend(others);
        Self { counters }
    }

    /// Number of combined counters, including the primary.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Always false: a multi-counter holds at least its primary.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl ObjectCounter for MultiObjectCounter {
    fn on_ramp(&self, weight: u64) {
        for counter in &self.counters {
            counter.on_ramp(weight);
        }
    }

    fn attempt_on_ramp(&self, weight: u64) -> bool {
        for (idx, counter) in self.counters.iter().enumerate() {
            if !counter.attempt_on_ramp(weight) {
                for reserved in &self.counters[..idx] {
                    reserved.off_ramp(weight);
                }
                return false;
            }
        }
        true
    }

    fn force_on_ramp(&self, weight: u64) {
        for counter in &self.counters {
            counter.force_on_ramp(weight);
        }
    }

    // Primary last: once it reads empty, every other counter has been released too.
    fn off_ramp(&self, weight: u64) {
        for counter in self.counters.iter().rev() {
            counter.off_ramp(weight);
        }
    }

    fn count(&self) -> u64 {
        self.counters[0].count()
    }

    fn wait_until_empty(&self) {
        self.counters[0].wait_until_empty();
    }

    fn capacity(&self) -> Option<u64> {
        self.counters[0].capacity()
    }
}
