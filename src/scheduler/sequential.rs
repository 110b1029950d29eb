//! Pooled scheduler that runs tasks strictly in insertion order.
//!
//! Tasks form a singly linked chain. The scheduler holds only the chain's tail, an empty
//! "placeholder" task. An insertion swaps in a fresh placeholder and fills the one it took
//! out, so each inserting thread claims exactly one position and the order of the swaps
//! is the execution order.
//!
//! Every placeholder except the very first waits on two dependencies: its own payload,
//! and its predecessor finishing. A predecessor releases its capacity before resolving
//! its successor, so by the time task `n + 1` starts, task `n` is fully accounted for.

use std::fmt;
use std::sync::Arc;

use crossbeam::atomic::AtomicCell;
use parking_lot::Mutex;
use tracing::error;

use super::task::{Task, TaskBody};
use super::{Handler, SchedulerCore, SchedulerSettings, TaskScheduler, TaskSchedulerType};
use crate::core::{SchedulerError, WorkerPool};

type Link<T> = Arc<Task<SequentialBody<T>>>;

struct Pending<T> {
    handler: Handler<T>,
    data: T,
    next: Link<T>,
}

/// A position in the chain; empty until an insertion claims it.
pub(crate) struct SequentialBody<T> {
    core: Arc<SchedulerCore>,
    slot: Mutex<Option<Pending<T>>>,
}

impl<T> SequentialBody<T> {
    fn empty(core: Arc<SchedulerCore>) -> Self {
        Self {
            core,
            slot: Mutex::new(None),
        }
    }

    fn deliver(&self, pending: Pending<T>) {
        *self.slot.lock() = Some(pending);
    }
}

impl<T: Send + 'static> TaskBody for SequentialBody<T> {
    fn run(&self) {
        let pending = self.slot.lock().take();
        let Some(Pending {
            handler,
            data,
            next,
        }) = pending
        else {
            error!(scheduler = %self.core.name(), "sequential task ran without a payload");
            return;
        };
        self.core.execute(&handler, data, 1);
        next.resolve_dependency();
    }
}

impl<T> Drop for SequentialBody<T> {
    // Unlinks the rest of a never-run chain iteratively.
    fn drop(&mut self) {
        let mut next = self.slot.get_mut().take().map(|pending| pending.next);
        while let Some(link) = next {
            next = match link.into_body() {
                Ok(mut body) => body.slot.get_mut().take().map(|pending| pending.next),
                Err(_still_shared) => None,
            };
        }
    }
}

/// Runs tasks on the worker pool one at a time, in the order they were inserted.
pub struct SequentialScheduler<T> {
    core: Arc<SchedulerCore>,
    pool: Arc<WorkerPool>,
    tail: AtomicCell<Link<T>>,
}

impl<T> fmt::Debug for SequentialScheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequentialScheduler")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> SequentialScheduler<T> {
    /// Creates a scheduler that submits to `pool`.
    pub fn new(settings: SchedulerSettings, pool: Arc<WorkerPool>) -> Self {
        let core = Arc::new(SchedulerCore::new(TaskSchedulerType::Sequential, settings));
        let first = Task::new(
            Arc::clone(&pool),
            1,
            SequentialBody::empty(Arc::clone(&core)),
        );
        Self {
            core,
            pool,
            tail: AtomicCell::new(first),
        }
    }

    fn schedule(&self, handler: &Handler<T>, data: T) {
        let next = Task::new(
            Arc::clone(&self.pool),
            2,
            SequentialBody::empty(Arc::clone(&self.core)),
        );
        let current = self.tail.swap(Arc::clone(&next));
        current.body().deliver(Pending {
            handler: Arc::clone(handler),
            data,
            next,
        });
        current.resolve_dependency();
    }
}

impl<T: Send + 'static> TaskScheduler<T> for SequentialScheduler<T> {
    fn core(&self) -> &SchedulerCore {
        &self.core
    }

    fn put(&self, handler: &Handler<T>, data: T) -> Result<(), SchedulerError> {
        self.core.on_ramp().on_ramp(1);
        self.schedule(handler, data);
        Ok(())
    }

    fn offer(&self, handler: &Handler<T>, data: T) -> Result<bool, SchedulerError> {
        if !self.core.on_ramp().attempt_on_ramp(1) {
            return Ok(false);
        }
        self.schedule(handler, data);
        Ok(true)
    }

    fn inject(&self, handler: &Handler<T>, data: T) -> Result<(), SchedulerError> {
        self.core.on_ramp().force_on_ramp(1);
        self.schedule(handler, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerPoolConfig;
    use crate::scheduler::handler;

    #[test]
    fn test_single_producer_order() {
        let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::new().with_worker_count(4)).unwrap());
        let mut settings = SchedulerSettings::new("sequential_unit");
        settings.flush_enabled = true;
        let scheduler = SequentialScheduler::new(settings, pool);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let h: Handler<u32> = handler(move |x| {
            seen_clone.lock().push(x);
            Ok(())
        });

        for i in 0..500 {
            scheduler.put(&h, i).unwrap();
        }
        scheduler.flush().unwrap();

        assert_eq!(*seen.lock(), (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn test_dropping_long_unrun_chain_does_not_overflow() {
        let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::new().with_worker_count(1)).unwrap());
        let core = Arc::new(SchedulerCore::new(
            TaskSchedulerType::Sequential,
            SchedulerSettings::new("long_chain"),
        ));
        let noop: Handler<u32> = handler(|_| Ok(()));

        let first = Task::new(Arc::clone(&pool), 2, SequentialBody::empty(Arc::clone(&core)));
        let mut tail = Arc::clone(&first);
        for i in 0..200_000 {
            let next = Task::new(Arc::clone(&pool), 2, SequentialBody::empty(Arc::clone(&core)));
            tail.body().deliver(Pending {
                handler: Arc::clone(&noop),
                data: i,
                next: Arc::clone(&next),
            });
            tail = next;
        }

        drop(tail);
        drop(first);
        assert_eq!(Arc::strong_count(&core), 1);
    }
}
