//! Pooled scheduler without ordering guarantees.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::task::{OnceBody, Task};
use super::{Handler, SchedulerCore, SchedulerSettings, TaskScheduler, TaskSchedulerType};
use crate::core::{SchedulerError, WorkerPool};

/// Runs every accepted task on the worker pool as soon as it is inserted.
///
/// Tasks may run in any order and in parallel with each other.
pub struct ConcurrentScheduler<T> {
    core: Arc<SchedulerCore>,
    pool: Arc<WorkerPool>,
    _data: PhantomData<fn(T)>,
}

impl<T> fmt::Debug for ConcurrentScheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentScheduler")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> ConcurrentScheduler<T> {
    /// Creates a scheduler that submits to `pool`.
    pub fn new(settings: SchedulerSettings, pool: Arc<WorkerPool>) -> Self {
        Self {
            core: Arc::new(SchedulerCore::new(TaskSchedulerType::Concurrent, settings)),
            pool,
            _data: PhantomData,
        }
    }

    fn schedule(&self, handler: &Handler<T>, data: T) {
        let core = Arc::clone(&self.core);
        let handler = Arc::clone(handler);
        let task = Task::new(
            Arc::clone(&self.pool),
            1,
            OnceBody::new(move || core.execute(&handler, data, 1)),
        );
        task.resolve_dependency();
    }
}

impl<T: Send + 'static> TaskScheduler<T> for ConcurrentScheduler<T> {
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
