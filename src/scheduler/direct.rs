//! Scheduler that runs handlers on the inserting thread.

use std::fmt;
use std::marker::PhantomData;

use super::{Capacity, Handler, SchedulerCore, SchedulerSettings, TaskScheduler, TaskSchedulerType};
use crate::core::SchedulerError;

/// Runs each handler inline, before the insertion call returns.
///
/// Capacity is still reserved and released around every call, so an external
/// backpressure counter shared with other schedulers is respected. `flush()` is never
/// supported: by the time an insertion returns, its task has completed.
pub struct DirectScheduler<T> {
    core: SchedulerCore,
    _data: PhantomData<fn(T)>,
}

impl<T> fmt::Debug for DirectScheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectScheduler")
            .field("core", &self.core)
            .finish()
    }
}

impl<T: Send + 'static> DirectScheduler<T> {
    /// Creates a direct scheduler.
    ///
    /// `threadsafe` marks a handler that tolerates being called from several producer
    /// threads at once; it only changes the reported type.
    pub fn new(mut settings: SchedulerSettings, threadsafe: bool) -> Self {
        let scheduler_type = if threadsafe {
            TaskSchedulerType::DirectThreadsafe
        } else {
            TaskSchedulerType::Direct
        };
        settings.flush_enabled = false;
        settings.capacity = Capacity::Unlimited;
        Self {
            core: SchedulerCore::new(scheduler_type, settings),
            _data: PhantomData,
        }
    }

    /// Whether the handler is marked safe for concurrent callers.
    #[must_use]
    pub fn is_threadsafe(&self) -> bool {
        self.core.scheduler_type() == TaskSchedulerType::DirectThreadsafe
    }
}

impl<T: Send + 'static> TaskScheduler<T> for DirectScheduler<T> {
    fn core(&self) -> &SchedulerCore {
        &self.core
    }

    fn put(&self, handler: &Handler<T>, data: T) -> Result<(), SchedulerError> {
        self.core.on_ramp().on_ramp(1);
        self.core.execute(handler, data, 1);
        Ok(())
    }

    fn offer(&self, handler: &Handler<T>, data: T) -> Result<bool, SchedulerError> {
        if !self.core.on_ramp().attempt_on_ramp(1) {
            return Ok(false);
        }
        self.core.execute(handler, data, 1);
        Ok(true)
    }

    fn inject(&self, handler: &Handler<T>, data: T) -> Result<(), SchedulerError> {
        self.core.on_ramp().force_on_ramp(1);
        self.core.execute(handler, data, 1);
        Ok(())
    }

    fn flush(&self) -> Result<(), SchedulerError> {
        Err(SchedulerError::FlushDisabled(self.core.name().to_string()))
    }

    fn capacity(&self) -> Capacity {
        Capacity::Unlimited
    }
}
