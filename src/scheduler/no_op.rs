//! Scheduler that accepts no work.

use std::fmt;
use std::marker::PhantomData;

use tracing::error;

use super::{Capacity, Handler, SchedulerCore, SchedulerSettings, TaskScheduler, TaskSchedulerType};
use crate::core::SchedulerError;

/// Stand-in for a disabled stage. Every insertion fails fast: callers must discard
/// data before it reaches a disabled stage rather than rely on it being dropped here.
pub struct NoOpScheduler<T> {
    core: SchedulerCore,
    _data: PhantomData<fn(T)>,
}

impl<T> fmt::Debug for NoOpScheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NoOpScheduler")
            .field("name", &self.core.name())
            .finish()
    }
}

impl<T: Send + 'static> NoOpScheduler<T> {
    /// Creates a no-op scheduler. Only the name and the flush flag are used.
    pub fn new(mut settings: SchedulerSettings) -> Self {
        settings.capacity = Capacity::Unlimited;
        settings.insertion_is_blocking = false;
        Self {
            core: SchedulerCore::new(TaskSchedulerType::NoOp, settings),
            _data: PhantomData,
        }
    }

    fn reject(&self) -> SchedulerError {
        error!(scheduler = %self.core.name(), "data inserted into a no-op scheduler");
        SchedulerError::InsertionRejected(self.core.name().to_string())
    }
}

impl<T: Send + 'static> TaskScheduler<T> for NoOpScheduler<T> {
    fn core(&self) -> &SchedulerCore {
        &self.core
    }

    fn put(&self, _handler: &Handler<T>, _data: T) -> Result<(), SchedulerError> {
        Err(self.reject())
    }

    fn offer(&self, _handler: &Handler<T>, _data: T) -> Result<bool, SchedulerError> {
        Err(self.reject())
    }

    fn inject(&self, _handler: &Handler<T>, _data: T) -> Result<(), SchedulerError> {
        Err(self.reject())
    }

    fn flush(&self) -> Result<(), SchedulerError> {
        if self.core.flush_enabled() {
            Ok(())
        } else {
            Err(SchedulerError::FlushDisabled(self.core.name().to_string()))
        }
    }

    fn unprocessed_task_count(&self) -> u64 {
        0
    }

    fn capacity(&self) -> Capacity {
        Capacity::Unlimited
    }
}
