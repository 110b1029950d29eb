//! Sinks receiving handler failures that a scheduler caught.

use std::thread::Thread;

use tracing::error;

use crate::core::HandlerFailure;

/// Receives every handler failure caught by a scheduler, together with the thread that
/// executed the failing handler.
///
/// Sinks are invoked on the executing thread, after the handler has returned or unwound,
/// and before the task's capacity is released.
pub trait UncaughtErrorHandler: Send + Sync {
    /// Reports one failed task.
    fn uncaught(&self, thread: &Thread, failure: HandlerFailure);
}

impl<F> UncaughtErrorHandler for F
where
    F: Fn(&Thread, HandlerFailure) + Send + Sync,
{
    fn uncaught(&self, thread: &Thread, failure: HandlerFailure) {
        self(thread, failure);
    }
}

/// Default sink: logs each failure at error level.
#[derive(Debug, Clone)]
pub struct LoggingErrorHandler {
    scheduler: String,
}

impl LoggingErrorHandler {
    /// Creates a sink that tags its log lines with the scheduler name.
    pub fn new(scheduler: impl Into<String>) -> Self {
        Self {
            scheduler: scheduler.into(),
        }
    }
}

impl UncaughtErrorHandler for LoggingErrorHandler {
    fn uncaught(&self, thread: &Thread, failure: HandlerFailure) {
        error!(
            scheduler = %self.scheduler,
            thread = thread.name().unwrap_or("unnamed"),
            thread_id = ?thread.id(),
            panic = failure.is_panic(),
            error = %failure,
            "uncaught failure in task handler"
        );
    }
}
