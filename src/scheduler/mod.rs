//! Task schedulers: the common facade and its five disciplines.
//!
//! Every scheduler accepts a [`Handler`] plus one data payload through three insertion
//! methods that differ only in how they reserve capacity:
//!
//! | method   | reservation          | result                          |
//! |----------|----------------------|---------------------------------|
//! | `put`    | blocking `on_ramp`   | `()` once accepted              |
//! | `offer`  | `attempt_on_ramp`    | `false` if refused, nothing run |
//! | `inject` | `force_on_ramp`      | `()`, never refused             |
//!
//! The disciplines differ in where and in what order handlers run:
//!
//! - [`DirectScheduler`]: inline on the caller's thread
//! - [`ConcurrentScheduler`]: on the worker pool, no ordering
//! - [`SequentialScheduler`]: on the worker pool, strictly in linking order
//! - [`SequentialThreadScheduler`]: on one dedicated thread, strictly FIFO
//! - [`NoOpScheduler`]: accepts nothing
//!
//! A handler that returns an error or panics never disturbs the scheduler: the failure
//! is routed to the scheduler's [`UncaughtErrorHandler`] and the task's capacity is
//! released as for any completed task.

pub mod concurrent;
pub mod direct;
pub mod no_op;
pub mod sequential;
pub mod sequential_thread;
pub(crate) mod task;

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::core::{
    AppResult, BusyTimer, HandlerFailure, LoggingErrorHandler, NoOpBusyTimer, SchedulerError,
    Squelcher, UncaughtErrorHandler,
};
use crate::counter::{ObjectCounter, StandardObjectCounter};

pub use concurrent::ConcurrentScheduler;
pub use direct::DirectScheduler;
pub use no_op::NoOpScheduler;
pub use sequential::SequentialScheduler;
pub use sequential_thread::SequentialThreadScheduler;

/// Function invoked with each data payload.
///
/// Returning `Err` or panicking marks the task as failed; either way the task completes.
pub type Handler<T> = Arc<dyn Fn(T) -> AppResult<()> + Send + Sync>;

/// Wraps a closure into a [`Handler`].
pub fn handler<T, F>(f: F) -> Handler<T>
where
    F: Fn(T) -> AppResult<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Computes the capacity weight of a payload.
pub type DataWeigher<T> = Arc<dyn Fn(&T) -> u64 + Send + Sync>;

/// Capacity reported by a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capacity {
    /// At most this much weight may be in flight before `put` blocks.
    Bounded(u64),
    /// No limit.
    Unlimited,
}

impl Capacity {
    /// Builds a capacity from an optional bound; `None` and zero mean unlimited.
    #[must_use]
    pub const fn from_bound(bound: Option<u64>) -> Self {
        match bound {
            Some(limit) if limit > 0 => Self::Bounded(limit),
            _ => Self::Unlimited,
        }
    }

    /// The bound, if any.
    #[must_use]
    pub const fn bound(self) -> Option<u64> {
        match self {
            Self::Bounded(limit) => Some(limit),
            Self::Unlimited => None,
        }
    }

    /// Whether this capacity is unlimited.
    #[must_use]
    pub const fn is_unlimited(self) -> bool {
        matches!(self, Self::Unlimited)
    }
}

/// Discipline tag of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSchedulerType {
    /// Pooled, strictly ordered.
    Sequential,
    /// Dedicated thread, strictly ordered.
    SequentialThread,
    /// Pooled, unordered.
    Concurrent,
    /// Inline on the caller's thread.
    Direct,
    /// Inline on the caller's thread; the handler tolerates concurrent callers.
    DirectThreadsafe,
    /// Accepts no work.
    NoOp,
}

impl fmt::Display for TaskSchedulerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Sequential => "sequential",
            Self::SequentialThread => "sequential_thread",
            Self::Concurrent => "concurrent",
            Self::Direct => "direct",
            Self::DirectThreadsafe => "direct_threadsafe",
            Self::NoOp => "no_op",
        };
        f.write_str(label)
    }
}

/// Constructor inputs shared by every discipline.
pub struct SchedulerSettings {
    /// Scheduler name, used in errors and logs.
    pub name: String,
    /// Counter reserved from on insertion.
    pub on_ramp: Arc<dyn ObjectCounter>,
    /// Counter released to on completion; may be the same instance as `on_ramp`.
    pub off_ramp: Arc<dyn ObjectCounter>,
    /// Reported capacity.
    pub capacity: Capacity,
    /// Whether `flush()` is supported.
    pub flush_enabled: bool,
    /// Whether the squelch gate accepts transitions.
    pub squelching_enabled: bool,
    /// Whether `put` may block the caller.
    pub insertion_is_blocking: bool,
    /// Receives handler failures.
    pub uncaught_error_handler: Arc<dyn UncaughtErrorHandler>,
    /// Toggled around each handler invocation.
    pub busy_timer: Arc<dyn BusyTimer>,
}

impl SchedulerSettings {
    /// Settings with one unbounded counter for both ramps, every feature disabled, and
    /// a logging error handler.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let counter: Arc<dyn ObjectCounter> = Arc::new(StandardObjectCounter::default());
        Self {
            uncaught_error_handler: Arc::new(LoggingErrorHandler::new(name.clone())),
            name,
            on_ramp: Arc::clone(&counter),
            off_ramp: counter,
            capacity: Capacity::Unlimited,
            flush_enabled: false,
            squelching_enabled: false,
            insertion_is_blocking: false,
            busy_timer: Arc::new(NoOpBusyTimer),
        }
    }
}

impl fmt::Debug for SchedulerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerSettings")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("flush_enabled", &self.flush_enabled)
            .field("squelching_enabled", &self.squelching_enabled)
            .field("insertion_is_blocking", &self.insertion_is_blocking)
            .finish_non_exhaustive()
    }
}

/// State common to every discipline: identity, counters, flags, gate and sinks.
pub struct SchedulerCore {
    name: String,
    scheduler_type: TaskSchedulerType,
    on_ramp: Arc<dyn ObjectCounter>,
    off_ramp: Arc<dyn ObjectCounter>,
    capacity: Capacity,
    flush_enabled: bool,
    insertion_is_blocking: bool,
    squelcher: Squelcher,
    uncaught_error_handler: Arc<dyn UncaughtErrorHandler>,
    busy_timer: Arc<dyn BusyTimer>,
}

impl fmt::Debug for SchedulerCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerCore")
            .field("name", &self.name)
            .field("type", &self.scheduler_type)
            .field("capacity", &self.capacity)
            .field("unprocessed", &self.on_ramp.count())
            .field("squelching", &self.squelcher.should_squelch())
            .finish_non_exhaustive()
    }
}

impl SchedulerCore {
    pub(crate) fn new(scheduler_type: TaskSchedulerType, settings: SchedulerSettings) -> Self {
        Self {
            name: settings.name,
            scheduler_type,
            on_ramp: settings.on_ramp,
            off_ramp: settings.off_ramp,
            capacity: settings.capacity,
            flush_enabled: settings.flush_enabled,
            insertion_is_blocking: settings.insertion_is_blocking,
            squelcher: Squelcher::new(settings.squelching_enabled),
            uncaught_error_handler: settings.uncaught_error_handler,
            busy_timer: settings.busy_timer,
        }
    }

    /// Scheduler name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Discipline tag.
    #[must_use]
    pub const fn scheduler_type(&self) -> TaskSchedulerType {
        self.scheduler_type
    }

    /// Counter reserved from on insertion.
    #[must_use]
    pub fn on_ramp(&self) -> &Arc<dyn ObjectCounter> {
        &self.on_ramp
    }

    /// Counter released to on completion.
    #[must_use]
    pub fn off_ramp(&self) -> &Arc<dyn ObjectCounter> {
        &self.off_ramp
    }

    /// Configured capacity.
    #[must_use]
    pub const fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Whether `flush()` is supported.
    #[must_use]
    pub const fn flush_enabled(&self) -> bool {
        self.flush_enabled
    }

    /// Whether `put` may block.
    #[must_use]
    pub const fn insertion_is_blocking(&self) -> bool {
        self.insertion_is_blocking
    }

    /// The squelch gate.
    #[must_use]
    pub const fn squelcher(&self) -> &Squelcher {
        &self.squelcher
    }

    /// Blocks until the on-ramp counter is empty.
    pub(crate) fn flush(&self) -> Result<(), SchedulerError> {
        if !self.flush_enabled {
            return Err(SchedulerError::FlushDisabled(self.name.clone()));
        }
        debug!(scheduler = %self.name, pending = self.on_ramp.count(), "flushing");
        self.on_ramp.wait_until_empty();
        Ok(())
    }

    /// Runs one task to completion and releases its capacity exactly once.
    ///
    /// Squelched tasks skip the handler. Handler errors and panics go to the
    /// uncaught error handler.
    pub(crate) fn execute<T>(&self, handler: &Handler<T>, data: T, weight: u64) {
        if self.squelcher.should_squelch() {
            drop(data);
        } else {
            self.busy_timer.activate();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(data)));
            self.busy_timer.deactivate();

            let failure = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(HandlerFailure::Error(e)),
                Err(payload) => Some(HandlerFailure::from_panic(payload.as_ref())),
            };
            if let Some(failure) = failure {
                self.report(failure);
            }
        }
        self.off_ramp.off_ramp(weight);
    }

    fn report(&self, failure: HandlerFailure) {
        let thread = std::thread::current();
        debug!(scheduler = %self.name, error = %failure, "handler failed");
        let sink = &self.uncaught_error_handler;
        if panic::catch_unwind(AssertUnwindSafe(|| sink.uncaught(&thread, failure))).is_err() {
            error!(scheduler = %self.name, "uncaught error handler panicked");
        }
    }
}

/// Common contract implemented by every discipline.
///
/// Call sites depend only on this trait, so a stage can change discipline without
/// touching its producers.
pub trait TaskScheduler<T>: Send + Sync {
    /// Shared identity, counters and flags.
    fn core(&self) -> &SchedulerCore;

    /// Reserves one unit of capacity, blocking while the scheduler is full, then
    /// schedules the task.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InsertionRejected` for schedulers that accept no work.
    fn put(&self, handler: &Handler<T>, data: T) -> Result<(), SchedulerError>;

    /// Schedules the task only if capacity is available right now.
    ///
    /// Returns `Ok(false)` without scheduling anything when refused.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InsertionRejected` for schedulers that accept no work.
    fn offer(&self, handler: &Handler<T>, data: T) -> Result<bool, SchedulerError>;

    /// Schedules the task even if the scheduler is at or over capacity.
    ///
    /// # Errors
    ///
    /// `SchedulerError::InsertionRejected` for schedulers that accept no work.
    fn inject(&self, handler: &Handler<T>, data: T) -> Result<(), SchedulerError>;

    /// Blocks until every accepted task has completed.
    ///
    /// # Errors
    ///
    /// `SchedulerError::FlushDisabled` if the scheduler was built without flushing.
    fn flush(&self) -> Result<(), SchedulerError> {
        self.core().flush()
    }

    /// Tasks (by weight) accepted but not yet completed.
    fn unprocessed_task_count(&self) -> u64 {
        self.core().on_ramp().count()
    }

    /// Capacity of this scheduler.
    fn capacity(&self) -> Capacity {
        self.core().capacity()
    }

    /// Scheduler name.
    fn name(&self) -> &str {
        self.core().name()
    }

    /// Discipline tag.
    fn scheduler_type(&self) -> TaskSchedulerType {
        self.core().scheduler_type()
    }

    /// Whether `flush()` is supported.
    fn is_flush_enabled(&self) -> bool {
        self.core().flush_enabled()
    }

    /// Whether squelching transitions are supported.
    fn is_squelching_enabled(&self) -> bool {
        self.core().squelcher().is_supported()
    }

    /// Whether `put` may block the caller.
    fn is_insertion_blocking(&self) -> bool {
        self.core().insertion_is_blocking()
    }

    /// Starts suppressing handlers of tasks that reach execution.
    ///
    /// # Errors
    ///
    /// `SquelchingDisabled` or `AlreadySquelching`.
    fn start_squelching(&self) -> Result<(), SchedulerError> {
        let core = self.core();
        core.squelcher().start_squelching(core.name())
    }

    /// Stops suppressing handlers.
    ///
    /// # Errors
    ///
    /// `SquelchingDisabled` or `NotSquelching`.
    fn stop_squelching(&self) -> Result<(), SchedulerError> {
        let core = self.core();
        core.squelcher().stop_squelching(core.name())
    }

    /// Whether handlers are currently being suppressed.
    fn should_squelch(&self) -> bool {
        self.core().squelcher().should_squelch()
    }

    /// Starts any thread the discipline owns. A no-op for most disciplines.
    ///
    /// # Errors
    ///
    /// `ThreadSpawn` or `AlreadyStarted` for the dedicated-thread discipline.
    fn start(&self) -> Result<(), SchedulerError> {
        Ok(())
    }

    /// Stops any thread the discipline owns. A no-op for most disciplines.
    fn stop(&self) {}
}

/// A scheduler of any discipline.
pub enum Scheduler<T> {
    /// See [`DirectScheduler`].
    Direct(DirectScheduler<T>),
    /// See [`ConcurrentScheduler`].
    Concurrent(ConcurrentScheduler<T>),
    /// See [`SequentialScheduler`].
    Sequential(SequentialScheduler<T>),
    /// See [`SequentialThreadScheduler`].
    SequentialThread(SequentialThreadScheduler<T>),
    /// See [`NoOpScheduler`].
    NoOp(NoOpScheduler<T>),
}

macro_rules! dispatch {
    ($self:ident, $scheduler:ident => $call:expr) => {
        match $self {
            Scheduler::Direct($scheduler) => $call,
            Scheduler::Concurrent($scheduler) => $call,
            Scheduler::Sequential($scheduler) => $call,
            Scheduler::SequentialThread($scheduler) => $call,
            Scheduler::NoOp($scheduler) => $call,
        }
    };
}

impl<T: Send + 'static> fmt::Debug for Scheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Scheduler").field(self.core()).finish()
    }
}

impl<T: Send + 'static> TaskScheduler<T> for Scheduler<T> {
    fn core(&self) -> &SchedulerCore {
        dispatch!(self, s => s.core())
    }

    fn put(&self, handler: &Handler<T>, data: T) -> Result<(), SchedulerError> {
        dispatch!(self, s => s.put(handler, data))
    }

    fn offer(&self, handler: &Handler<T>, data: T) -> Result<bool, SchedulerError> {
        dispatch!(self, s => s.offer(handler, data))
    }

    fn inject(&self, handler: &Handler<T>, data: T) -> Result<(), SchedulerError> {
        dispatch!(self, s => s.inject(handler, data))
    }

    fn flush(&self) -> Result<(), SchedulerError> {
        dispatch!(self, s => s.flush())
    }

    fn unprocessed_task_count(&self) -> u64 {
        dispatch!(self, s => s.unprocessed_task_count())
    }

    fn capacity(&self) -> Capacity {
        dispatch!(self, s => s.capacity())
    }

    fn start(&self) -> Result<(), SchedulerError> {
        dispatch!(self, s => s.start())
    }

    fn stop(&self) {
        dispatch!(self, s => s.stop());
    }
}
