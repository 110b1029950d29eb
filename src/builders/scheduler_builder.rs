//! Builders to construct schedulers from code or configuration.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::{is_valid_scheduler_name, SchedulerConfig, WiringConfig};
use crate::core::{
    BusyTimer, LoggingErrorHandler, NoOpBusyTimer, PoolError, SchedulerError,
    UncaughtErrorHandler, WorkerPool,
};
use crate::counter::{
    BackpressureObjectCounter, MultiObjectCounter, ObjectCounter, StandardObjectCounter,
    DEFAULT_SLEEP_DURATION,
};
use crate::scheduler::sequential_thread::DEFAULT_BATCH_SIZE;
use crate::scheduler::{
    Capacity, ConcurrentScheduler, DataWeigher, DirectScheduler, NoOpScheduler, Scheduler,
    SchedulerSettings, SequentialScheduler, SequentialThreadScheduler, TaskScheduler,
    TaskSchedulerType,
};

/// Configures and builds one [`Scheduler`].
///
/// ```rust
/// use taskwire::builders::TaskSchedulerBuilder;
/// use taskwire::scheduler::{handler, TaskScheduler, TaskSchedulerType};
///
/// let scheduler = TaskSchedulerBuilder::<u64>::new("ledger_intake")
///     .with_type(TaskSchedulerType::Sequential)
///     .with_unhandled_task_capacity(128)
///     .with_flush_enabled(true)
///     .build()?;
///
/// let print = handler(|n: u64| {
///     println!("{n}");
///     Ok(())
/// });
/// scheduler.put(&print, 1)?;
/// scheduler.flush()?;
/// # Ok::<(), taskwire::core::SchedulerError>(())
/// ```
pub struct TaskSchedulerBuilder<T> {
    name: String,
    scheduler_type: TaskSchedulerType,
    capacity: Option<u64>,
    flush_enabled: bool,
    squelching_enabled: bool,
    on_ramp: Option<Arc<dyn ObjectCounter>>,
    off_ramp: Option<Arc<dyn ObjectCounter>>,
    external_back_pressure: Vec<Arc<dyn ObjectCounter>>,
    uncaught_error_handler: Option<Arc<dyn UncaughtErrorHandler>>,
    pool: Option<Arc<WorkerPool>>,
    sleep_duration: Duration,
    data_weigher: Option<DataWeigher<T>>,
    batch_size: Option<usize>,
    busy_timer: Option<Arc<dyn BusyTimer>>,
}

impl<T> fmt::Debug for TaskSchedulerBuilder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSchedulerBuilder")
            .field("name", &self.name)
            .field("scheduler_type", &self.scheduler_type)
            .field("capacity", &self.capacity)
            .field("flush_enabled", &self.flush_enabled)
            .field("squelching_enabled", &self.squelching_enabled)
            .field("external_back_pressure", &self.external_back_pressure.len())
            .field("sleep_duration", &self.sleep_duration)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> TaskSchedulerBuilder<T> {
    /// Starts a builder for a sequential scheduler with unlimited capacity.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scheduler_type: TaskSchedulerType::Sequential,
            capacity: None,
            flush_enabled: false,
            squelching_enabled: false,
            on_ramp: None,
            off_ramp: None,
            external_back_pressure: Vec::new(),
            uncaught_error_handler: None,
            pool: None,
            sleep_duration: DEFAULT_SLEEP_DURATION,
            data_weigher: None,
            batch_size: None,
            busy_timer: None,
        }
    }

    /// Starts a builder from a scheduler configuration entry.
    pub fn from_config(name: impl Into<String>, config: &SchedulerConfig) -> Self {
        let mut builder = Self::new(name)
            .with_type(config.scheduler_type)
            .with_flush_enabled(config.flush_enabled)
            .with_squelching_enabled(config.squelching_enabled);
        builder.capacity = config.capacity;
        builder.batch_size = config.batch_size;
        if let Some(ms) = config.sleep_duration_ms {
            builder.sleep_duration = Duration::from_millis(ms);
        }
        builder
    }

    /// Set the execution discipline.
    #[must_use]
    pub const fn with_type(mut self, scheduler_type: TaskSchedulerType) -> Self {
        self.scheduler_type = scheduler_type;
        self
    }

    /// Bound the unprocessed weight; `put` blocks while the bound is reached.
    #[must_use]
    pub const fn with_unhandled_task_capacity(mut self, capacity: u64) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Enable or disable `flush()`.
    #[must_use]
    pub const fn with_flush_enabled(mut self, enabled: bool) -> Self {
        self.flush_enabled = enabled;
        self
    }

    /// Enable or disable squelching.
    #[must_use]
    pub const fn with_squelching_enabled(mut self, enabled: bool) -> Self {
        self.squelching_enabled = enabled;
        self
    }

    /// Use `counter` as the on-ramp instead of a counter built from the capacity.
    #[must_use]
    pub fn with_on_ramp(mut self, counter: Arc<dyn ObjectCounter>) -> Self {
        self.on_ramp = Some(counter);
        self
    }

    /// Use `counter` as the off-ramp. Defaults to the on-ramp counter.
    #[must_use]
    pub fn with_off_ramp(mut self, counter: Arc<dyn ObjectCounter>) -> Self {
        self.off_ramp = Some(counter);
        self
    }

    /// Also reserve from and release to `counter`, shared with other schedulers.
    #[must_use]
    pub fn with_external_back_pressure(mut self, counter: Arc<dyn ObjectCounter>) -> Self {
        self.external_back_pressure.push(counter);
        self
    }

    /// Route handler failures to `handler`. Defaults to a [`LoggingErrorHandler`].
    #[must_use]
    pub fn with_uncaught_error_handler(mut self, handler: Arc<dyn UncaughtErrorHandler>) -> Self {
        self.uncaught_error_handler = Some(handler);
        self
    }

    /// Run pooled disciplines on `pool`. Defaults to [`WorkerPool::common`].
    #[must_use]
    pub fn with_pool(mut self, pool: Arc<WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Poll interval of callers blocked on capacity.
    #[must_use]
    pub const fn with_sleep_duration(mut self, sleep_duration: Duration) -> Self {
        self.sleep_duration = sleep_duration;
        self
    }

    /// Weigh each payload for capacity accounting; sequential-thread only.
    #[must_use]
    pub fn with_data_weigher(mut self, weigher: DataWeigher<T>) -> Self {
        self.data_weigher = Some(weigher);
        self
    }

    /// Tasks drained per wake-up; sequential-thread only.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Toggle `timer` around every handler invocation.
    #[must_use]
    pub fn with_busy_timer(mut self, timer: Arc<dyn BusyTimer>) -> Self {
        self.busy_timer = Some(timer);
        self
    }

    /// Builds the scheduler. A sequential-thread scheduler is returned already started.
    ///
    /// # Errors
    ///
    /// - `InvalidName` if the name breaks the naming rules
    /// - `InvalidConfig` for inconsistent settings
    /// - `ThreadSpawn` if a needed thread cannot be created
    pub fn build(self) -> Result<Scheduler<T>, SchedulerError> {
        self.validate()?;

        let Self {
            name,
            scheduler_type,
            capacity,
            flush_enabled,
            squelching_enabled,
            on_ramp,
            off_ramp,
            external_back_pressure,
            uncaught_error_handler,
            pool,
            sleep_duration,
            data_weigher,
            batch_size,
            busy_timer,
        } = self;

        let insertion_is_blocking =
            capacity.is_some() || on_ramp.is_some() || !external_back_pressure.is_empty();

        let inner_on: Arc<dyn ObjectCounter> = match (on_ramp, capacity) {
            (Some(counter), _) => counter,
            (None, Some(limit)) => Arc::new(BackpressureObjectCounter::with_sleep_duration(
                limit,
                sleep_duration,
            )),
            (None, None) => Arc::new(StandardObjectCounter::new(sleep_duration)),
        };
        let (on_ramp, off_ramp) = match off_ramp {
            Some(inner_off) if external_back_pressure.is_empty() => (inner_on, inner_off),
            Some(inner_off) => (
                fan_out(inner_on, &external_back_pressure),
                fan_out(inner_off, &external_back_pressure),
            ),
            None if external_back_pressure.is_empty() => (Arc::clone(&inner_on), inner_on),
            None => {
                let combined = fan_out(inner_on, &external_back_pressure);
                (Arc::clone(&combined), combined)
            }
        };

        let settings = SchedulerSettings {
            uncaught_error_handler: uncaught_error_handler
                .unwrap_or_else(|| Arc::new(LoggingErrorHandler::new(name.clone()))),
            busy_timer: busy_timer.unwrap_or_else(|| Arc::new(NoOpBusyTimer)),
            name,
            on_ramp,
            off_ramp,
            capacity: Capacity::from_bound(capacity),
            flush_enabled,
            squelching_enabled,
            insertion_is_blocking,
        };
        debug!(settings = ?settings, scheduler_type = %scheduler_type, "building scheduler");

        let scheduler = match scheduler_type {
            TaskSchedulerType::Direct => Scheduler::Direct(DirectScheduler::new(settings, false)),
            TaskSchedulerType::DirectThreadsafe => {
                Scheduler::Direct(DirectScheduler::new(settings, true))
            }
            TaskSchedulerType::NoOp => Scheduler::NoOp(NoOpScheduler::new(settings)),
            TaskSchedulerType::Concurrent => {
                let pool = resolve_pool(pool, &settings.name)?;
                Scheduler::Concurrent(ConcurrentScheduler::new(settings, pool))
            }
            TaskSchedulerType::Sequential => {
                let pool = resolve_pool(pool, &settings.name)?;
                Scheduler::Sequential(SequentialScheduler::new(settings, pool))
            }
            TaskSchedulerType::SequentialThread => {
                let scheduler = SequentialThreadScheduler::new(
                    settings,
                    data_weigher,
                    batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
                );
                scheduler.start()?;
                Scheduler::SequentialThread(scheduler)
            }
        };
        Ok(scheduler)
    }

    fn validate(&self) -> Result<(), SchedulerError> {
        if !is_valid_scheduler_name(&self.name) {
            return Err(SchedulerError::InvalidName(self.name.clone()));
        }
        let invalid = |reason: &str| {
            Err(SchedulerError::InvalidConfig(format!(
                "scheduler `{}`: {reason}",
                self.name
            )))
        };
        if self.capacity == Some(0) {
            return invalid("unhandled task capacity must be greater than 0");
        }
        if self.capacity.is_some() && self.on_ramp.is_some() {
            return invalid("an explicit on-ramp counter replaces the unhandled task capacity");
        }
        if self.sleep_duration.is_zero() {
            return invalid("sleep duration must be greater than 0");
        }
        let sequential_thread = self.scheduler_type == TaskSchedulerType::SequentialThread;
        if self.data_weigher.is_some() && !sequential_thread {
            return invalid("data weighers are only supported by sequential_thread schedulers");
        }
        if self.batch_size.is_some() && !sequential_thread {
            return invalid("batch size only applies to sequential_thread schedulers");
        }
        if self.batch_size == Some(0) {
            return invalid("batch size must be greater than 0");
        }
        Ok(())
    }
}

fn fan_out(
    primary: Arc<dyn ObjectCounter>,
    external: &[Arc<dyn ObjectCounter>],
) -> Arc<dyn ObjectCounter> {
    Arc::new(MultiObjectCounter::new(primary, external.iter().cloned()))
}

fn resolve_pool(pool: Option<Arc<WorkerPool>>, name: &str) -> Result<Arc<WorkerPool>, SchedulerError> {
    match pool {
        Some(pool) if pool.is_shutdown() => Err(SchedulerError::PoolShutdown),
        Some(pool) => Ok(pool),
        None => WorkerPool::common().map_err(|e| pool_error(e, name)),
    }
}

fn pool_error(error: PoolError, name: &str) -> SchedulerError {
    match error {
        PoolError::PoolShutdown => SchedulerError::PoolShutdown,
        PoolError::InvalidConfig(reason) => SchedulerError::InvalidConfig(reason),
        PoolError::Internal(reason) => SchedulerError::ThreadSpawn {
            name: name.to_string(),
            reason,
        },
    }
}

/// Build every scheduler of a wiring configuration on one shared worker pool.
///
/// `sink_factory` supplies the uncaught error handler of each scheduler by name.
///
/// # Errors
///
/// Returns `InvalidConfig` if the configuration does not validate, or the first error
/// raised while building a scheduler.
pub fn build_schedulers<T, F>(
    cfg: &WiringConfig,
    mut sink_factory: F,
) -> Result<HashMap<String, Scheduler<T>>, SchedulerError>
where
    T: Send + 'static,
    F: FnMut(&str) -> Arc<dyn UncaughtErrorHandler>,
{
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;

    let pool = Arc::new(
        WorkerPool::new(cfg.pool.clone()).map_err(|e| pool_error(e, &cfg.pool.thread_name_prefix))?,
    );

    let mut schedulers = HashMap::with_capacity(cfg.schedulers.len());
    for (name, scheduler_cfg) in &cfg.schedulers {
        let scheduler = TaskSchedulerBuilder::from_config(name.clone(), scheduler_cfg)
            .with_pool(Arc::clone(&pool))
            .with_uncaught_error_handler(sink_factory(name))
            .build()?;
        schedulers.insert(name.clone(), scheduler);
    }

    Ok(schedulers)
}
