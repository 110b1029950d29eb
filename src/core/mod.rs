//! Core scheduling primitives: errors, the squelch gate, busy timers, failure sinks
//! and the worker pool.

pub mod busy;
pub mod error;
pub mod sink;
pub mod squelch;
pub mod worker_pool;

pub use busy::{BusyTimer, NoOpBusyTimer, StandardBusyTimer};
pub use error::{AppResult, HandlerFailure, SchedulerError};
pub use sink::{LoggingErrorHandler, UncaughtErrorHandler};
pub use squelch::Squelcher;
pub use worker_pool::{managed_block, PoolError, PoolStats, WorkerPool};
