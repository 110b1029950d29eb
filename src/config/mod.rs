//! Configuration models for the worker pool and schedulers.

pub mod pool;
pub mod scheduler;

pub use pool::WorkerPoolConfig;
pub use scheduler::{is_valid_scheduler_name, SchedulerConfig, WiringConfig};
