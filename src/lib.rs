//! # taskwire
//!
//! Pluggable task schedulers for wiring independently developed processing stages into
//! a dataflow graph, where each stage picks its own execution discipline.
//!
//! A stage hands a *handler* and one *data payload* to its scheduler. The scheduler
//! reserves capacity, runs the handler according to its discipline, and releases the
//! capacity exactly once when the handler completes, whether it succeeded, returned an
//! error or panicked.
//!
//! ## Disciplines
//!
//! | type                | runs on              | ordering         |
//! |---------------------|----------------------|------------------|
//! | `Direct`            | inserting thread     | caller order     |
//! | `Concurrent`        | shared worker pool   | none             |
//! | `Sequential`        | shared worker pool   | insertion order  |
//! | `SequentialThread`  | one dedicated thread | insertion order  |
//! | `NoOp`              | nothing              | rejects all work |
//!
//! All of them implement [`TaskScheduler`](scheduler::TaskScheduler), so producers do
//! not change when a stage switches discipline.
//!
//! ## Backpressure
//!
//! Capacity counters are the only backpressure mechanism. `put` blocks while a bounded
//! scheduler is full, `offer` returns `false` instead, and `inject` always succeeds.
//! Counters may be shared between schedulers through
//! [`with_external_back_pressure`](builders::TaskSchedulerBuilder::with_external_back_pressure).
//! Pool workers blocked on a full counter are compensated by temporary threads, so
//! chained stages on a small pool cannot deadlock each other.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use taskwire::builders::TaskSchedulerBuilder;
//! use taskwire::config::WorkerPoolConfig;
//! use taskwire::core::WorkerPool;
//! use taskwire::scheduler::{handler, TaskScheduler, TaskSchedulerType};
//!
//! let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::new().with_worker_count(2))?);
//! let stage = TaskSchedulerBuilder::<String>::new("parse_stage")
//!     .with_type(TaskSchedulerType::Concurrent)
//!     .with_pool(pool)
//!     .with_unhandled_task_capacity(64)
//!     .with_flush_enabled(true)
//!     .build()?;
//!
//! let parse = handler(|line: String| {
//!     let _fields: Vec<&str> = line.split(',').collect();
//!     Ok(())
//! });
//! stage.put(&parse, "a,b,c".to_string())?;
//! if !stage.offer(&parse, "d,e".to_string())? {
//!     // full: shed or retry later
//! }
//! stage.flush()?;
//! assert_eq!(stage.unprocessed_task_count(), 0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Builders to construct schedulers from code or configuration.
pub mod builders;
/// Configuration models for the worker pool and schedulers.
pub mod config;
/// Core primitives: errors, squelch gate, busy timers, failure sinks, worker pool.
pub mod core;
/// Capacity counters.
pub mod counter;
/// Task schedulers and their common contract.
pub mod scheduler;
/// Shared utilities.
pub mod util;
