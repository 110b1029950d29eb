//! Builders to construct schedulers from code or configuration.

pub mod scheduler_builder;

pub use scheduler_builder::{build_schedulers, TaskSchedulerBuilder};
