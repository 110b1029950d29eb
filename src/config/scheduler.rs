//! Scheduler and wiring configuration structures.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::WorkerPoolConfig;
use crate::scheduler::TaskSchedulerType;

/// Configuration of one scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Execution discipline.
    pub scheduler_type: TaskSchedulerType,
    /// Maximum unprocessed weight; absent means unlimited.
    pub capacity: Option<u64>,
    /// Whether `flush()` is supported.
    pub flush_enabled: bool,
    /// Whether squelching is supported.
    pub squelching_enabled: bool,
    /// Poll interval of blocked insertions, in milliseconds.
    pub sleep_duration_ms: Option<u64>,
    /// Tasks drained per wake-up; sequential-thread only.
    pub batch_size: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scheduler_type: TaskSchedulerType::Sequential,
            capacity: None,
            flush_enabled: false,
            squelching_enabled: false,
            sleep_duration_ms: None,
            batch_size: None,
        }
    }
}

impl SchedulerConfig {
    /// Validate scheduler configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.capacity == Some(0) {
            return Err("capacity must be greater than 0 when set".into());
        }
        if self.sleep_duration_ms == Some(0) {
            return Err("sleep_duration_ms must be greater than 0 when set".into());
        }
        if let Some(batch_size) = self.batch_size {
            if batch_size == 0 {
                return Err("batch_size must be greater than 0 when set".into());
            }
            if self.scheduler_type != TaskSchedulerType::SequentialThread {
                return Err("batch_size only applies to sequential_thread schedulers".into());
            }
        }
        if self.scheduler_type == TaskSchedulerType::NoOp && self.capacity.is_some() {
            return Err("no_op schedulers have no capacity".into());
        }
        Ok(())
    }
}

/// Root configuration: a worker pool plus named schedulers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WiringConfig {
    /// Pool shared by pooled schedulers.
    #[serde(default)]
    pub pool: WorkerPoolConfig,
    /// Map of scheduler name to configuration.
    pub schedulers: HashMap<String, SchedulerConfig>,
}

impl WiringConfig {
    /// Validate the pool and all schedulers, and ensure at least one scheduler exists.
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.pool
            .validate()
            .map_err(|e| format!("pool invalid: {e}"))?;
        if self.schedulers.is_empty() {
            return Err("at least one scheduler must be defined".into());
        }
        for (name, scheduler) in &self.schedulers {
            if !is_valid_scheduler_name(name) {
                return Err(format!("illegal scheduler name `{name}`"));
            }
            scheduler
                .validate()
                .map_err(|e| format!("scheduler `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse wiring configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error message.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Scheduler names are non-empty and use only ASCII letters, digits and underscores.
#[must_use]
pub fn is_valid_scheduler_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
