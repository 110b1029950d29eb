//! Worker pool configuration.

use serde::{Deserialize, Serialize};

/// Default stack size for pool threads.
pub const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;

/// Default upper bound on live compensation threads.
pub const DEFAULT_MAX_COMPENSATION_THREADS: usize = 256;

/// Configuration of the shared worker pool that runs Concurrent and Sequential tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Number of permanent worker threads.
    pub worker_count: usize,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
    /// Stack size of each worker thread in bytes.
    pub thread_stack_size: usize,
    /// Maximum number of temporary threads spawned while workers are blocked on
    /// backpressure. Zero disables compensation.
    pub max_compensation_threads: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().max(1),
            thread_name_prefix: "taskwire-worker".to_string(),
            thread_stack_size: DEFAULT_STACK_SIZE,
            max_compensation_threads: DEFAULT_MAX_COMPENSATION_THREADS,
        }
    }
}

impl WorkerPoolConfig {
    /// Default configuration sized to the available CPUs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of permanent worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the worker thread stack size in bytes.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, stack_size: usize) -> Self {
        self.thread_stack_size = stack_size;
        self
    }

    /// Set the compensation thread limit.
    #[must_use]
    pub const fn with_max_compensation_threads(mut self, limit: usize) -> Self {
        self.max_compensation_threads = limit;
        self
    }

    /// Validate pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        if self.thread_stack_size < 64 * 1024 {
            return Err("thread_stack_size must be at least 64 KiB".into());
        }
        Ok(())
    }
}
