//! Error types for scheduler operations.

use thiserror::Error;

/// Errors produced by scheduler components.
///
/// Every variant is a configuration or programming error surfaced synchronously to the
/// caller. Capacity refusals are not errors (see `TaskScheduler::offer`) and handler
/// failures never reach the submitter (see [`HandlerFailure`]).
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// `flush()` was called on a scheduler built without flushing.
    #[error("flush is not enabled for scheduler `{0}`")]
    FlushDisabled(String),
    /// A squelching transition was requested on a scheduler built without squelching.
    #[error("squelching is not enabled for scheduler `{0}`")]
    SquelchingDisabled(String),
    /// `start_squelching()` was called while already squelching.
    #[error("scheduler `{0}` is already squelching")]
    AlreadySquelching(String),
    /// `stop_squelching()` was called while not squelching.
    #[error("scheduler `{0}` is not squelching")]
    NotSquelching(String),
    /// Work was handed to a scheduler that accepts none.
    #[error("scheduler `{0}` does not accept work; discard data before inserting")]
    InsertionRejected(String),
    /// Scheduler name does not follow the naming rules.
    #[error("illegal scheduler name `{0}`: use only ASCII letters, digits and underscores")]
    InvalidName(String),
    /// Builder or configuration values are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The worker pool backing this scheduler has been shut down.
    #[error("worker pool has been shut down")]
    PoolShutdown,
    /// A dedicated scheduler thread could not be spawned.
    #[error("failed to spawn thread for scheduler `{name}`: {reason}")]
    ThreadSpawn {
        /// Scheduler name.
        name: String,
        /// OS error description.
        reason: String,
    },
    /// `start()` was called on a scheduler whose thread is already running.
    #[error("scheduler `{0}` has already been started")]
    AlreadyStarted(String),
}

/// Failure raised by a handler while executing a task.
#[derive(Debug, Error)]
pub enum HandlerFailure {
    /// The handler returned an error.
    #[error("handler returned an error: {0:#}")]
    Error(anyhow::Error),
    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panic(String),
}

impl HandlerFailure {
    /// Builds a failure from a panic payload caught with `catch_unwind`.
    #[must_use]
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        Self::Panic(message)
    }

    /// Returns true when the failure was a panic rather than a returned error.
    #[must_use]
    pub const fn is_panic(&self) -> bool {
        matches!(self, Self::Panic(_))
    }
}

/// Application-facing result using anyhow for higher-level contexts.
///
/// This is the return type of every task handler.
pub type AppResult<T> = Result<T, anyhow::Error>;
