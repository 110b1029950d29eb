//! Tests for error types

use std::error::Error;
use taskwire::core::{HandlerFailure, PoolError, SchedulerError};

#[test]
fn test_scheduler_error_messages_name_the_scheduler() {
    let cases = [
        (
            SchedulerError::FlushDisabled("ingest".into()),
            "flush is not enabled for scheduler `ingest`",
        ),
        (
            SchedulerError::SquelchingDisabled("ingest".into()),
            "squelching is not enabled for scheduler `ingest`",
        ),
        (
            SchedulerError::AlreadySquelching("ingest".into()),
            "scheduler `ingest` is already squelching",
        ),
        (
            SchedulerError::NotSquelching("ingest".into()),
            "scheduler `ingest` is not squelching",
        ),
        (
            SchedulerError::AlreadyStarted("ingest".into()),
            "scheduler `ingest` has already been started",
        ),
    ];
    for (error, expected) in cases {
        assert_eq!(error.to_string(), expected);
    }
}

#[test]
fn test_thread_spawn_error_display() {
    let error = SchedulerError::ThreadSpawn {
        name: "hasher".into(),
        reason: "resource temporarily unavailable".into(),
    };
    assert_eq!(
        error.to_string(),
        "failed to spawn thread for scheduler `hasher`: resource temporarily unavailable"
    );
}

#[test]
fn test_scheduler_error_converts_into_anyhow() {
    fn stage() -> anyhow::Result<()> {
        let inserted: Result<(), SchedulerError> =
            Err(SchedulerError::InsertionRejected("disabled".into()));
        inserted?;
        Ok(())
    }
    let error = stage().unwrap_err();
    assert!(error.downcast_ref::<SchedulerError>().is_some());
}

#[test]
fn test_handler_failure_keeps_error_chain() {
    let inner = anyhow::anyhow!("disk full").context("writing batch");
    let failure = HandlerFailure::Error(inner);
    assert_eq!(
        failure.to_string(),
        "handler returned an error: writing batch: disk full"
    );
    assert!(!failure.is_panic());
}

#[test]
fn test_pool_error_is_std_error() {
    let error: Box<dyn Error> = Box::new(PoolError::InvalidConfig("worker_count".into()));
    assert_eq!(error.to_string(), "invalid configuration: worker_count");
    assert_eq!(PoolError::PoolShutdown.to_string(), "pool has been shut down");
}
