//! Tests for the shared worker pool

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use taskwire::config::WorkerPoolConfig;
use taskwire::core::{managed_block, PoolError, WorkerPool};

fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[test]
fn test_invalid_config_rejected() {
    let result = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(0));
    assert!(matches!(result, Err(PoolError::InvalidConfig(_))));
}

#[test]
fn test_worker_threads_are_named() {
    let pool = WorkerPool::new(
        WorkerPoolConfig::new()
            .with_worker_count(2)
            .with_thread_name_prefix("ledger"),
    )
    .unwrap();
    assert_eq!(pool.worker_count(), 2);

    let (tx, rx) = crossbeam_channel::bounded(1);
    pool.execute(move || {
        tx.send(thread::current().name().map(str::to_string)).unwrap();
    })
    .unwrap();
    let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert!(name.starts_with("ledger-"), "unexpected thread name {name}");
    pool.shutdown();
}

#[test]
fn test_shutdown_drains_queued_jobs() {
    let pool = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(1)).unwrap();
    let ran = Arc::new(AtomicUsize::new(0));
    for _ in 0..20 {
        let ran = Arc::clone(&ran);
        pool.execute(move || {
            thread::sleep(Duration::from_millis(1));
            ran.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }
    pool.shutdown();
    assert_eq!(ran.load(Ordering::SeqCst), 20);
    assert!(matches!(pool.execute(|| {}), Err(PoolError::PoolShutdown)));

    // Idempotent
    pool.shutdown();
}

#[test]
fn test_compensation_disabled_still_blocks_safely() {
    let pool = Arc::new(
        WorkerPool::new(
            WorkerPoolConfig::new()
                .with_worker_count(2)
                .with_max_compensation_threads(0),
        )
        .unwrap(),
    );
    let (tx, rx) = crossbeam_channel::bounded::<()>(0);
    let unblocked = Arc::new(AtomicBool::new(false));

    {
        let unblocked = Arc::clone(&unblocked);
        pool.execute(move || {
            let _ = managed_block(|| rx.recv_timeout(Duration::from_secs(5)));
            unblocked.store(true, Ordering::SeqCst);
        })
        .unwrap();
    }
    assert!(wait_until(Duration::from_secs(1), || pool.stats().active_tasks == 1));
    assert_eq!(pool.stats().compensation_threads, 0);

    // The second permanent worker is still free.
    pool.execute(move || tx.send(()).unwrap()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || unblocked.load(Ordering::SeqCst)));
    pool.shutdown();
}

#[test]
fn test_compensation_thread_visible_while_blocked() {
    let pool = Arc::new(WorkerPool::new(WorkerPoolConfig::new().with_worker_count(1)).unwrap());
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
    pool.execute(move || {
        let _ = managed_block(|| release_rx.recv_timeout(Duration::from_secs(5)));
    })
    .unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        pool.stats().compensation_threads == 1
    }));
    release_tx.send(()).unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        pool.stats().compensation_threads == 0
    }));
    pool.shutdown();
}
