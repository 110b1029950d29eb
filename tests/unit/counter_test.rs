//! Tests for capacity counters

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use taskwire::counter::{
    BackpressureObjectCounter, MultiObjectCounter, ObjectCounter, StandardObjectCounter,
};

#[test]
fn test_backpressure_counter_under_contention() {
    let counter = Arc::new(BackpressureObjectCounter::with_sleep_duration(
        4,
        Duration::from_micros(200),
    ));
    let over_capacity = Arc::new(AtomicBool::new(false));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let counter = Arc::clone(&counter);
            let over_capacity = Arc::clone(&over_capacity);
            thread::spawn(move || {
                for _ in 0..200 {
                    counter.on_ramp(1);
                    if counter.count() > 4 {
                        over_capacity.store(true, Ordering::SeqCst);
                    }
                    counter.off_ramp(1);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert!(!over_capacity.load(Ordering::SeqCst));
    assert_eq!(counter.count(), 0);
}

#[test]
fn test_unmatched_off_ramp_does_not_underflow() {
    let counter = StandardObjectCounter::default();
    counter.off_ramp(3);
    assert_eq!(counter.count(), 0);
}

#[test]
fn test_multi_counter_wait_follows_primary() {
    let primary: Arc<dyn ObjectCounter> = Arc::new(StandardObjectCounter::default());
    let external: Arc<dyn ObjectCounter> = Arc::new(BackpressureObjectCounter::new(10));
    let multi = Arc::new(MultiObjectCounter::new(
        Arc::clone(&primary),
        [Arc::clone(&external)],
    ));

    multi.on_ramp(2);
    // Work from another scheduler on the shared counter only.
    external.on_ramp(1);

    let waiter = {
        let multi = Arc::clone(&multi);
        thread::spawn(move || multi.wait_until_empty())
    };
    multi.off_ramp(2);
    waiter.join().unwrap();

    assert_eq!(primary.count(), 0);
    assert_eq!(external.count(), 1);
    assert!(!multi.is_empty());
}

#[test]
fn test_multi_attempt_respects_every_counter() {
    let first: Arc<dyn ObjectCounter> = Arc::new(BackpressureObjectCounter::new(5));
    let second: Arc<dyn ObjectCounter> = Arc::new(BackpressureObjectCounter::new(2));
    let multi = MultiObjectCounter::new(Arc::clone(&first), [Arc::clone(&second)]);

    assert!(multi.attempt_on_ramp(1));
    assert!(multi.attempt_on_ramp(1));
    assert!(!multi.attempt_on_ramp(1));
    assert_eq!(first.count(), 2);
    assert_eq!(second.count(), 2);

    multi.force_on_ramp(1);
    assert_eq!(second.count(), 3);
}
