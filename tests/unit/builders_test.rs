//! Tests for scheduler builders

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::Thread;
use taskwire::builders::{build_schedulers, TaskSchedulerBuilder};
use taskwire::config::{SchedulerConfig, WiringConfig, WorkerPoolConfig};
use taskwire::core::{
    HandlerFailure, LoggingErrorHandler, SchedulerError, UncaughtErrorHandler,
};
use taskwire::counter::{ObjectCounter, StandardObjectCounter};
use taskwire::scheduler::{handler, Capacity, Handler, Scheduler, TaskScheduler, TaskSchedulerType};

#[test]
fn test_builder_defaults() {
    let scheduler = TaskSchedulerBuilder::<u8>::new("defaults").build().unwrap();
    assert!(matches!(scheduler, Scheduler::Sequential(_)));
    assert_eq!(scheduler.name(), "defaults");
    assert_eq!(scheduler.scheduler_type(), TaskSchedulerType::Sequential);
    assert_eq!(scheduler.capacity(), Capacity::Unlimited);
    assert!(!scheduler.is_flush_enabled());
    assert!(!scheduler.is_squelching_enabled());
    assert!(!scheduler.is_insertion_blocking());
}

#[test]
fn test_builder_rejects_illegal_names() {
    for name in ["", "with space", "dash-name", "dot.name"] {
        let result = TaskSchedulerBuilder::<u8>::new(name).build();
        assert!(
            matches!(result, Err(SchedulerError::InvalidName(_))),
            "name `{name}` accepted"
        );
    }
}

#[test]
fn test_builder_rejects_inconsistent_settings() {
    let zero = TaskSchedulerBuilder::<u8>::new("zero")
        .with_unhandled_task_capacity(0)
        .build();
    assert!(matches!(zero, Err(SchedulerError::InvalidConfig(_))));

    let counter: Arc<dyn ObjectCounter> = Arc::new(StandardObjectCounter::default());
    let both = TaskSchedulerBuilder::<u8>::new("both")
        .with_unhandled_task_capacity(4)
        .with_on_ramp(counter)
        .build();
    assert!(matches!(both, Err(SchedulerError::InvalidConfig(_))));

    let batch = TaskSchedulerBuilder::<u8>::new("batch")
        .with_type(TaskSchedulerType::Concurrent)
        .with_batch_size(8)
        .build();
    assert!(matches!(batch, Err(SchedulerError::InvalidConfig(_))));
}

#[test]
fn test_separate_on_and_off_ramps() {
    let on: Arc<dyn ObjectCounter> = Arc::new(StandardObjectCounter::default());
    let off: Arc<dyn ObjectCounter> = Arc::new(StandardObjectCounter::default());
    let scheduler = TaskSchedulerBuilder::<u8>::new("split_ramps")
        .with_type(TaskSchedulerType::Direct)
        .with_on_ramp(Arc::clone(&on))
        .with_off_ramp(Arc::clone(&off))
        .build()
        .unwrap();

    // Something downstream releases `on`; this scheduler releases `off`.
    off.force_on_ramp(1);
    let h: Handler<u8> = handler(|_| Ok(()));
    scheduler.put(&h, 1).unwrap();

    assert_eq!(on.count(), 1);
    assert_eq!(off.count(), 0);
    assert_eq!(scheduler.unprocessed_task_count(), 1);
}

#[test]
fn test_from_config_applies_every_field() {
    let cfg = SchedulerConfig {
        scheduler_type: TaskSchedulerType::SequentialThread,
        capacity: Some(8),
        flush_enabled: true,
        squelching_enabled: true,
        sleep_duration_ms: Some(5),
        batch_size: Some(4),
    };
    let scheduler = TaskSchedulerBuilder::<u8>::from_config("from_cfg", &cfg)
        .build()
        .unwrap();

    assert_eq!(scheduler.scheduler_type(), TaskSchedulerType::SequentialThread);
    assert_eq!(scheduler.capacity(), Capacity::Bounded(8));
    assert!(scheduler.is_flush_enabled());
    assert!(scheduler.is_squelching_enabled());
    assert!(scheduler.is_insertion_blocking());
    scheduler.stop();
}

#[test]
fn test_build_schedulers_from_wiring_config() {
    let mut cfg = WiringConfig {
        pool: WorkerPoolConfig::new().with_worker_count(2),
        ..WiringConfig::default()
    };
    for (name, kind) in [
        ("intake", TaskSchedulerType::Sequential),
        ("verify", TaskSchedulerType::Concurrent),
        ("persist", TaskSchedulerType::SequentialThread),
        ("inline", TaskSchedulerType::Direct),
        ("disabled", TaskSchedulerType::NoOp),
    ] {
        cfg.schedulers.insert(
            name.to_string(),
            SchedulerConfig {
                scheduler_type: kind,
                flush_enabled: kind != TaskSchedulerType::Direct,
                ..SchedulerConfig::default()
            },
        );
    }

    let failures = Arc::new(AtomicUsize::new(0));
    let sinks_built = Arc::new(AtomicUsize::new(0));
    let schedulers = build_schedulers::<u32, _>(&cfg, |name| {
        sinks_built.fetch_add(1, Ordering::SeqCst);
        if name == "verify" {
            let failures = Arc::clone(&failures);
            Arc::new(move |_: &Thread, _: HandlerFailure| {
                failures.fetch_add(1, Ordering::SeqCst);
            }) as Arc<dyn UncaughtErrorHandler>
        } else {
            Arc::new(LoggingErrorHandler::new(name))
        }
    })
    .unwrap();

    assert_eq!(schedulers.len(), 5);
    assert_eq!(sinks_built.load(Ordering::SeqCst), 5);
    assert_eq!(
        schedulers["persist"].scheduler_type(),
        TaskSchedulerType::SequentialThread
    );

    let failing: Handler<u32> = handler(|x| anyhow::bail!("cannot verify {x}"));
    schedulers["verify"].put(&failing, 7).unwrap();
    schedulers["verify"].flush().unwrap();
    assert_eq!(failures.load(Ordering::SeqCst), 1);

    for scheduler in schedulers.values() {
        scheduler.stop();
    }
}

#[test]
fn test_build_schedulers_rejects_invalid_config() {
    let cfg = WiringConfig::default();
    let result = build_schedulers::<u32, _>(&cfg, |name| {
        Arc::new(LoggingErrorHandler::new(name)) as Arc<dyn UncaughtErrorHandler>
    });
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}
