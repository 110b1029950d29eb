//! Tests for configuration validation

use taskwire::config::{SchedulerConfig, WiringConfig, WorkerPoolConfig};
use taskwire::scheduler::TaskSchedulerType;

const WIRING: &str = r#"{
    "pool": { "worker_count": 2, "thread_name_prefix": "node" },
    "schedulers": {
        "event_intake": {
            "scheduler_type": "sequential",
            "capacity": 500,
            "flush_enabled": true
        },
        "signature_check": {
            "scheduler_type": "concurrent",
            "capacity": 1000,
            "squelching_enabled": true
        },
        "state_writer": {
            "scheduler_type": "sequential_thread",
            "batch_size": 64,
            "sleep_duration_ms": 2
        },
        "legacy_metrics": { "scheduler_type": "no_op" }
    }
}"#;

#[test]
fn test_wiring_config_from_json() {
    let cfg = WiringConfig::from_json_str(WIRING).unwrap();
    assert_eq!(cfg.pool.worker_count, 2);
    assert_eq!(cfg.pool.thread_name_prefix, "node");
    assert_eq!(
        cfg.pool.max_compensation_threads,
        WorkerPoolConfig::default().max_compensation_threads
    );
    assert_eq!(cfg.schedulers.len(), 4);

    let intake = &cfg.schedulers["event_intake"];
    assert_eq!(intake.scheduler_type, TaskSchedulerType::Sequential);
    assert_eq!(intake.capacity, Some(500));
    assert!(intake.flush_enabled);
    assert!(!intake.squelching_enabled);

    let writer = &cfg.schedulers["state_writer"];
    assert_eq!(writer.batch_size, Some(64));
    assert_eq!(writer.sleep_duration_ms, Some(2));
}

#[test]
fn test_wiring_config_requires_schedulers() {
    let err = WiringConfig::from_json_str(r#"{ "schedulers": {} }"#).unwrap_err();
    assert!(err.contains("at least one scheduler"));
}

#[test]
fn test_wiring_config_rejects_bad_name() {
    let err = WiringConfig::from_json_str(
        r#"{ "schedulers": { "bad-name": { "scheduler_type": "direct" } } }"#,
    )
    .unwrap_err();
    assert!(err.contains("bad-name"));
}

#[test]
fn test_wiring_config_rejects_invalid_pool() {
    let err = WiringConfig::from_json_str(
        r#"{ "pool": { "worker_count": 0 }, "schedulers": { "a": {} } }"#,
    )
    .unwrap_err();
    assert!(err.starts_with("pool invalid"));
}

#[test]
fn test_wiring_config_parse_error() {
    let err = WiringConfig::from_json_str("{ not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_scheduler_config_validation() {
    assert!(SchedulerConfig::default().validate().is_ok());

    let zero_capacity = SchedulerConfig {
        capacity: Some(0),
        ..SchedulerConfig::default()
    };
    assert!(zero_capacity.validate().is_err());

    let zero_sleep = SchedulerConfig {
        sleep_duration_ms: Some(0),
        ..SchedulerConfig::default()
    };
    assert!(zero_sleep.validate().is_err());

    let bounded_no_op = SchedulerConfig {
        scheduler_type: TaskSchedulerType::NoOp,
        capacity: Some(10),
        ..SchedulerConfig::default()
    };
    assert!(bounded_no_op.validate().is_err());
}

#[test]
fn test_scheduler_type_round_trips_through_json() {
    let cfg = SchedulerConfig {
        scheduler_type: TaskSchedulerType::DirectThreadsafe,
        ..SchedulerConfig::default()
    };
    let json = serde_json::to_string(&cfg).unwrap();
    assert!(json.contains("\"direct_threadsafe\""));
    let parsed: SchedulerConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, cfg);
}
