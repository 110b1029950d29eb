//! Tests for the squelch gate

use taskwire::core::{SchedulerError, Squelcher};

#[test]
fn test_supported_gate_transitions() {
    let gate = Squelcher::new(true);
    assert!(gate.is_supported());
    assert!(!gate.should_squelch());

    gate.start_squelching("gate").unwrap();
    assert!(gate.should_squelch());
    assert!(matches!(
        gate.start_squelching("gate"),
        Err(SchedulerError::AlreadySquelching(_))
    ));

    gate.stop_squelching("gate").unwrap();
    assert!(!gate.should_squelch());
    assert!(matches!(
        gate.stop_squelching("gate"),
        Err(SchedulerError::NotSquelching(_))
    ));
}

#[test]
fn test_unsupported_gate_never_squelches() {
    let gate = Squelcher::new(false);
    assert!(!gate.is_supported());
    assert!(matches!(
        gate.start_squelching("off"),
        Err(SchedulerError::SquelchingDisabled(name)) if name == "off"
    ));
    assert!(matches!(
        gate.stop_squelching("off"),
        Err(SchedulerError::SquelchingDisabled(_))
    ));
    assert!(!gate.should_squelch());
}

#[test]
fn test_only_one_concurrent_start_wins() {
    let gate = std::sync::Arc::new(Squelcher::new(true));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let gate = std::sync::Arc::clone(&gate);
            std::thread::spawn(move || gate.start_squelching("race").is_ok())
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}
