//! Squelch gate: cooperative suppression of a scheduler's work.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::SchedulerError;

/// Suppression flag owned by a single scheduler.
///
/// The supporting variant toggles between inactive (initial) and active; each transition
/// is only legal from the opposite state. The unsupported variant rejects both
/// transitions and never reports squelching.
#[derive(Debug)]
pub enum Squelcher {
    /// Squelching is supported; the flag holds the current state.
    Supported(AtomicBool),
    /// Squelching is not supported by this scheduler.
    Unsupported,
}

impl Squelcher {
    /// Creates a gate for a scheduler with the given squelching support.
    #[must_use]
    pub const fn new(squelching_enabled: bool) -> Self {
        if squelching_enabled {
            Self::Supported(AtomicBool::new(false))
        } else {
            Self::Unsupported
        }
    }

    /// Activates squelching.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::SquelchingDisabled` for the unsupported variant
    /// - `SchedulerError::AlreadySquelching` if the gate is already active
    pub fn start_squelching(&self, name: &str) -> Result<(), SchedulerError> {
        match self {
            Self::Supported(flag) => flag
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .map(|_| ())
                .map_err(|_| SchedulerError::AlreadySquelching(name.to_string())),
            Self::Unsupported => Err(SchedulerError::SquelchingDisabled(name.to_string())),
        }
    }

    /// Deactivates squelching.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::SquelchingDisabled` for the unsupported variant
    /// - `SchedulerError::NotSquelching` if the gate is not active
    pub fn stop_squelching(&self, name: &str) -> Result<(), SchedulerError> {
        match self {
            Self::Supported(flag) => flag
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .map(|_| ())
                .map_err(|_| SchedulerError::NotSquelching(name.to_string())),
            Self::Unsupported => Err(SchedulerError::SquelchingDisabled(name.to_string())),
        }
    }

    /// Current state of the gate.
    #[must_use]
    pub fn should_squelch(&self) -> bool {
        match self {
            Self::Supported(flag) => flag.load(Ordering::Acquire),
            Self::Unsupported => false,
        }
    }

    /// Whether this gate accepts transitions at all.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        matches!(self, Self::Supported(_))
    }
}
