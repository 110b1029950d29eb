//! Busy/occupancy timers toggled around handler execution.

use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::warn;

/// Tracks how much of the time a scheduler spends running handlers.
pub trait BusyTimer: Send + Sync {
    /// Marks the start of a handler invocation.
    fn activate(&self);
    /// Marks the end of a handler invocation.
    fn deactivate(&self);
}

/// Timer that records nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpBusyTimer;

impl BusyTimer for NoOpBusyTimer {
    fn activate(&self) {}

    fn deactivate(&self) {}
}

#[derive(Debug)]
struct BusyState {
    /// Number of overlapping activations currently open.
    active: u32,
    /// When the timer last went from idle to busy.
    busy_since: Option<Instant>,
    /// Busy time accumulated since `window_start`, excluding the open interval.
    accumulated: Duration,
    /// Start of the current measurement window.
    window_start: Instant,
}

/// Timer that measures the fraction of wall-clock time with at least one active handler.
///
/// Overlapping activations from concurrent workers count once.
#[derive(Debug)]
pub struct StandardBusyTimer {
    state: Mutex<BusyState>,
}

impl Default for StandardBusyTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardBusyTimer {
    /// Creates an idle timer whose measurement window starts now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BusyState {
                active: 0,
                busy_since: None,
                accumulated: Duration::ZERO,
                window_start: Instant::now(),
            }),
        }
    }

    /// Total busy time in the current window, including any open interval.
    #[must_use]
    pub fn busy_time(&self) -> Duration {
        let state = self.state.lock();
        let now = Instant::now();
        state.accumulated + state.busy_since.map_or(Duration::ZERO, |since| now - since)
    }

    /// Fraction (0.0..=1.0) of the current window spent busy.
    #[must_use]
    pub fn busy_fraction(&self) -> f64 {
        let state = self.state.lock();
        Self::fraction(&state, Instant::now())
    }

    /// Returns the busy fraction of the current window and starts a new one.
    pub fn busy_fraction_and_reset(&self) -> f64 {
        let mut state = self.state.lock();
        let now = Instant::now();
        let fraction = Self::fraction(&state, now);
        state.accumulated = Duration::ZERO;
        state.window_start = now;
        if state.busy_since.is_some() {
            state.busy_since = Some(now);
        }
        fraction
    }

    fn fraction(state: &BusyState, now: Instant) -> f64 {
        let window = now - state.window_start;
        if window.is_zero() {
            return 0.0;
        }
        let busy = state.accumulated + state.busy_since.map_or(Duration::ZERO, |since| now - since);
        (busy.as_secs_f64() / window.as_secs_f64()).clamp(0.0, 1.0)
    }
}

impl BusyTimer for StandardBusyTimer {
    fn activate(&self) {
        let mut state = self.state.lock();
        if state.active == 0 {
            state.busy_since = Some(Instant::now());
        }
        state.active += 1;
    }

    fn deactivate(&self) {
        let mut state = self.state.lock();
        if state.active == 0 {
            warn!("busy timer deactivated while idle");
            return;
        }
        state.active -= 1;
        if state.active == 0 {
            if let Some(since) = state.busy_since.take() {
                state.accumulated += since.elapsed();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_idle_timer_reports_zero() {
        let timer = StandardBusyTimer::new();
        thread::sleep(Duration::from_millis(5));
        assert_eq!(timer.busy_time(), Duration::ZERO);
        assert!(timer.busy_fraction() < f64::EPSILON);
    }

    #[test]
    fn test_busy_interval_is_accumulated() {
        let timer = StandardBusyTimer::new();
        timer.activate();
        thread::sleep(Duration::from_millis(20));
        timer.deactivate();
        assert!(timer.busy_time() >= Duration::from_millis(20));

        let fraction = timer.busy_fraction_and_reset();
        assert!(fraction > 0.0 && fraction <= 1.0);
        assert_eq!(timer.busy_time(), Duration::ZERO);
    }

    #[test]
    fn test_overlapping_activations_count_once() {
        let timer = StandardBusyTimer::new();
        timer.activate();
        timer.activate();
        thread::sleep(Duration::from_millis(10));
        timer.deactivate();
        // still busy: one activation open
        let open = timer.busy_time();
        timer.deactivate();
        assert!(timer.busy_time() >= open);
        assert!(timer.busy_fraction() <= 1.0);
    }

    #[test]
    fn test_unbalanced_deactivate_is_ignored() {
        let timer = StandardBusyTimer::new();
        timer.deactivate();
        assert_eq!(timer.busy_time(), Duration::ZERO);
    }
}
