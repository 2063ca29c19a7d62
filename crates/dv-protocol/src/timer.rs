//! Millisecond countdown timer
//!
//! Timers never fire on their own: the owner feeds elapsed time through
//! [`Timer::clock`] and polls [`Timer::has_expired`]. An expired timer
//! stays expired until it is re-armed with [`Timer::start`].

use std::time::Duration;

/// Countdown timer driven by explicit clock ticks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timer {
    timeout_ms: u64,
    elapsed_ms: u64,
    running: bool,
}

impl Timer {
    /// Create a stopped timer with the given timeout
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout_ms: timeout.as_millis() as u64,
            elapsed_ms: 0,
            running: false,
        }
    }

    /// Create a stopped timer whose timeout is given in hours
    ///
    /// Used by the ID lookup tables, whose reload period is configured in hours.
    pub fn from_hours(hours: u32) -> Self {
        Self::new(Duration::from_secs(u64::from(hours) * 3600))
    }

    /// Replace the timeout; does not change the running state
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout_ms = timeout.as_millis() as u64;
    }

    /// Configured timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Arm the timer from zero
    ///
    /// A zero timeout leaves the timer stopped.
    pub fn start(&mut self) {
        self.elapsed_ms = 0;
        self.running = self.timeout_ms > 0;
    }

    /// Stop the timer
    pub fn stop(&mut self) {
        self.elapsed_ms = 0;
        self.running = false;
    }

    /// Advance the timer by `ms` milliseconds
    pub fn clock(&mut self, ms: u64) {
        if self.running {
            self.elapsed_ms = self.elapsed_ms.saturating_add(ms);
        }
    }

    /// Whether the timer is armed
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether an armed timer has reached its timeout
    pub fn has_expired(&self) -> bool {
        self.running && self.elapsed_ms >= self.timeout_ms
    }

    /// Time left before expiry, zero when stopped or expired
    pub fn remaining(&self) -> Duration {
        if !self.running {
            return Duration::ZERO;
        }
        Duration::from_millis(self.timeout_ms.saturating_sub(self.elapsed_ms))
    }
}
