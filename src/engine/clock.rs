//! Simulation clock management.
//!
//! The clock moves in whole ticks, never backward, and never past the
//! global timeout. Every advance is checked and a violation is returned as
//! a temporal consistency fault instead of being clamped.

use serde::{Deserialize, Serialize};

use crate::engine::SimTime;
use crate::error::{SimError, SimResult};

/// Simulation clock bounded by a global timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimClock {
    /// Current simulation time.
    current: SimTime,
    /// Global horizon.
    timeout: SimTime,
    /// Number of advances taken.
    step_count: u64,
}

impl SimClock {
    /// Create a new clock at time zero with the given horizon.
    #[must_use]
    pub const fn new(timeout: SimTime) -> Self {
        Self {
            current: SimTime::ZERO,
            timeout,
            step_count: 0,
        }
    }

    /// Get current simulation time.
    #[must_use]
    pub const fn current_time(&self) -> SimTime {
        self.current
    }

    /// Get the global timeout.
    #[must_use]
    pub const fn timeout(&self) -> SimTime {
        self.timeout
    }

    /// Get number of advances taken.
    #[must_use]
    pub const fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Check if the clock has reached the timeout.
    #[must_use]
    pub fn at_timeout(&self) -> bool {
        self.current >= self.timeout
    }

    /// Advance the clock to `until`.
    ///
    /// Returns the elapsed ticks, which may be zero.
    ///
    /// # Errors
    ///
    /// - `ClockBackward` if `until` is before the current time.
    /// - `TimeoutExceeded` if `until` is past the timeout.
    pub fn advance_to(&mut self, until: SimTime) -> SimResult<u64> {
        let elapsed = until
            .ticks_since(self.current)
            .ok_or_else(|| SimError::ClockBackward {
                current: self.current,
                requested: until,
            })?;

        if until > self.timeout {
            return Err(SimError::TimeoutExceeded {
                time: until,
                timeout: self.timeout,
            });
        }

        tracing::trace!(from = %self.current, to = %until, elapsed, "advance clock");
        self.current = until;
        self.step_count += 1;
        Ok(elapsed)
    }
}
