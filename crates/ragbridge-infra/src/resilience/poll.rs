//! Fixed-interval polling schedule
//!
//! Attempts are numbered from 1. The schedule polls first and sleeps afterwards,
//! and never sleeps after the final attempt.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    interval: Duration,
    max_attempts: u32,
}

impl PollSchedule {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after `attempt`, or `None` when the budget is spent
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt < self.max_attempts {
            Some(self.interval)
        } else {
            None
        }
    }

    /// Nominal wall-clock ceiling of the whole schedule
    pub fn ceiling(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts)
    }

    pub fn attempts(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.max_attempts
    }
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), 60)
    }
}
