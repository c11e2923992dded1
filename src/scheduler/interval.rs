//! Interval adaptation and the live-hours window.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

use crate::config::SchedulerConfig;
use crate::source::{is_valid_interval, UPDATE_STEP};
use crate::{PollerError, Result};

/// Result of one poll, as far as interval adaptation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Failed,
    Empty,
    Yielded(usize),
}

impl PollOutcome {
    pub fn from_result<T, E>(result: &std::result::Result<Vec<T>, E>) -> Self {
        match result {
            Err(_) => Self::Failed,
            Ok(items) if items.is_empty() => Self::Empty,
            Ok(items) => Self::Yielded(items.len()),
        }
    }
}

/// Interval to use after a poll with the given outcome.
///
/// Failures back off by one step, empty polls by two, productive polls
/// speed up by one. A result outside the allowed range keeps `current`.
pub fn next_interval(current: i64, outcome: PollOutcome) -> i64 {
    let candidate = match outcome {
        PollOutcome::Failed => current + UPDATE_STEP,
        PollOutcome::Empty => current + 2 * UPDATE_STEP,
        PollOutcome::Yielded(_) => current - UPDATE_STEP,
    };
    if is_valid_interval(candidate) {
        candidate
    } else {
        current
    }
}

/// Hours of the day during which intervals adapt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiveHours {
    start: u32,
    end: u32,
    tz: Tz,
}

impl LiveHours {
    /// Window from `start` to `end` o'clock inclusive, in `tz`.
    pub fn new(start: u32, end: u32, tz: Tz) -> Self {
        Self { start, end, tz }
    }

    /// A window that is always open.
    pub fn always() -> Self {
        Self::new(0, 23, Tz::UTC)
    }

    pub fn from_config(config: &SchedulerConfig) -> Result<Self> {
        let tz: Tz = config
            .timezone
            .parse()
            .map_err(|_| PollerError::Config(format!("unknown timezone: {}", config.timezone)))?;
        Ok(Self::new(config.live_hours_start, config.live_hours_end, tz))
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let hour = now.with_timezone(&self.tz).hour();
        (self.start..=self.end).contains(&hour)
    }
}
