use std::time::Duration;

use thiserror::Error;

use crate::shared::constants::{
    DEFAULT_POLL_INTERVAL, DEFAULT_REQUIRED_HITS, DEFAULT_RETRY_INTERVAL,
    DEFAULT_THRESHOLD_PERCENT,
};

#[derive(Error, Debug, PartialEq)]
pub enum PolicyError {
    #[error("threshold must be between 0 and 100 percent, got {0}")]
    ThresholdOutOfRange(f64),
    #[error("required consecutive hits must be at least 1")]
    ZeroRequiredHits,
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

/// Tunable verification policy for one session.
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationPolicy {
    /// Minimum similarity (0-100) for a verified observation to count.
    pub threshold_percent: f64,
    /// Consecutive positive observations needed to auto-capture.
    pub required_hits: u32,
    /// Delay before the next poll after a scorer round-trip.
    pub poll_interval: Duration,
    /// Delay when no frame was available or a request is in flight.
    pub retry_interval: Duration,
    /// Run an auto-captured frame through the one-shot preview.
    pub preview_auto_capture: bool,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            required_hits: DEFAULT_REQUIRED_HITS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            preview_auto_capture: false,
        }
    }
}

impl VerificationPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !(0.0..=100.0).contains(&self.threshold_percent) {
            return Err(PolicyError::ThresholdOutOfRange(self.threshold_percent));
        }
        if self.required_hits == 0 {
            return Err(PolicyError::ZeroRequiredHits);
        }
        if self.poll_interval.is_zero() {
            return Err(PolicyError::ZeroInterval("poll interval"));
        }
        if self.retry_interval.is_zero() {
            return Err(PolicyError::ZeroInterval("retry interval"));
        }
        Ok(())
    }
}
