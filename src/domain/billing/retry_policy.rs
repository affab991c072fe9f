//! Retry budget and delay curve for failed charges.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, ValidationError};

/// What to do after a failed charge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again at `at`; `failures` counts this episode so far.
    Retry { at: Timestamp, failures: u32 },
    /// Budget spent; the subscription is canceled.
    Exhausted { failures: u32 },
}

/// Exponential backoff with a cap.
///
/// The `n`-th failure of an episode waits
/// `min(base_delay * multiplier^(n-1), max_delay)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_secs: u64,
    pub multiplier: u32,
    pub max_delay_secs: u64,
}

impl RetryPolicy {
    pub fn new(
        max_retries: u32,
        base_delay_secs: u64,
        multiplier: u32,
        max_delay_secs: u64,
    ) -> Result<Self, ValidationError> {
        if max_retries == 0 || max_retries > 20 {
            return Err(ValidationError::out_of_range("max_retries", 1, 20, i64::from(max_retries)));
        }
        if multiplier == 0 {
            return Err(ValidationError::out_of_range("multiplier", 1, 10, 0));
        }
        if base_delay_secs == 0 || max_delay_secs < base_delay_secs {
            return Err(ValidationError::invalid_format(
                "retry_delay",
                "base delay must be positive and not exceed max delay",
            ));
        }
        Ok(Self {
            max_retries,
            base_delay_secs,
            multiplier,
            max_delay_secs,
        })
    }

    /// Delay before retrying after the `failure`-th failure (1-based).
    pub fn delay_for(&self, failure: u32) -> Duration {
        let exponent = failure.saturating_sub(1);
        let factor = u64::from(self.multiplier).saturating_pow(exponent);
        let secs = self.base_delay_secs.saturating_mul(factor).min(self.max_delay_secs);
        Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1_000))
    }

    /// Decide after a failure. `failures` includes the one just observed.
    pub fn decide(&self, failures: u32, failed_at: Timestamp) -> RetryDecision {
        if failures >= self.max_retries {
            RetryDecision::Exhausted { failures }
        } else {
            RetryDecision::Retry {
                at: failed_at.plus(self.delay_for(failures)),
                failures,
            }
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts, one hour doubling, capped at a day.
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_secs: 3_600,
            multiplier: 2,
            max_delay_secs: 86_400,
        }
    }
}
