//! Half-open billing period value object.

use serde::{Deserialize, Serialize};

use super::{Timestamp, ValidationError};

/// A billing period `[start, end)`.
///
/// Usage counters and subscription bounds are both keyed by this type, so a
/// period's `start` doubles as the identity of the usage records it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl BillingPeriod {
    /// Creates a period, rejecting empty or inverted ranges.
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::invalid_format(
                "period",
                format!("period end {} must be after start {}", end, start),
            ));
        }
        Ok(Self { start, end })
    }

    /// Returns true if `at` falls inside the period.
    pub fn contains(&self, at: Timestamp) -> bool {
        at >= self.start && at < self.end
    }

    /// Returns true once `at` has reached the period end.
    pub fn has_ended(&self, at: Timestamp) -> bool {
        at >= self.end
    }
}
