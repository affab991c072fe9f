//! RetryScheduler port - hands retry timers to an external scheduler.
//!
//! The scheduler fires `confirm_retry` at `fire_at`; whether the retry still
//! applies is decided then, not here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledRetry {
    pub subscription_id: SubscriptionId,
    /// Attempt number of the failure that triggered this retry.
    pub attempt_number: u32,
    pub fire_at: Timestamp,
}

#[async_trait]
pub trait RetryScheduler: Send + Sync {
    async fn schedule(&self, retry: ScheduledRetry) -> Result<(), DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_scheduler_is_object_safe() {
        fn _accepts_dyn(_scheduler: &dyn RetryScheduler) {}
    }
}
