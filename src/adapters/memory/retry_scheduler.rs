//! Retry scheduler that only records what it was asked to schedule.
//!
//! Deployments wire a real timer that calls the confirm endpoint at
//! `fire_at`; this adapter backs tests and single-node development.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::foundation::{DomainError, SubscriptionId};
use crate::ports::{RetryScheduler, ScheduledRetry};

#[derive(Default)]
pub struct RecordingRetryScheduler {
    scheduled: Mutex<Vec<ScheduledRetry>>,
}

impl RecordingRetryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every retry scheduled so far, in order.
    pub async fn scheduled(&self) -> Vec<ScheduledRetry> {
        self.scheduled.lock().await.clone()
    }

    pub async fn scheduled_for(&self, subscription_id: &SubscriptionId) -> Vec<ScheduledRetry> {
        self.scheduled
            .lock()
            .await
            .iter()
            .filter(|r| &r.subscription_id == subscription_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RetryScheduler for RecordingRetryScheduler {
    async fn schedule(&self, retry: ScheduledRetry) -> Result<(), DomainError> {
        info!(
            subscription_id = %retry.subscription_id,
            attempt_number = retry.attempt_number,
            fire_at = %retry.fire_at,
            "Billing retry scheduled"
        );
        self.scheduled.lock().await.push(retry);
        Ok(())
    }
}
