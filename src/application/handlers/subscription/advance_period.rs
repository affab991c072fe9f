//! AdvancePeriodHandler - forces the lazy rollover for an account.

use std::sync::Arc;

use crate::application::lifecycle::SubscriptionLifecycle;
use crate::domain::foundation::AccountId;
use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::ports::Clock;

#[derive(Debug, Clone)]
pub struct AdvancePeriodCommand {
    pub account_id: AccountId,
}

#[derive(Debug, Clone)]
pub struct AdvancePeriodResult {
    pub subscription: Subscription,
    /// True if the period or status moved.
    pub advanced: bool,
}

pub struct AdvancePeriodHandler {
    lifecycle: Arc<SubscriptionLifecycle>,
    clock: Arc<dyn Clock>,
}

impl AdvancePeriodHandler {
    pub fn new(lifecycle: Arc<SubscriptionLifecycle>, clock: Arc<dyn Clock>) -> Self {
        Self { lifecycle, clock }
    }

    pub async fn handle(&self, cmd: AdvancePeriodCommand) -> Result<AdvancePeriodResult, SubscriptionError> {
        let before = self
            .lifecycle
            .repository()
            .find_latest_by_account(&cmd.account_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found_for_account(cmd.account_id.clone()))?;

        let (start, status) = (before.current_period_start, before.status);
        let subscription = self.lifecycle.bring_current(before, self.clock.now()).await?;
        let advanced = subscription.current_period_start != start || subscription.status != status;

        Ok(AdvancePeriodResult {
            subscription,
            advanced,
        })
    }
}
