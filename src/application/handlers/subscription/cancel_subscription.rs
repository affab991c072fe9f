//! CancelSubscriptionHandler - immediate or end-of-period cancellation.

use std::sync::Arc;

use tracing::info;

use crate::application::lifecycle::SubscriptionLifecycle;
use crate::domain::foundation::{AccountId, Timestamp};
use crate::domain::subscription::{ChangeTiming, Subscription, SubscriptionError};
use crate::ports::Clock;

use super::load_live;

#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub account_id: AccountId,
    pub timing: ChangeTiming,
}

#[derive(Debug, Clone)]
pub struct CancelSubscriptionResult {
    pub subscription: Subscription,
    pub effective_at: Timestamp,
}

pub struct CancelSubscriptionHandler {
    lifecycle: Arc<SubscriptionLifecycle>,
    clock: Arc<dyn Clock>,
}

impl CancelSubscriptionHandler {
    pub fn new(lifecycle: Arc<SubscriptionLifecycle>, clock: Arc<dyn Clock>) -> Self {
        Self { lifecycle, clock }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, SubscriptionError> {
        let now = self.clock.now();
        let current = load_live(&self.lifecycle, &cmd.account_id, now).await?;

        let (subscription, effective_at) = self
            .lifecycle
            .modify(current.id, now, |s| match cmd.timing {
                ChangeTiming::Immediate => {
                    s.cancel(now)?;
                    Ok(now)
                }
                ChangeTiming::AtPeriodEnd => Ok(s.schedule_cancel(now)?),
            })
            .await?;

        info!(
            subscription_id = %subscription.id,
            account_id = %subscription.account_id,
            timing = ?cmd.timing,
            effective_at = %effective_at,
            "Subscription cancellation recorded"
        );

        Ok(CancelSubscriptionResult {
            subscription,
            effective_at,
        })
    }
}
