//! ChangeTierHandler - upgrades and downgrades.
//!
//! An immediate change keeps the current period and its counters; a
//! period-end change is stored as `pending_tier` and applied at rollover.

use std::sync::Arc;

use tracing::info;

use crate::application::lifecycle::SubscriptionLifecycle;
use crate::domain::catalog::{PlanCatalog, TierChange, TierId};
use crate::domain::foundation::{AccountId, Timestamp};
use crate::domain::subscription::{ChangeTiming, Subscription, SubscriptionError};
use crate::ports::Clock;

use super::load_live;

#[derive(Debug, Clone)]
pub struct ChangeTierCommand {
    pub account_id: AccountId,
    pub tier: TierId,
    pub timing: ChangeTiming,
}

#[derive(Debug, Clone)]
pub struct ChangeTierResult {
    pub subscription: Subscription,
    pub change: TierChange,
    pub effective_at: Timestamp,
}

pub struct ChangeTierHandler {
    lifecycle: Arc<SubscriptionLifecycle>,
    catalog: Arc<PlanCatalog>,
    clock: Arc<dyn Clock>,
}

impl ChangeTierHandler {
    pub fn new(
        lifecycle: Arc<SubscriptionLifecycle>,
        catalog: Arc<PlanCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            lifecycle,
            catalog,
            clock,
        }
    }

    pub async fn handle(&self, cmd: ChangeTierCommand) -> Result<ChangeTierResult, SubscriptionError> {
        let now = self.clock.now();
        self.catalog.plan(&cmd.tier)?;

        let current = load_live(&self.lifecycle, &cmd.account_id, now).await?;

        let (subscription, (from, effective_at)) = self
            .lifecycle
            .modify(current.id, now, |s| {
                let from = s.tier.clone();
                let effective_at = match cmd.timing {
                    ChangeTiming::Immediate => {
                        s.change_tier(cmd.tier.clone(), now)?;
                        now
                    }
                    ChangeTiming::AtPeriodEnd => s.schedule_tier_change(cmd.tier.clone(), now)?,
                };
                Ok((from, effective_at))
            })
            .await?;

        let change = self.catalog.compare(&from, &cmd.tier)?;

        info!(
            subscription_id = %subscription.id,
            account_id = %subscription.account_id,
            from = %from,
            to = %cmd.tier,
            change = ?change,
            timing = ?cmd.timing,
            effective_at = %effective_at,
            "Tier change applied"
        );

        Ok(ChangeTierResult {
            subscription,
            change,
            effective_at,
        })
    }
}
