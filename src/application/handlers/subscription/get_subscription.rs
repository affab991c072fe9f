//! GetSubscriptionHandler - plan display read model.

use std::sync::Arc;

use serde::Serialize;

use crate::application::lifecycle::SubscriptionLifecycle;
use crate::domain::catalog::{BillingInterval, PlanCatalog, TierId};
use crate::domain::foundation::{AccountId, SubscriptionId, Timestamp};
use crate::domain::subscription::{SubscriptionError, SubscriptionStatus};
use crate::ports::Clock;

#[derive(Debug, Clone)]
pub struct GetSubscriptionQuery {
    pub account_id: AccountId,
}

/// What the presentation layer shows on the plan page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionView {
    pub subscription_id: SubscriptionId,
    pub account_id: AccountId,
    pub tier: TierId,
    pub tier_name: String,
    pub rank: u8,
    pub status: SubscriptionStatus,
    pub has_access: bool,
    pub interval: BillingInterval,
    /// Price of one period, in minor currency units.
    pub price: i64,
    pub current_period_start: Timestamp,
    pub current_period_end: Timestamp,
    pub cancel_at: Option<Timestamp>,
    pub canceled_at: Option<Timestamp>,
    pub pending_tier: Option<TierId>,
    pub is_trial: bool,
    pub trial_ends_at: Option<Timestamp>,
}

pub struct GetSubscriptionHandler {
    lifecycle: Arc<SubscriptionLifecycle>,
    catalog: Arc<PlanCatalog>,
    clock: Arc<dyn Clock>,
}

impl GetSubscriptionHandler {
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

    pub async fn handle(&self, query: GetSubscriptionQuery) -> Result<SubscriptionView, SubscriptionError> {
        let subscription = self
            .lifecycle
            .repository()
            .find_latest_by_account(&query.account_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found_for_account(query.account_id.clone()))?;
        let subscription = self.lifecycle.bring_current(subscription, self.clock.now()).await?;

        let plan = self.catalog.plan(&subscription.tier)?;

        Ok(SubscriptionView {
            subscription_id: subscription.id,
            tier_name: plan.display_name.clone(),
            rank: plan.rank,
            price: plan.price(subscription.interval),
            has_access: subscription.status.grants_access(),
            is_trial: subscription.is_trialing(),
            account_id: subscription.account_id,
            tier: subscription.tier,
            status: subscription.status,
            interval: subscription.interval,
            current_period_start: subscription.current_period_start,
            current_period_end: subscription.current_period_end,
            cancel_at: subscription.cancel_at,
            canceled_at: subscription.canceled_at,
            pending_tier: subscription.pending_tier,
            trial_ends_at: subscription.trial_ends_at,
        })
    }
}
