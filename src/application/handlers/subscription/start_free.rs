//! StartFreeHandler - puts an account on the catalog's free tier.

use std::sync::Arc;

use tracing::info;

use crate::application::lifecycle::SubscriptionLifecycle;
use crate::application::metering::MeteringEngine;
use crate::domain::catalog::PlanCatalog;
use crate::domain::foundation::{AccountId, SubscriptionId};
use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::ports::Clock;

use super::release_replaceable;

#[derive(Debug, Clone)]
pub struct StartFreeCommand {
    pub account_id: AccountId,
}

#[derive(Debug, Clone)]
pub struct StartFreeResult {
    pub subscription: Subscription,
}

pub struct StartFreeHandler {
    lifecycle: Arc<SubscriptionLifecycle>,
    metering: Arc<MeteringEngine>,
    catalog: Arc<PlanCatalog>,
    clock: Arc<dyn Clock>,
}

impl StartFreeHandler {
    pub fn new(
        lifecycle: Arc<SubscriptionLifecycle>,
        metering: Arc<MeteringEngine>,
        catalog: Arc<PlanCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            lifecycle,
            metering,
            catalog,
            clock,
        }
    }

    pub async fn handle(&self, cmd: StartFreeCommand) -> Result<StartFreeResult, SubscriptionError> {
        let now = self.clock.now();

        release_replaceable(&self.lifecycle, &self.catalog, &cmd.account_id, now, false).await?;

        let subscription = Subscription::start_free(
            SubscriptionId::new(),
            cmd.account_id,
            self.catalog.free_tier().clone(),
            now,
        );
        self.lifecycle.repository().insert(&subscription).await?;
        self.metering
            .rollover_if_needed(&subscription.account_id, &subscription.current_period())
            .await?;

        info!(
            subscription_id = %subscription.id,
            account_id = %subscription.account_id,
            tier = %subscription.tier,
            "Free subscription started"
        );

        Ok(StartFreeResult { subscription })
    }
}
