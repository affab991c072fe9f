//! StartCheckoutHandler - opens a paid subscription awaiting its first payment.

use std::sync::Arc;

use tracing::info;

use crate::application::lifecycle::SubscriptionLifecycle;
use crate::domain::catalog::{BillingInterval, PlanCatalog, TierId};
use crate::domain::foundation::{AccountId, SubscriptionId};
use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::ports::Clock;

use super::release_replaceable;

#[derive(Debug, Clone)]
pub struct StartCheckoutCommand {
    pub account_id: AccountId,
    pub tier: TierId,
    pub interval: BillingInterval,
}

#[derive(Debug, Clone)]
pub struct StartCheckoutResult {
    pub subscription: Subscription,
    /// Amount the processor should charge, in minor currency units.
    pub amount_due: i64,
}

/// Creates an `incomplete` subscription. Access starts when the processor
/// reports the first successful charge.
///
/// An existing free subscription is canceled as soon as checkout begins,
/// not when the first charge succeeds. Until then the account is denied
/// with `CheckoutIncomplete`; an abandoned checkout leaves it that way
/// until the account starts free again or checks out once more.
pub struct StartCheckoutHandler {
    lifecycle: Arc<SubscriptionLifecycle>,
    catalog: Arc<PlanCatalog>,
    clock: Arc<dyn Clock>,
}

impl StartCheckoutHandler {
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

    pub async fn handle(&self, cmd: StartCheckoutCommand) -> Result<StartCheckoutResult, SubscriptionError> {
        let now = self.clock.now();

        // 1. Tier must exist and be paid
        let amount_due = self.catalog.price_for(&cmd.tier, cmd.interval)?;
        if self.catalog.is_free(&cmd.tier) {
            return Err(SubscriptionError::validation(
                "tier",
                "The free tier needs no checkout",
            ));
        }

        // 2. Replace a free plan or abandoned checkout; reject anything else.
        //    Free access ends here.
        release_replaceable(&self.lifecycle, &self.catalog, &cmd.account_id, now, true).await?;

        // 3. Persist; the unique live-account constraint settles races
        let subscription = Subscription::start_checkout(
            SubscriptionId::new(),
            cmd.account_id,
            cmd.tier,
            cmd.interval,
            now,
        );
        self.lifecycle.repository().insert(&subscription).await?;

        info!(
            subscription_id = %subscription.id,
            account_id = %subscription.account_id,
            tier = %subscription.tier,
            interval = %subscription.interval,
            amount_due,
            "Checkout started"
        );

        Ok(StartCheckoutResult {
            subscription,
            amount_due,
        })
    }
}
