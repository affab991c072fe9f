//! CheckAccessHandler - the authoritative "may this account use this now?".
//!
//! Denials that follow from the subscription alone (none, canceled,
//! checkout incomplete, not in plan) never touch the usage store.

use std::sync::Arc;

use tracing::debug;

use crate::application::lifecycle::SubscriptionLifecycle;
use crate::application::metering::{MeteringEngine, QuotaResolver};
use crate::domain::catalog::{Quota, UsageType};
use crate::domain::foundation::AccountId;
use crate::domain::metering::{AccessDecision, DenyReason};
use crate::domain::subscription::{SubscriptionError, SubscriptionStatus};
use crate::ports::Clock;

#[derive(Debug, Clone)]
pub struct CheckAccessQuery {
    pub account_id: AccountId,
    pub usage_type: UsageType,
}

pub struct CheckAccessHandler {
    lifecycle: Arc<SubscriptionLifecycle>,
    metering: Arc<MeteringEngine>,
    quotas: Arc<QuotaResolver>,
    clock: Arc<dyn Clock>,
}

impl CheckAccessHandler {
    pub fn new(
        lifecycle: Arc<SubscriptionLifecycle>,
        metering: Arc<MeteringEngine>,
        quotas: Arc<QuotaResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            lifecycle,
            metering,
            quotas,
            clock,
        }
    }

    pub async fn handle(&self, query: CheckAccessQuery) -> Result<AccessDecision, SubscriptionError> {
        let now = self.clock.now();
        let usage_type = query.usage_type;

        let subscription = match self
            .lifecycle
            .repository()
            .find_latest_by_account(&query.account_id)
            .await?
        {
            Some(s) => s,
            None => return Ok(deny(&query, DenyReason::NoSubscription)),
        };

        match subscription.status {
            SubscriptionStatus::Canceled => {
                return Ok(deny(&query, DenyReason::SubscriptionCanceled))
            }
            SubscriptionStatus::Incomplete => {
                return Ok(deny(&query, DenyReason::CheckoutIncomplete))
            }
            _ => {}
        }

        let subscription = self.lifecycle.bring_current(subscription, now).await?;
        if subscription.status == SubscriptionStatus::Canceled {
            return Ok(deny(&query, DenyReason::SubscriptionCanceled));
        }

        let limit = self.quotas.limit_for(&subscription, usage_type)?;
        if limit.is_zero() {
            return Ok(AccessDecision::denied_upfront(
                usage_type,
                DenyReason::NotIncludedInPlan,
                limit,
            ));
        }

        let period = subscription.current_period();
        let outcome = self
            .metering
            .try_consume(&query.account_id, usage_type, &period, limit)
            .await?;

        debug!(
            account_id = %query.account_id,
            usage_type = %usage_type,
            tier = %subscription.tier,
            allowed = outcome.allowed,
            "Access checked"
        );

        Ok(AccessDecision::from_outcome(usage_type, outcome, period.end))
    }
}

fn deny(query: &CheckAccessQuery, reason: DenyReason) -> AccessDecision {
    debug!(
        account_id = %query.account_id,
        usage_type = %query.usage_type,
        reason = ?reason,
        "Access denied before metering"
    );
    AccessDecision::denied_upfront(query.usage_type, reason, Quota::Limited(0))
}
