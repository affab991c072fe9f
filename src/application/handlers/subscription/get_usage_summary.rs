//! GetUsageSummaryHandler - per-feature usage for the current period.
//!
//! Read-only with respect to counters: it never consumes quota.

use std::sync::Arc;

use serde::Serialize;

use crate::application::lifecycle::SubscriptionLifecycle;
use crate::application::metering::{MeteringEngine, QuotaResolver};
use crate::domain::catalog::{Quota, TierId, UsageType};
use crate::domain::foundation::{AccountId, Timestamp};
use crate::domain::subscription::{SubscriptionError, SubscriptionStatus};
use crate::ports::Clock;

#[derive(Debug, Clone)]
pub struct GetUsageSummaryQuery {
    pub account_id: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageLine {
    pub usage_type: UsageType,
    pub used: u32,
    pub limit: Quota,
    pub remaining: Option<u32>,
    pub reset_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub account_id: AccountId,
    pub tier: TierId,
    pub status: SubscriptionStatus,
    pub period_start: Timestamp,
    pub period_end: Timestamp,
    pub usage: Vec<UsageLine>,
}

pub struct GetUsageSummaryHandler {
    lifecycle: Arc<SubscriptionLifecycle>,
    metering: Arc<MeteringEngine>,
    quotas: Arc<QuotaResolver>,
    clock: Arc<dyn Clock>,
}

impl GetUsageSummaryHandler {
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

    pub async fn handle(&self, query: GetUsageSummaryQuery) -> Result<UsageSummary, SubscriptionError> {
        let subscription = self
            .lifecycle
            .repository()
            .find_latest_by_account(&query.account_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found_for_account(query.account_id.clone()))?;
        let subscription = self.lifecycle.bring_current(subscription, self.clock.now()).await?;
        let period = subscription.current_period();

        let mut usage = Vec::with_capacity(UsageType::ALL.len());
        for usage_type in UsageType::ALL {
            let limit = if subscription.status.grants_access() {
                self.quotas.limit_for(&subscription, usage_type)?
            } else {
                Quota::Limited(0)
            };
            let used = self
                .metering
                .current_usage(&subscription.account_id, usage_type, &period)
                .await?;
            usage.push(UsageLine {
                usage_type,
                used,
                limit,
                remaining: limit.remaining(used),
                reset_at: period.end,
            });
        }

        Ok(UsageSummary {
            account_id: subscription.account_id,
            tier: subscription.tier,
            status: subscription.status,
            period_start: period.start,
            period_end: period.end,
            usage,
        })
    }
}
