//! GetUsageHistoryHandler - retained per-period records, newest first.

use std::sync::Arc;

use crate::application::metering::MeteringEngine;
use crate::domain::catalog::UsageType;
use crate::domain::foundation::AccountId;
use crate::domain::metering::UsageRecord;
use crate::domain::subscription::SubscriptionError;

#[derive(Debug, Clone)]
pub struct GetUsageHistoryQuery {
    pub account_id: AccountId,
    pub usage_type: UsageType,
}

pub struct GetUsageHistoryHandler {
    metering: Arc<MeteringEngine>,
}

impl GetUsageHistoryHandler {
    pub fn new(metering: Arc<MeteringEngine>) -> Self {
        Self { metering }
    }

    pub async fn handle(&self, query: GetUsageHistoryQuery) -> Result<Vec<UsageRecord>, SubscriptionError> {
        Ok(self
            .metering
            .usage_history(&query.account_id, query.usage_type)
            .await?)
    }
}
