//! In-memory usage store.
//!
//! A single mutex guards every counter; compare-and-increment runs under it.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::domain::catalog::{Quota, UsageType};
use crate::domain::foundation::{AccountId, BillingPeriod, DomainError, Timestamp};
use crate::domain::metering::{ConsumeOutcome, UsageRecord};
use crate::ports::UsageStore;

type RecordKey = (AccountId, UsageType, Timestamp);

#[derive(Default)]
pub struct InMemoryUsageStore {
    records: Mutex<HashMap<RecordKey, UsageRecord>>,
}

impl InMemoryUsageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of retained records.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

fn key(account_id: &AccountId, usage_type: UsageType, period: &BillingPeriod) -> RecordKey {
    (account_id.clone(), usage_type, period.start)
}

#[async_trait]
impl UsageStore for InMemoryUsageStore {
    async fn try_consume(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
        limit: Quota,
    ) -> Result<ConsumeOutcome, DomainError> {
        let mut records = self.records.lock().await;
        let record = records
            .entry(key(account_id, usage_type, period))
            .or_insert_with(|| UsageRecord::open(account_id.clone(), usage_type, *period));
        Ok(record.try_consume(limit))
    }

    async fn report_only(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
        delta: u32,
    ) -> Result<u32, DomainError> {
        let mut records = self.records.lock().await;
        let record = records
            .entry(key(account_id, usage_type, period))
            .or_insert_with(|| UsageRecord::open(account_id.clone(), usage_type, *period));
        record.count = record.count.saturating_add(delta);
        Ok(record.count)
    }

    async fn current_usage(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
    ) -> Result<u32, DomainError> {
        Ok(self
            .records
            .lock()
            .await
            .get(&key(account_id, usage_type, period))
            .map_or(0, |r| r.count))
    }

    async fn rollover_if_needed(
        &self,
        account_id: &AccountId,
        period: &BillingPeriod,
    ) -> Result<bool, DomainError> {
        let mut records = self.records.lock().await;
        let mut opened = false;
        for usage_type in UsageType::ALL {
            records
                .entry(key(account_id, usage_type, period))
                .or_insert_with(|| {
                    opened = true;
                    UsageRecord::open(account_id.clone(), usage_type, *period)
                });
        }
        Ok(opened)
    }

    async fn usage_history(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
    ) -> Result<Vec<UsageRecord>, DomainError> {
        let mut history: Vec<UsageRecord> = self
            .records
            .lock()
            .await
            .values()
            .filter(|r| &r.account_id == account_id && r.usage_type == usage_type)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.period.start.cmp(&a.period.start));
        Ok(history)
    }
}
