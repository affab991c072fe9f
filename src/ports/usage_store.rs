//! UsageStore port - persistence of per-period usage counters.
//!
//! `try_consume` is the one operation that must be atomic: the check against
//! the limit and the increment happen as a single unit, so concurrent callers
//! can never push a counter past its limit.

use async_trait::async_trait;

use crate::domain::catalog::{Quota, UsageType};
use crate::domain::foundation::{AccountId, BillingPeriod, DomainError};
use crate::domain::metering::{ConsumeOutcome, UsageRecord};

#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Atomically increment the counter if it is below `limit`.
    ///
    /// Creates the record with count 0 first if it is missing.
    async fn try_consume(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
        limit: Quota,
    ) -> Result<ConsumeOutcome, DomainError>;

    /// Increment without a limit check. Returns the new count.
    async fn report_only(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
        delta: u32,
    ) -> Result<u32, DomainError>;

    /// Current count, 0 if the record doesn't exist yet.
    async fn current_usage(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
    ) -> Result<u32, DomainError>;

    /// Open zeroed counters for every usage type in `period`.
    ///
    /// Idempotent; existing records (old or new) are never modified.
    /// Returns true if at least one record was created.
    async fn rollover_if_needed(
        &self,
        account_id: &AccountId,
        period: &BillingPeriod,
    ) -> Result<bool, DomainError>;

    /// All retained records for the account and usage type, newest first.
    async fn usage_history(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
    ) -> Result<Vec<UsageRecord>, DomainError>;
}
