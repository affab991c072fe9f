//! Usage metering engine.
//!
//! Thin layer over a [`UsageStore`] that retries transient
//! `ConcurrentUpdateConflict`s (serialization failures, deadlocks) a bounded
//! number of times before surfacing them.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::catalog::{CatalogError, PlanCatalog, Quota, UsageType};
use crate::domain::foundation::{AccountId, BillingPeriod, DomainError};
use crate::domain::metering::{ConsumeOutcome, UsageRecord};
use crate::domain::subscription::{Subscription, TrialPolicy};
use crate::ports::UsageStore;

/// Default number of retries after a conflicting store write.
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

pub struct MeteringEngine {
    store: Arc<dyn UsageStore>,
    max_conflict_retries: u32,
}

impl MeteringEngine {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self {
            store,
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }

    pub fn with_max_conflict_retries(mut self, retries: u32) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    /// Atomically consume one unit if the counter is below `limit`.
    pub async fn try_consume(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
        limit: Quota,
    ) -> Result<ConsumeOutcome, DomainError> {
        let outcome = self
            .with_conflict_retry("try_consume", || {
                self.store.try_consume(account_id, usage_type, period, limit)
            })
            .await?;

        debug!(
            account_id = %account_id,
            usage_type = %usage_type,
            allowed = outcome.allowed,
            used = outcome.used,
            limit = %outcome.limit,
            "Usage consumed"
        );
        Ok(outcome)
    }

    /// Record usage that already happened, without a limit check.
    pub async fn report_only(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
        delta: u32,
    ) -> Result<u32, DomainError> {
        self.with_conflict_retry("report_only", || {
            self.store.report_only(account_id, usage_type, period, delta)
        })
        .await
    }

    pub async fn current_usage(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
    ) -> Result<u32, DomainError> {
        self.store.current_usage(account_id, usage_type, period).await
    }

    /// Open zeroed counters for `period`. Old periods are left untouched.
    pub async fn rollover_if_needed(
        &self,
        account_id: &AccountId,
        period: &BillingPeriod,
    ) -> Result<bool, DomainError> {
        let opened = self
            .with_conflict_retry("rollover_if_needed", || {
                self.store.rollover_if_needed(account_id, period)
            })
            .await?;

        if opened {
            debug!(account_id = %account_id, period_start = %period.start, "Usage period opened");
        }
        Ok(opened)
    }

    pub async fn usage_history(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
    ) -> Result<Vec<UsageRecord>, DomainError> {
        self.store.usage_history(account_id, usage_type).await
    }

    async fn with_conflict_retry<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, DomainError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        let mut retries = 0;
        loop {
            match op().await {
                Err(err) if err.is_conflict() && retries < self.max_conflict_retries => {
                    retries += 1;
                    debug!(operation, retries, "Retrying usage write after conflict");
                }
                Err(err) if err.is_conflict() => {
                    warn!(operation, retries, "Usage write conflict persisted after retries");
                    return Err(err);
                }
                other => return other,
            }
        }
    }
}

/// Resolves the quota that applies to a subscription right now.
///
/// Trialing subscriptions use the trial overrides where present; everything
/// else comes from the catalog.
pub struct QuotaResolver {
    catalog: Arc<PlanCatalog>,
    trial: TrialPolicy,
}

impl QuotaResolver {
    pub fn new(catalog: Arc<PlanCatalog>, trial: TrialPolicy) -> Self {
        Self { catalog, trial }
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub fn trial(&self) -> &TrialPolicy {
        &self.trial
    }

    pub fn limit_for(
        &self,
        subscription: &Subscription,
        usage_type: UsageType,
    ) -> Result<Quota, CatalogError> {
        if subscription.in_trial_period() && subscription.status.grants_access() {
            if let Some(quota) = self.trial.override_for(usage_type) {
                return Ok(quota);
            }
        }
        self.catalog.limit_for(&subscription.tier, usage_type)
    }
}
