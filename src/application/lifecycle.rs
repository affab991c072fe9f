//! Subscription lifecycle service shared by the command handlers.
//!
//! Owns the two write paths every handler goes through:
//!
//! - `bring_current` - lazy period rollover with one reload-and-retry
//! - `modify` - load, mutate, version-checked save, bounded retries
//!
//! Both open the new usage period in the metering engine whenever the
//! stored period moves.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::foundation::{DomainError, SubscriptionId, Timestamp};
use crate::domain::subscription::{PeriodAdvance, Subscription, SubscriptionError};
use crate::ports::SubscriptionRepository;

use super::metering::MeteringEngine;

/// Default number of attempts for a version-checked subscription write.
pub const DEFAULT_MAX_WRITE_ATTEMPTS: u32 = 3;

pub struct SubscriptionLifecycle {
    repository: Arc<dyn SubscriptionRepository>,
    metering: Arc<MeteringEngine>,
    max_write_attempts: u32,
}

impl SubscriptionLifecycle {
    pub fn new(repository: Arc<dyn SubscriptionRepository>, metering: Arc<MeteringEngine>) -> Self {
        Self {
            repository,
            metering,
            max_write_attempts: DEFAULT_MAX_WRITE_ATTEMPTS,
        }
    }

    pub fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts.max(1);
        self
    }

    pub fn repository(&self) -> &Arc<dyn SubscriptionRepository> {
        &self.repository
    }

    /// Apply any period boundary that `now` has crossed.
    ///
    /// If the write loses a race, the subscription is reloaded; when the
    /// other writer already advanced it the reloaded copy is returned,
    /// otherwise the rollover is attempted once more before failing with
    /// `StaleSubscriptionState`.
    pub async fn bring_current(
        &self,
        subscription: Subscription,
        now: Timestamp,
    ) -> Result<Subscription, SubscriptionError> {
        if !subscription.is_due_for_rollover(now) {
            return Ok(subscription);
        }

        match self.try_advance(&subscription, now).await {
            Ok(updated) => return Ok(updated),
            Err(err) if err.is_conflict() => {}
            Err(err) => return Err(err.into()),
        }

        let reloaded = self
            .repository
            .find_by_id(&subscription.id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found(subscription.id))?;
        if !reloaded.is_due_for_rollover(now) {
            return Ok(reloaded);
        }

        match self.try_advance(&reloaded, now).await {
            Ok(updated) => Ok(updated),
            Err(err) if err.is_conflict() => {
                warn!(subscription_id = %subscription.id, "Rollover still stale after reload");
                Err(SubscriptionError::stale(subscription.id))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn try_advance(
        &self,
        subscription: &Subscription,
        now: Timestamp,
    ) -> Result<Subscription, DomainError> {
        let mut next = subscription.clone();
        let advance = next.advance_to(now)?;
        let saved = self.repository.update(&next).await?;
        self.log_advance(&saved, advance);
        self.open_period_if_moved(subscription, &saved).await?;
        Ok(saved)
    }

    /// Load, bring up to `as_of`, apply `mutate`, save.
    ///
    /// On a version conflict the whole sequence runs again against a fresh
    /// copy, up to the configured number of attempts.
    pub async fn modify<T, F>(
        &self,
        id: SubscriptionId,
        as_of: Timestamp,
        mut mutate: F,
    ) -> Result<(Subscription, T), SubscriptionError>
    where
        F: FnMut(&mut Subscription) -> Result<T, SubscriptionError> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let current = self
                .repository
                .find_by_id(&id)
                .await?
                .ok_or_else(|| SubscriptionError::not_found(id))?;

            let mut next = current.clone();
            let advance = next.advance_to(as_of)?;
            let value = mutate(&mut next)?;

            match self.repository.update(&next).await {
                Ok(saved) => {
                    self.log_advance(&saved, advance);
                    self.open_period_if_moved(&current, &saved).await?;
                    return Ok((saved, value));
                }
                Err(err) if err.is_conflict() && attempt < self.max_write_attempts => {
                    warn!(subscription_id = %id, attempt, "Subscription write conflict, retrying");
                }
                Err(err) if err.is_conflict() => {
                    return Err(SubscriptionError::ConcurrentUpdateConflict);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn open_period_if_moved(
        &self,
        before: &Subscription,
        after: &Subscription,
    ) -> Result<(), DomainError> {
        if after.status.grants_access() && after.current_period_start != before.current_period_start {
            self.metering
                .rollover_if_needed(&after.account_id, &after.current_period())
                .await?;
        }
        Ok(())
    }

    fn log_advance(&self, subscription: &Subscription, advance: PeriodAdvance) {
        match advance {
            PeriodAdvance::Unchanged => {}
            PeriodAdvance::RolledOver { period, tier_changed } => info!(
                subscription_id = %subscription.id,
                account_id = %subscription.account_id,
                period_start = %period.start,
                period_end = %period.end,
                tier = %subscription.tier,
                tier_changed,
                "Subscription period rolled over"
            ),
            PeriodAdvance::Ended(reason) => info!(
                subscription_id = %subscription.id,
                account_id = %subscription.account_id,
                reason = ?reason,
                "Subscription ended at period boundary"
            ),
        }
    }
}
