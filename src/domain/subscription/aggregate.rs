//! Subscription aggregate entity.
//!
//! A subscription is an account's paid (or free) plan. Period boundaries are
//! always derived from `period_anchor` and the billing interval, never from
//! elapsed time, so any number of readers computing the current period agree.
//!
//! # Design Decisions
//!
//! - **One live subscription per account**: enforced by the repository
//! - **Never deleted**: cancellation is a terminal status, history is kept
//! - **Optimistic concurrency**: `version` is checked on every update
//! - **Injected time**: every mutation takes `now` from the caller's clock

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::catalog::{BillingInterval, TierId};
use crate::domain::foundation::{
    AccountId, BillingEventId, BillingPeriod, DomainError, ErrorCode, StateMachine, SubscriptionId, Timestamp,
};

use super::SubscriptionStatus;

/// Why a subscription ended at a period boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    ScheduledCancel,
    TrialExpired,
}

/// Outcome of bringing a subscription's period up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodAdvance {
    /// Still inside the current period.
    Unchanged,
    /// Moved to the period containing `now`.
    RolledOver {
        period: BillingPeriod,
        tier_changed: bool,
    },
    /// The subscription ended at the boundary.
    Ended(EndReason),
}

/// Subscription aggregate.
///
/// # Invariants
///
/// - `current_period_end > current_period_start`
/// - Status transitions follow [`SubscriptionStatus`]'s table
/// - `canceled` stops all further rollovers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub account_id: AccountId,
    pub tier: TierId,
    pub status: SubscriptionStatus,
    pub interval: BillingInterval,

    /// Instant all period boundaries are computed from.
    pub period_anchor: Timestamp,
    pub current_period_start: Timestamp,
    pub current_period_end: Timestamp,

    /// Scheduled cancellation (end of the current period).
    pub cancel_at: Option<Timestamp>,
    pub canceled_at: Option<Timestamp>,

    /// Tier that takes over at the next rollover.
    pub pending_tier: Option<TierId>,

    /// Set once a trial starts and kept after conversion, so the
    /// one-trial-per-account rule can be checked from history.
    pub trial_ends_at: Option<Timestamp>,

    /// Occurrence time of the newest applied payment event.
    pub last_billing_event_at: Option<Timestamp>,

    /// Id of the newest applied payment event. Written in the same
    /// version-checked update as the transition it caused.
    pub last_billing_event_id: Option<BillingEventId>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i64,
}

impl Subscription {
    /// Start a paid checkout. No access until the first payment succeeds.
    pub fn start_checkout(
        id: SubscriptionId,
        account_id: AccountId,
        tier: TierId,
        interval: BillingInterval,
        now: Timestamp,
    ) -> Self {
        Self::new(id, account_id, tier, SubscriptionStatus::Incomplete, interval, now)
    }

    /// Start a free-tier subscription. Active immediately, monthly periods.
    pub fn start_free(id: SubscriptionId, account_id: AccountId, tier: TierId, now: Timestamp) -> Self {
        Self::new(
            id,
            account_id,
            tier,
            SubscriptionStatus::Active,
            BillingInterval::Monthly,
            now,
        )
    }

    /// Start a trial lasting `days`. The trial is its own single period.
    pub fn start_trial(
        id: SubscriptionId,
        account_id: AccountId,
        tier: TierId,
        days: u32,
        now: Timestamp,
    ) -> Self {
        let ends_at = now.add_days(i64::from(days.max(1)));
        let mut subscription = Self::new(
            id,
            account_id,
            tier,
            SubscriptionStatus::Trialing,
            BillingInterval::Monthly,
            now,
        );
        subscription.current_period_end = ends_at;
        subscription.trial_ends_at = Some(ends_at);
        subscription
    }

    fn new(
        id: SubscriptionId,
        account_id: AccountId,
        tier: TierId,
        status: SubscriptionStatus,
        interval: BillingInterval,
        now: Timestamp,
    ) -> Self {
        let period = interval.first_period(now);
        Self {
            id,
            account_id,
            tier,
            status,
            interval,
            period_anchor: now,
            current_period_start: period.start,
            current_period_end: period.end,
            cancel_at: None,
            canceled_at: None,
            pending_tier: None,
            trial_ends_at: None,
            last_billing_event_at: None,
            last_billing_event_id: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// The current billing period.
    pub fn current_period(&self) -> BillingPeriod {
        BillingPeriod {
            start: self.current_period_start,
            end: self.current_period_end,
        }
    }

    /// True while the account is in its free trial.
    pub fn is_trialing(&self) -> bool {
        self.status == SubscriptionStatus::Trialing
    }

    /// True if this subscription ever carried a trial.
    pub fn used_trial(&self) -> bool {
        self.trial_ends_at.is_some()
    }

    /// True while the current period is still the trial period, including
    /// a trial whose conversion charge failed and is being retried.
    pub fn in_trial_period(&self) -> bool {
        self.trial_ends_at == Some(self.current_period_end)
    }

    /// True if `now` is past a boundary that has not been applied yet.
    pub fn is_due_for_rollover(&self, now: Timestamp) -> bool {
        if !self.status.grants_access() {
            return false;
        }
        now >= self.current_period_end || self.cancel_at.map_or(false, |at| now >= at)
    }

    /// Bring the period up to date with `now`.
    ///
    /// Idempotent: calling it again with the same or an earlier `now` is a
    /// no-op. Applies, in order: trial expiry, scheduled cancellation, then
    /// the pending tier change together with the new period.
    ///
    /// A trial period is never extended into a paid one. Only a successful
    /// charge (`activate`) leaves it, so a trial still unpaid at its end is
    /// canceled whether or not a conversion charge has already failed.
    pub fn advance_to(&mut self, now: Timestamp) -> Result<PeriodAdvance, DomainError> {
        if !self.is_due_for_rollover(now) {
            return Ok(PeriodAdvance::Unchanged);
        }

        if self.in_trial_period() {
            let ended_at = self.current_period_end;
            self.transition_to(SubscriptionStatus::Canceled)?;
            self.canceled_at = Some(ended_at);
            self.updated_at = now;
            return Ok(PeriodAdvance::Ended(EndReason::TrialExpired));
        }

        if let Some(cancel_at) = self.cancel_at {
            if now >= cancel_at {
                self.transition_to(SubscriptionStatus::Canceled)?;
                self.canceled_at = Some(cancel_at);
                self.updated_at = now;
                return Ok(PeriodAdvance::Ended(EndReason::ScheduledCancel));
            }
        }

        let tier_changed = self.roll_forward(now);
        self.updated_at = now;
        Ok(PeriodAdvance::RolledOver {
            period: self.current_period(),
            tier_changed,
        })
    }

    /// Move to the period containing `at`, applying any pending tier.
    ///
    /// Returns true if the tier changed.
    fn roll_forward(&mut self, at: Timestamp) -> bool {
        if at < self.current_period_end {
            return false;
        }
        let period = self.interval.period_containing(self.period_anchor, at);
        self.current_period_start = period.start;
        self.current_period_end = period.end;
        match self.pending_tier.take() {
            Some(tier) => {
                self.tier = tier;
                true
            }
            None => false,
        }
    }

    /// First successful payment (checkout or trial conversion).
    ///
    /// Re-anchors the periods at the payment time.
    pub fn activate(&mut self, at: Timestamp) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Active)?;
        let period = self.interval.first_period(at);
        self.period_anchor = at;
        self.current_period_start = period.start;
        self.current_period_end = period.end;
        self.updated_at = at;
        Ok(())
    }

    /// Successful renewal charge. Advances to the period containing `at`
    /// if the current one has already ended; a second renewal for the same
    /// period changes nothing.
    pub fn renew(&mut self, at: Timestamp) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Active)?;
        self.roll_forward(at);
        self.updated_at = at;
        Ok(())
    }

    /// Successful retry after one or more failures.
    pub fn recover(&mut self, at: Timestamp) -> Result<(), DomainError> {
        self.renew(at)
    }

    /// A charge failed and will be retried.
    pub fn mark_past_due(&mut self, at: Timestamp) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::PastDue)?;
        self.updated_at = at;
        Ok(())
    }

    /// Cancel right away.
    pub fn cancel(&mut self, at: Timestamp) -> Result<(), DomainError> {
        self.transition_to(SubscriptionStatus::Canceled)?;
        self.canceled_at = Some(at);
        self.cancel_at = None;
        self.pending_tier = None;
        self.updated_at = at;
        Ok(())
    }

    /// Cancel at the end of the current period. Access continues until then.
    ///
    /// Returns the instant the cancellation takes effect.
    pub fn schedule_cancel(&mut self, now: Timestamp) -> Result<Timestamp, DomainError> {
        if !self.status.grants_access() {
            return Err(self.transition_error(SubscriptionStatus::Canceled));
        }
        let effective_at = self.current_period_end;
        self.cancel_at = Some(effective_at);
        self.updated_at = now;
        Ok(effective_at)
    }

    /// Swap the tier now, keeping the current period bounds and counters.
    pub fn change_tier(&mut self, tier: TierId, now: Timestamp) -> Result<(), DomainError> {
        self.ensure_tier_change_allowed(&tier)?;
        self.tier = tier;
        self.pending_tier = None;
        self.updated_at = now;
        Ok(())
    }

    /// Switch tier at the next rollover.
    pub fn schedule_tier_change(&mut self, tier: TierId, now: Timestamp) -> Result<Timestamp, DomainError> {
        self.ensure_tier_change_allowed(&tier)?;
        self.pending_tier = Some(tier);
        self.updated_at = now;
        Ok(self.current_period_end)
    }

    fn ensure_tier_change_allowed(&self, tier: &TierId) -> Result<(), DomainError> {
        if self.status != SubscriptionStatus::Active {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Tier can only change on an active subscription, status is {}", self.status),
            )
            .with_detail("from", self.status.as_str())
            .with_detail("to", format!("tier:{}", tier)));
        }
        if &self.tier == tier {
            return Err(DomainError::validation("tier", format!("Already on tier {}", tier)));
        }
        Ok(())
    }

    /// True if a payment event that happened at `at` predates one already applied.
    pub fn is_stale_billing_event(&self, at: Timestamp) -> bool {
        self.last_billing_event_at.map_or(false, |last| at < last)
    }

    /// True if `event_id` is the payment event this state already reflects.
    pub fn has_applied_billing_event(&self, event_id: &BillingEventId) -> bool {
        self.last_billing_event_id.as_ref() == Some(event_id)
    }

    /// Remember the newest applied payment event.
    pub fn record_billing_event(&mut self, event_id: &BillingEventId, at: Timestamp) {
        if !self.is_stale_billing_event(at) {
            self.last_billing_event_at = Some(at);
            self.last_billing_event_id = Some(event_id.clone());
        }
    }

    fn transition_error(&self, target: SubscriptionStatus) -> DomainError {
        DomainError::new(
            ErrorCode::InvalidStateTransition,
            format!(
                "Cannot transition subscription from {} to {}",
                self.status, target
            ),
        )
        .with_detail("from", self.status.as_str())
        .with_detail("to", target.as_str())
    }

    /// Transition to a new status using the state machine.
    fn transition_to(&mut self, target: SubscriptionStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(target).map_err(|_| {
            warn!(
                subscription_id = %self.id,
                from = %self.status,
                to = %target,
                "Rejected subscription status transition"
            );
            self.transition_error(target)
        })?;
        Ok(())
    }
}
