//! HandlePaymentOutcomeHandler - applies processor payment results.
//!
//! Events are processed one at a time per subscription. The processed-event
//! store makes redelivery a no-op; `last_billing_event_at` keeps a late
//! event from undoing a newer one.
//!
//! The subscription also carries the id of the last event it applied, so a
//! delivery that loses the version race to another process delivering the
//! same event (or that follows a crash after the state write) sees the
//! transition as done and only fills in the missing ledger row and retry.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::application::lifecycle::SubscriptionLifecycle;
use crate::application::locks::SubscriptionLocks;
use crate::domain::billing::{
    failures_since_last_success, BillingAttempt, PaymentOutcome, RetryDecision, RetryPolicy,
};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::subscription::{Subscription, SubscriptionError, SubscriptionStatus};
use crate::ports::{
    BillingLedger, Clock, ProcessedEventRecord, ProcessedEventStore, RetryScheduler,
    SaveResult, ScheduledRetry,
};

#[derive(Debug, Clone)]
pub struct HandlePaymentOutcomeCommand {
    pub outcome: PaymentOutcome,
}

/// What a payment outcome did to its subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PaymentOutcomeResult {
    /// First payment (checkout or trial conversion) succeeded.
    Activated,
    /// Renewal succeeded.
    Renewed,
    /// A charge succeeded after one or more failures.
    Recovered,
    /// Charge failed; another attempt is scheduled.
    RetryScheduled {
        attempt_number: u32,
        retry_at: Timestamp,
        failures: u32,
    },
    /// Charge failed and the retry budget is spent.
    Canceled { failures: u32 },
    /// The first charge of a checkout failed. Nothing to retry.
    CheckoutFailed,
    /// Recorded but not applied.
    Ignored { reason: String },
    /// Older than an event already applied. Not applied.
    OutOfOrder,
    /// Already processed.
    Duplicate,
}

impl PaymentOutcomeResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentOutcomeResult::Activated => "activated",
            PaymentOutcomeResult::Renewed => "renewed",
            PaymentOutcomeResult::Recovered => "recovered",
            PaymentOutcomeResult::RetryScheduled { .. } => "retry_scheduled",
            PaymentOutcomeResult::Canceled { .. } => "canceled",
            PaymentOutcomeResult::CheckoutFailed => "checkout_failed",
            PaymentOutcomeResult::Ignored { .. } => "ignored",
            PaymentOutcomeResult::OutOfOrder => "out_of_order",
            PaymentOutcomeResult::Duplicate => "duplicate",
        }
    }

    fn ignored_canceled() -> Self {
        PaymentOutcomeResult::Ignored {
            reason: "subscription_canceled".to_string(),
        }
    }
}

pub struct HandlePaymentOutcomeHandler {
    lifecycle: Arc<SubscriptionLifecycle>,
    ledger: Arc<dyn BillingLedger>,
    processed: Arc<dyn ProcessedEventStore>,
    scheduler: Arc<dyn RetryScheduler>,
    locks: Arc<SubscriptionLocks>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl HandlePaymentOutcomeHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        lifecycle: Arc<SubscriptionLifecycle>,
        ledger: Arc<dyn BillingLedger>,
        processed: Arc<dyn ProcessedEventStore>,
        scheduler: Arc<dyn RetryScheduler>,
        locks: Arc<SubscriptionLocks>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            lifecycle,
            ledger,
            processed,
            scheduler,
            locks,
            clock,
            policy,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandlePaymentOutcomeCommand,
    ) -> Result<PaymentOutcomeResult, SubscriptionError> {
        let outcome = cmd.outcome;
        let at = outcome.occurred_at;
        let _guard = self.locks.acquire(outcome.subscription_id).await;

        // 1. Redelivery
        if self.processed.contains(&outcome.event_id).await? {
            warn!(
                event_id = %outcome.event_id,
                subscription_id = %outcome.subscription_id,
                "Duplicate payment event"
            );
            return Ok(PaymentOutcomeResult::Duplicate);
        }

        let subscription = self
            .lifecycle
            .repository()
            .find_by_id(&outcome.subscription_id)
            .await?
            .ok_or_else(|| SubscriptionError::not_found(outcome.subscription_id))?;

        // 2. State already reflects this event
        if subscription.has_applied_billing_event(&outcome.event_id) {
            return self.finish_applied(&outcome, &subscription).await;
        }

        // 3. Late delivery of an older event
        if subscription.is_stale_billing_event(at) {
            warn!(
                event_id = %outcome.event_id,
                subscription_id = %subscription.id,
                occurred_at = %at,
                "Payment event older than the last applied one"
            );
            let result = PaymentOutcomeResult::OutOfOrder;
            self.mark_processed(&outcome, &result).await?;
            return Ok(result);
        }

        // 4. Number the attempt; reuse the number if a previous delivery
        //    got as far as the ledger
        let attempts = self.ledger.list_for_subscription(&subscription.id).await?;
        let existing = attempts.iter().position(|a| a.event_id == outcome.event_id);
        let prior = match existing {
            Some(index) => &attempts[..index],
            None => &attempts[..],
        };
        let attempt_number = match existing {
            Some(index) => attempts[index].attempt_number,
            None => attempts.last().map_or(1, |a| a.attempt_number + 1),
        };
        let failures = failures_since_last_success(prior) + 1;
        let mut attempt = BillingAttempt::from_outcome(&outcome, attempt_number);

        // 5. Canceled subscriptions only get the record
        if subscription.status == SubscriptionStatus::Canceled {
            let result = PaymentOutcomeResult::ignored_canceled();
            if existing.is_none() {
                self.ledger.append(&attempt).await?;
            }
            self.mark_processed(&outcome, &result).await?;
            info!(
                event_id = %outcome.event_id,
                subscription_id = %subscription.id,
                "Payment event for canceled subscription recorded"
            );
            return Ok(result);
        }

        // 6. Transition
        let policy = self.policy;
        let (saved, result) = self
            .lifecycle
            .modify(subscription.id, at, |s| {
                apply_outcome(s, &outcome, attempt_number, failures, &policy)
            })
            .await?;

        if result == PaymentOutcomeResult::Duplicate {
            return self.finish_applied(&outcome, &saved).await;
        }

        // 7. Ledger and retry
        if let PaymentOutcomeResult::RetryScheduled { retry_at, .. } = &result {
            attempt.next_retry_at = Some(*retry_at);
        }
        if existing.is_none() && result != PaymentOutcomeResult::OutOfOrder {
            self.ledger.append(&attempt).await?;
        }
        if let Some(retry_at) = attempt.next_retry_at {
            self.scheduler
                .schedule(ScheduledRetry {
                    subscription_id: saved.id,
                    attempt_number,
                    fire_at: retry_at,
                })
                .await?;
        }

        self.mark_processed(&outcome, &result).await?;

        info!(
            event_id = %outcome.event_id,
            subscription_id = %saved.id,
            account_id = %saved.account_id,
            charge_kind = %outcome.charge_kind,
            success = outcome.success,
            attempt_number,
            status = %saved.status,
            result = result.as_str(),
            "Payment outcome applied"
        );

        Ok(result)
    }

    /// Completes an event whose transition another delivery already saved:
    /// appends its ledger row and schedules its retry if they are missing.
    async fn finish_applied(
        &self,
        outcome: &PaymentOutcome,
        subscription: &Subscription,
    ) -> Result<PaymentOutcomeResult, SubscriptionError> {
        let attempts = self.ledger.list_for_subscription(&subscription.id).await?;
        if !attempts.iter().any(|a| a.event_id == outcome.event_id) {
            let attempt_number = attempts.last().map_or(1, |a| a.attempt_number + 1);
            let mut attempt = BillingAttempt::from_outcome(outcome, attempt_number);
            if !outcome.success && subscription.status == SubscriptionStatus::PastDue {
                let failures = failures_since_last_success(&attempts) + 1;
                if let RetryDecision::Retry { at, .. } = self.policy.decide(failures, outcome.occurred_at) {
                    attempt.next_retry_at = Some(at);
                }
            }

            match self.ledger.append(&attempt).await {
                Ok(()) => {
                    if let Some(fire_at) = attempt.next_retry_at {
                        self.scheduler
                            .schedule(ScheduledRetry {
                                subscription_id: subscription.id,
                                attempt_number,
                                fire_at,
                            })
                            .await?;
                    }
                }
                // The winning delivery got its row in first.
                Err(err) if err.is_conflict() => {}
                Err(err) => return Err(err.into()),
            }
        }

        let result = PaymentOutcomeResult::Duplicate;
        self.mark_processed(outcome, &result).await?;
        warn!(
            event_id = %outcome.event_id,
            subscription_id = %subscription.id,
            "Payment event already applied by another delivery"
        );
        Ok(result)
    }

    async fn mark_processed(
        &self,
        outcome: &PaymentOutcome,
        result: &PaymentOutcomeResult,
    ) -> Result<(), DomainError> {
        let saved = self
            .processed
            .save(ProcessedEventRecord {
                event_id: outcome.event_id.clone(),
                subscription_id: outcome.subscription_id,
                result: result.as_str().to_string(),
                processed_at: self.clock.now(),
            })
            .await?;
        if saved == SaveResult::AlreadyExists {
            warn!(event_id = %outcome.event_id, "Payment event was processed concurrently");
        }
        Ok(())
    }
}

/// Status change for one outcome. Runs inside the version-checked write,
/// so it re-checks what may have changed since the subscription was read.
fn apply_outcome(
    s: &mut Subscription,
    outcome: &PaymentOutcome,
    attempt_number: u32,
    failures: u32,
    policy: &RetryPolicy,
) -> Result<PaymentOutcomeResult, SubscriptionError> {
    let at = outcome.occurred_at;

    if s.has_applied_billing_event(&outcome.event_id) {
        return Ok(PaymentOutcomeResult::Duplicate);
    }
    if s.status == SubscriptionStatus::Canceled {
        return Ok(PaymentOutcomeResult::ignored_canceled());
    }
    if s.is_stale_billing_event(at) {
        return Ok(PaymentOutcomeResult::OutOfOrder);
    }

    let result = if outcome.success {
        match s.status {
            SubscriptionStatus::Incomplete | SubscriptionStatus::Trialing => {
                s.activate(at)?;
                PaymentOutcomeResult::Activated
            }
            SubscriptionStatus::PastDue if s.in_trial_period() => {
                s.activate(at)?;
                PaymentOutcomeResult::Activated
            }
            SubscriptionStatus::PastDue => {
                s.recover(at)?;
                PaymentOutcomeResult::Recovered
            }
            SubscriptionStatus::Active | SubscriptionStatus::Canceled => {
                s.renew(at)?;
                PaymentOutcomeResult::Renewed
            }
        }
    } else if s.status == SubscriptionStatus::Incomplete {
        PaymentOutcomeResult::CheckoutFailed
    } else {
        match policy.decide(failures, at) {
            RetryDecision::Retry { at: retry_at, failures } => {
                s.mark_past_due(at)?;
                PaymentOutcomeResult::RetryScheduled {
                    attempt_number,
                    retry_at,
                    failures,
                }
            }
            RetryDecision::Exhausted { failures } => {
                s.cancel(at)?;
                PaymentOutcomeResult::Canceled { failures }
            }
        }
    };

    s.record_billing_event(&outcome.event_id, at);
    Ok(result)
}
