//! ConfirmRetryHandler - asked by the external timer when a retry fires.
//!
//! A retry is only charged if it is still the one the subscription is
//! waiting on. Anything that happened in between (a success, a newer
//! failure, a cancellation) makes it obsolete.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::application::lifecycle::SubscriptionLifecycle;
use crate::application::locks::SubscriptionLocks;
use crate::domain::foundation::SubscriptionId;
use crate::domain::subscription::{SubscriptionError, SubscriptionStatus};
use crate::ports::{BillingLedger, Clock};

#[derive(Debug, Clone)]
pub struct ConfirmRetryCommand {
    pub subscription_id: SubscriptionId,
    pub attempt_number: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    SubscriptionNotFound,
    NotPastDue,
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ConfirmRetryResult {
    Proceed { attempt_number: u32 },
    Skip { reason: SkipReason },
}

pub struct ConfirmRetryHandler {
    lifecycle: Arc<SubscriptionLifecycle>,
    ledger: Arc<dyn BillingLedger>,
    locks: Arc<SubscriptionLocks>,
    clock: Arc<dyn Clock>,
}

impl ConfirmRetryHandler {
    pub fn new(
        lifecycle: Arc<SubscriptionLifecycle>,
        ledger: Arc<dyn BillingLedger>,
        locks: Arc<SubscriptionLocks>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            lifecycle,
            ledger,
            locks,
            clock,
        }
    }

    pub async fn handle(&self, cmd: ConfirmRetryCommand) -> Result<ConfirmRetryResult, SubscriptionError> {
        let _guard = self.locks.acquire(cmd.subscription_id).await;

        let result = self.decide(&cmd).await?;
        info!(
            subscription_id = %cmd.subscription_id,
            attempt_number = cmd.attempt_number,
            decision = ?result,
            "Retry confirmation"
        );
        Ok(result)
    }

    async fn decide(&self, cmd: &ConfirmRetryCommand) -> Result<ConfirmRetryResult, SubscriptionError> {
        let skip = |reason| Ok(ConfirmRetryResult::Skip { reason });

        let subscription = match self
            .lifecycle
            .repository()
            .find_by_id(&cmd.subscription_id)
            .await?
        {
            Some(s) => self.lifecycle.bring_current(s, self.clock.now()).await?,
            None => return skip(SkipReason::SubscriptionNotFound),
        };
        if subscription.status != SubscriptionStatus::PastDue {
            return skip(SkipReason::NotPastDue);
        }

        let attempts = self.ledger.list_for_subscription(&cmd.subscription_id).await?;
        match attempts.last() {
            Some(last)
                if last.attempt_number == cmd.attempt_number
                    && last.is_failure()
                    && last.next_retry_at.is_some() =>
            {
                Ok(ConfirmRetryResult::Proceed {
                    attempt_number: cmd.attempt_number,
                })
            }
            _ => skip(SkipReason::Superseded),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::billing::{
        HandlePaymentOutcomeCommand, HandlePaymentOutcomeHandler,
    };
    use crate::application::handlers::test_support::Harness;
    use crate::domain::billing::{ChargeKind, PaymentOutcome, RetryPolicy};
    use crate::domain::foundation::{BillingEventId, Timestamp};
    use crate::domain::subscription::Subscription;

    async fn deliver(h: &Harness, sub: &Subscription, id: &str, success: bool, at: Timestamp) {
        HandlePaymentOutcomeHandler::new(
            h.lifecycle.clone(),
            h.ledger.clone(),
            h.processed.clone(),
            h.scheduler.clone(),
            h.locks.clone(),
            h.clock.clone(),
            RetryPolicy::default(),
        )
        .handle(HandlePaymentOutcomeCommand {
            outcome: PaymentOutcome {
                event_id: BillingEventId::new(id).unwrap(),
                subscription_id: sub.id,
                success,
                reason: None,
                charge_kind: ChargeKind::Renewal,
                occurred_at: at,
            },
        })
        .await
        .unwrap();
    }

    fn handler(h: &Harness) -> ConfirmRetryHandler {
        ConfirmRetryHandler::new(h.lifecycle.clone(), h.ledger.clone(), h.locks.clone(), h.clock.clone())
    }

    fn confirm(sub: &Subscription, attempt_number: u32) -> ConfirmRetryCommand {
        ConfirmRetryCommand {
            subscription_id: sub.id,
            attempt_number,
        }
    }

    #[tokio::test]
    async fn latest_failed_attempt_proceeds() {
        let h = Harness::new();
        let sub = h.active("acct-1", "basic").await;
        deliver(&h, &sub, "evt_1", false, sub.current_period_end).await;

        let result = handler(&h).handle(confirm(&sub, 1)).await.unwrap();
        assert_eq!(result, ConfirmRetryResult::Proceed { attempt_number: 1 });
    }

    #[tokio::test]
    async fn retry_after_recovery_is_skipped() {
        let h = Harness::new();
        let sub = h.active("acct-1", "basic").await;
        let end = sub.current_period_end;
        deliver(&h, &sub, "evt_1", false, end).await;
        deliver(&h, &sub, "evt_2", true, end.plus_secs(600)).await;

        let result = handler(&h).handle(confirm(&sub, 1)).await.unwrap();
        assert_eq!(result, ConfirmRetryResult::Skip { reason: SkipReason::NotPastDue });
    }

    #[tokio::test]
    async fn older_attempt_is_superseded() {
        let h = Harness::new();
        let sub = h.active("acct-1", "basic").await;
        let end = sub.current_period_end;
        deliver(&h, &sub, "evt_1", false, end).await;
        deliver(&h, &sub, "evt_2", false, end.plus_secs(3_600)).await;

        let result = handler(&h).handle(confirm(&sub, 1)).await.unwrap();
        assert_eq!(result, ConfirmRetryResult::Skip { reason: SkipReason::Superseded });
        let latest = handler(&h).handle(confirm(&sub, 2)).await.unwrap();
        assert_eq!(latest, ConfirmRetryResult::Proceed { attempt_number: 2 });
    }

    #[tokio::test]
    async fn unknown_subscription_is_skipped() {
        let h = Harness::new();
        let result = handler(&h)
            .handle(ConfirmRetryCommand {
                subscription_id: SubscriptionId::new(),
                attempt_number: 1,
            })
            .await
            .unwrap();
        assert_eq!(
            result,
            ConfirmRetryResult::Skip { reason: SkipReason::SubscriptionNotFound }
        );
    }
}
