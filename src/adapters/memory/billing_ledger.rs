//! In-memory billing ledger.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::billing::BillingAttempt;
use crate::domain::foundation::{DomainError, SubscriptionId};
use crate::ports::BillingLedger;

#[derive(Default)]
pub struct InMemoryBillingLedger {
    attempts: RwLock<HashMap<SubscriptionId, Vec<BillingAttempt>>>,
}

impl InMemoryBillingLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BillingLedger for InMemoryBillingLedger {
    async fn append(&self, attempt: &BillingAttempt) -> Result<(), DomainError> {
        let mut attempts = self.attempts.write().await;
        let list = attempts.entry(attempt.subscription_id).or_default();

        if list.iter().any(|a| a.attempt_number == attempt.attempt_number) {
            return Err(DomainError::conflict(format!(
                "Attempt {} already recorded for subscription {}",
                attempt.attempt_number, attempt.subscription_id
            )));
        }

        list.push(attempt.clone());
        list.sort_by_key(|a| a.attempt_number);
        Ok(())
    }

    async fn list_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<BillingAttempt>, DomainError> {
        Ok(self
            .attempts
            .read()
            .await
            .get(subscription_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{ChargeKind, PaymentOutcome};
    use crate::domain::foundation::{BillingEventId, Timestamp};

    fn attempt(subscription_id: SubscriptionId, number: u32) -> BillingAttempt {
        let outcome = PaymentOutcome {
            event_id: BillingEventId::new(format!("evt_{}", number)).unwrap(),
            subscription_id,
            success: false,
            reason: None,
            charge_kind: ChargeKind::Renewal,
            occurred_at: Timestamp::from_unix_secs(1_704_067_200).unwrap(),
        };
        BillingAttempt::from_outcome(&outcome, number)
    }

    #[tokio::test]
    async fn attempts_are_listed_in_order() {
        let ledger = InMemoryBillingLedger::new();
        let id = SubscriptionId::new();
        ledger.append(&attempt(id, 2)).await.unwrap();
        ledger.append(&attempt(id, 1)).await.unwrap();

        let numbers: Vec<u32> = ledger
            .list_for_subscription(&id)
            .await
            .unwrap()
            .iter()
            .map(|a| a.attempt_number)
            .collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[tokio::test]
    async fn duplicate_attempt_number_conflicts() {
        let ledger = InMemoryBillingLedger::new();
        let id = SubscriptionId::new();
        ledger.append(&attempt(id, 1)).await.unwrap();

        assert!(ledger.append(&attempt(id, 1)).await.unwrap_err().is_conflict());
    }
}
