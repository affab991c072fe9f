//! BillingLedger port - append-only record of charge attempts.

use async_trait::async_trait;

use crate::domain::billing::BillingAttempt;
use crate::domain::foundation::{DomainError, SubscriptionId};

#[async_trait]
pub trait BillingLedger: Send + Sync {
    /// Append an attempt.
    ///
    /// # Errors
    ///
    /// - `ConcurrentUpdateConflict` if the attempt number is already taken
    /// - `DatabaseError` on persistence failure
    async fn append(&self, attempt: &BillingAttempt) -> Result<(), DomainError>;

    /// All attempts for the subscription ordered by attempt number.
    async fn list_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<BillingAttempt>, DomainError>;
}
