//! Subscription repository port (write side).
//!
//! # Design
//!
//! - **One live subscription per account**: `insert` rejects a second
//!   non-canceled subscription for the same account
//! - **Optimistic locking**: `update` succeeds only if the stored version
//!   matches, and returns the subscription with its new version
//! - **History kept**: canceled subscriptions are never deleted

use async_trait::async_trait;

use crate::domain::foundation::{AccountId, DomainError, SubscriptionId};
use crate::domain::subscription::Subscription;

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    /// Persist a new subscription.
    ///
    /// # Errors
    ///
    /// - `SubscriptionExists` if the account already has a non-canceled subscription
    /// - `DatabaseError` on persistence failure
    async fn insert(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Persist changes to an existing subscription.
    ///
    /// # Errors
    ///
    /// - `SubscriptionNotFound` if the row doesn't exist
    /// - `ConcurrentUpdateConflict` if `subscription.version` is stale
    /// - `DatabaseError` on persistence failure
    async fn update(&self, subscription: &Subscription) -> Result<Subscription, DomainError>;

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    /// Most recently created subscription for the account, canceled or not.
    async fn find_latest_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<Subscription>, DomainError>;

    /// Every subscription the account ever had, newest first.
    async fn list_by_account(&self, account_id: &AccountId) -> Result<Vec<Subscription>, DomainError>;
}
