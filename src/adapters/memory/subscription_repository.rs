//! In-memory subscription repository.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{AccountId, DomainError, ErrorCode, SubscriptionId};
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::ports::SubscriptionRepository;

/// In-memory implementation of the SubscriptionRepository port.
///
/// Enforces the same rules as the PostgreSQL adapter: one non-canceled
/// subscription per account and version-checked updates.
#[derive(Default)]
pub struct InMemorySubscriptionRepository {
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
}

impl InMemorySubscriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored subscriptions, canceled ones included.
    pub async fn len(&self) -> usize {
        self.subscriptions.read().await.len()
    }
}

fn live_for_account<'a>(
    subscriptions: &'a HashMap<SubscriptionId, Subscription>,
    account_id: &AccountId,
) -> Option<&'a Subscription> {
    subscriptions
        .values()
        .find(|s| &s.account_id == account_id && s.status != SubscriptionStatus::Canceled)
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn insert(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut subscriptions = self.subscriptions.write().await;

        if subscriptions.contains_key(&subscription.id) {
            return Err(DomainError::new(
                ErrorCode::SubscriptionExists,
                format!("Subscription {} already exists", subscription.id),
            )
            .with_detail("account_id", subscription.account_id.as_str()));
        }
        if subscription.status != SubscriptionStatus::Canceled
            && live_for_account(&subscriptions, &subscription.account_id).is_some()
        {
            return Err(DomainError::new(
                ErrorCode::SubscriptionExists,
                format!("Account {} already has a subscription", subscription.account_id),
            )
            .with_detail("account_id", subscription.account_id.as_str()));
        }

        subscriptions.insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<Subscription, DomainError> {
        let mut subscriptions = self.subscriptions.write().await;

        let stored = subscriptions.get(&subscription.id).ok_or_else(|| {
            DomainError::new(
                ErrorCode::SubscriptionNotFound,
                format!("Subscription {} not found", subscription.id),
            )
        })?;

        if stored.version != subscription.version {
            return Err(DomainError::conflict(format!(
                "Subscription {} was modified concurrently",
                subscription.id
            ))
            .with_detail("expected_version", subscription.version.to_string())
            .with_detail("actual_version", stored.version.to_string()));
        }

        let mut updated = subscription.clone();
        updated.version += 1;
        subscriptions.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        Ok(self.subscriptions.read().await.get(id).cloned())
    }

    async fn find_latest_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<Subscription>, DomainError> {
        let subscriptions = self.subscriptions.read().await;
        if let Some(live) = live_for_account(&subscriptions, account_id) {
            return Ok(Some(live.clone()));
        }
        Ok(subscriptions
            .values()
            .filter(|s| &s.account_id == account_id)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn list_by_account(&self, account_id: &AccountId) -> Result<Vec<Subscription>, DomainError> {
        let mut list: Vec<Subscription> = self
            .subscriptions
            .read()
            .await
            .values()
            .filter(|s| &s.account_id == account_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }
}
