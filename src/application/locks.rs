//! Per-subscription serialization of billing work inside one process.
//!
//! Cross-process safety comes from optimistic versioning; this only keeps
//! two payment events for the same subscription from interleaving here.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::foundation::SubscriptionId;

#[derive(Default)]
pub struct SubscriptionLocks {
    locks: Mutex<HashMap<SubscriptionId, Arc<Mutex<()>>>>,
}

impl SubscriptionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`. Released when the guard drops.
    pub async fn acquire(&self, id: SubscriptionId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Drop entries nobody holds or waits on.
            locks.retain(|key, lock| *key == id || Arc::strong_count(lock) > 1);
            locks.entry(id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of tracked subscriptions.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn same_subscription_is_serialized() {
        let locks = Arc::new(SubscriptionLocks::new());
        let id = SubscriptionId::new();
        let inside = Arc::new(AtomicU32::new(0));
        let max_inside = Arc::new(AtomicU32::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_inside = max_inside.clone();
                tokio::spawn(async move {
                    let _guard = locks.acquire(id).await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            task.unwrap();
        }
        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_subscriptions_do_not_block_each_other() {
        let locks = SubscriptionLocks::new();
        let _a = locks.acquire(SubscriptionId::new()).await;
        let _b = locks.acquire(SubscriptionId::new()).await;
        assert_eq!(locks.len().await, 2);
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = SubscriptionLocks::new();
        drop(locks.acquire(SubscriptionId::new()).await);
        drop(locks.acquire(SubscriptionId::new()).await);
        assert_eq!(locks.len().await, 1);
    }
}
