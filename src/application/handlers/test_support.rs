//! Shared wiring for handler tests: every port backed by its in-memory
//! adapter and time held by a [`FixedClock`].

use std::sync::Arc;

use crate::adapters::clock::FixedClock;
use crate::adapters::memory::{
    InMemoryBillingLedger, InMemoryProcessedEventStore, InMemorySubscriptionRepository,
    InMemoryUsageStore, RecordingRetryScheduler,
};
use crate::application::lifecycle::SubscriptionLifecycle;
use crate::application::locks::SubscriptionLocks;
use crate::application::metering::{MeteringEngine, QuotaResolver};
use crate::domain::catalog::{BillingInterval, PlanCatalog, TierId};
use crate::domain::foundation::{AccountId, SubscriptionId, Timestamp};
use crate::domain::subscription::{Subscription, TrialPolicy};
use crate::ports::SubscriptionRepository;

pub struct Harness {
    pub repo: Arc<InMemorySubscriptionRepository>,
    pub store: Arc<InMemoryUsageStore>,
    pub ledger: Arc<InMemoryBillingLedger>,
    pub processed: Arc<InMemoryProcessedEventStore>,
    pub scheduler: Arc<RecordingRetryScheduler>,
    pub clock: Arc<FixedClock>,
    pub metering: Arc<MeteringEngine>,
    pub lifecycle: Arc<SubscriptionLifecycle>,
    pub quotas: Arc<QuotaResolver>,
    pub catalog: Arc<PlanCatalog>,
    pub locks: Arc<SubscriptionLocks>,
}

/// 2024-01-01T00:00:00Z
pub fn t0() -> Timestamp {
    Timestamp::from_unix_secs(1_704_067_200).unwrap()
}

pub fn account(id: &str) -> AccountId {
    AccountId::new(id).unwrap()
}

pub fn tier(id: &str) -> TierId {
    TierId::new(id).unwrap()
}

impl Harness {
    pub fn new() -> Self {
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        let store = Arc::new(InMemoryUsageStore::new());
        let metering = Arc::new(MeteringEngine::new(store.clone()));
        let lifecycle = Arc::new(SubscriptionLifecycle::new(repo.clone(), metering.clone()));
        let catalog = Arc::new(PlanCatalog::default());
        Self {
            repo,
            store,
            ledger: Arc::new(InMemoryBillingLedger::new()),
            processed: Arc::new(InMemoryProcessedEventStore::new()),
            scheduler: Arc::new(RecordingRetryScheduler::new()),
            clock: Arc::new(FixedClock::new(t0())),
            metering,
            lifecycle,
            quotas: Arc::new(QuotaResolver::new(catalog.clone(), TrialPolicy::default())),
            catalog,
            locks: Arc::new(SubscriptionLocks::new()),
        }
    }

    pub async fn insert(&self, subscription: &Subscription) {
        self.repo.insert(subscription).await.unwrap();
    }

    /// An active paid subscription anchored at `t0`.
    pub async fn active(&self, account_id: &str, tier_id: &str) -> Subscription {
        let mut sub = Subscription::start_checkout(
            SubscriptionId::new(),
            account(account_id),
            tier(tier_id),
            BillingInterval::Monthly,
            t0(),
        );
        sub.activate(t0()).unwrap();
        self.insert(&sub).await;
        sub
    }

    pub async fn load(&self, id: &SubscriptionId) -> Subscription {
        self.repo.find_by_id(id).await.unwrap().unwrap()
    }
}
