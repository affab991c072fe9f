//! Shared wiring for integration tests: in-memory adapters, a fixed clock
//! and a usage store that counts how often it is consulted.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use subscription_engine::adapters::memory::{
    InMemoryBillingLedger, InMemoryProcessedEventStore, InMemorySubscriptionRepository,
    InMemoryUsageStore, RecordingRetryScheduler,
};
use subscription_engine::adapters::FixedClock;
use subscription_engine::application::handlers::{
    CheckAccessHandler, CheckAccessQuery, ConfirmRetryHandler, GetUsageHistoryHandler,
    HandlePaymentOutcomeCommand, HandlePaymentOutcomeHandler, StartCheckoutCommand,
    StartCheckoutHandler, StartFreeCommand, StartFreeHandler,
};
use subscription_engine::application::{
    MeteringEngine, QuotaResolver, SubscriptionLifecycle, SubscriptionLocks,
};
use subscription_engine::domain::billing::{ChargeKind, PaymentOutcome, RetryPolicy};
use subscription_engine::domain::catalog::{BillingInterval, PlanCatalog, Quota, TierId, UsageType};
use subscription_engine::domain::foundation::{
    AccountId, BillingEventId, BillingPeriod, DomainError, SubscriptionId, Timestamp,
};
use subscription_engine::domain::metering::{AccessDecision, ConsumeOutcome, UsageRecord};
use subscription_engine::domain::subscription::{Subscription, TrialPolicy};
use subscription_engine::ports::{Clock, SubscriptionRepository, UsageStore};

/// 2024-01-01T00:00:00Z
pub fn t0() -> Timestamp {
    Timestamp::from_unix_secs(1_704_067_200).unwrap()
}

pub fn account(id: &str) -> AccountId {
    AccountId::new(id).unwrap()
}

/// Usage store wrapper that counts every call reaching it.
pub struct CountingUsageStore {
    inner: InMemoryUsageStore,
    calls: AtomicUsize,
}

impl CountingUsageStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryUsageStore::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl UsageStore for CountingUsageStore {
    async fn try_consume(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
        limit: Quota,
    ) -> Result<ConsumeOutcome, DomainError> {
        self.touch();
        self.inner.try_consume(account_id, usage_type, period, limit).await
    }

    async fn report_only(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
        delta: u32,
    ) -> Result<u32, DomainError> {
        self.touch();
        self.inner.report_only(account_id, usage_type, period, delta).await
    }

    async fn current_usage(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
    ) -> Result<u32, DomainError> {
        self.touch();
        self.inner.current_usage(account_id, usage_type, period).await
    }

    async fn rollover_if_needed(
        &self,
        account_id: &AccountId,
        period: &BillingPeriod,
    ) -> Result<bool, DomainError> {
        self.touch();
        self.inner.rollover_if_needed(account_id, period).await
    }

    async fn usage_history(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
    ) -> Result<Vec<UsageRecord>, DomainError> {
        self.touch();
        self.inner.usage_history(account_id, usage_type).await
    }
}

/// Every service wired over in-memory adapters.
pub struct Engine {
    pub repo: Arc<InMemorySubscriptionRepository>,
    pub usage: Arc<CountingUsageStore>,
    pub ledger: Arc<InMemoryBillingLedger>,
    pub processed: Arc<InMemoryProcessedEventStore>,
    pub scheduler: Arc<RecordingRetryScheduler>,
    pub clock: Arc<FixedClock>,
    pub metering: Arc<MeteringEngine>,
    pub lifecycle: Arc<SubscriptionLifecycle>,
    pub quotas: Arc<QuotaResolver>,
    pub catalog: Arc<PlanCatalog>,
    pub locks: Arc<SubscriptionLocks>,
    pub policy: RetryPolicy,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_catalog(PlanCatalog::default())
    }

    pub fn with_catalog(catalog: PlanCatalog) -> Self {
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        let usage = Arc::new(CountingUsageStore::new());
        let metering = Arc::new(MeteringEngine::new(usage.clone()));
        let lifecycle = Arc::new(SubscriptionLifecycle::new(repo.clone(), metering.clone()));
        let catalog = Arc::new(catalog);
        Self {
            repo,
            usage,
            ledger: Arc::new(InMemoryBillingLedger::new()),
            processed: Arc::new(InMemoryProcessedEventStore::new()),
            scheduler: Arc::new(RecordingRetryScheduler::new()),
            clock: Arc::new(FixedClock::new(t0())),
            metering,
            lifecycle,
            quotas: Arc::new(QuotaResolver::new(catalog.clone(), TrialPolicy::default())),
            catalog,
            locks: Arc::new(SubscriptionLocks::new()),
            policy: RetryPolicy::default(),
        }
    }

    pub fn check_access_handler(&self) -> CheckAccessHandler {
        CheckAccessHandler::new(
            self.lifecycle.clone(),
            self.metering.clone(),
            self.quotas.clone(),
            self.clock.clone(),
        )
    }

    pub fn payment_handler(&self) -> HandlePaymentOutcomeHandler {
        HandlePaymentOutcomeHandler::new(
            self.lifecycle.clone(),
            self.ledger.clone(),
            self.processed.clone(),
            self.scheduler.clone(),
            self.locks.clone(),
            self.clock.clone(),
            self.policy,
        )
    }

    pub fn confirm_retry_handler(&self) -> ConfirmRetryHandler {
        ConfirmRetryHandler::new(
            self.lifecycle.clone(),
            self.ledger.clone(),
            self.locks.clone(),
            self.clock.clone(),
        )
    }

    pub fn usage_history_handler(&self) -> GetUsageHistoryHandler {
        GetUsageHistoryHandler::new(self.metering.clone())
    }

    pub async fn check(&self, account_id: &str, usage_type: UsageType) -> AccessDecision {
        self.check_access_handler()
            .handle(CheckAccessQuery {
                account_id: account(account_id),
                usage_type,
            })
            .await
            .unwrap()
    }

    pub async fn start_free(&self, account_id: &str) -> Subscription {
        StartFreeHandler::new(
            self.lifecycle.clone(),
            self.metering.clone(),
            self.catalog.clone(),
            self.clock.clone(),
        )
        .handle(StartFreeCommand {
            account_id: account(account_id),
        })
        .await
        .unwrap()
        .subscription
    }

    /// Checkout followed by a successful first charge at the current time.
    pub async fn subscribe(&self, account_id: &str, tier: &str) -> Subscription {
        let started = StartCheckoutHandler::new(
            self.lifecycle.clone(),
            self.catalog.clone(),
            self.clock.clone(),
        )
        .handle(StartCheckoutCommand {
            account_id: account(account_id),
            tier: TierId::new(tier).unwrap(),
            interval: BillingInterval::Monthly,
        })
        .await
        .unwrap();

        let id = started.subscription.id;
        let event_id = format!("evt_initial_{}", id);
        self.payment_handler()
            .handle(payment(id, &event_id, true, ChargeKind::Initial, self.clock.now()))
            .await
            .unwrap();
        self.load(&id).await
    }

    pub async fn load(&self, id: &SubscriptionId) -> Subscription {
        self.repo.find_by_id(id).await.unwrap().unwrap()
    }
}

pub fn payment(
    subscription_id: SubscriptionId,
    event_id: &str,
    success: bool,
    charge_kind: ChargeKind,
    occurred_at: Timestamp,
) -> HandlePaymentOutcomeCommand {
    HandlePaymentOutcomeCommand {
        outcome: PaymentOutcome {
            event_id: BillingEventId::new(event_id).unwrap(),
            subscription_id,
            success,
            reason: (!success).then(|| "card_declined".to_string()),
            charge_kind,
            occurred_at,
        },
    }
}
