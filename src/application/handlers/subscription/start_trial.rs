//! StartTrialHandler - one free trial per account, ever.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::lifecycle::SubscriptionLifecycle;
use crate::application::metering::{MeteringEngine, QuotaResolver};
use crate::domain::foundation::{AccountId, SubscriptionId};
use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::ports::Clock;

use super::release_replaceable;

#[derive(Debug, Clone)]
pub struct StartTrialCommand {
    pub account_id: AccountId,
}

#[derive(Debug, Clone)]
pub struct StartTrialResult {
    pub subscription: Subscription,
}

pub struct StartTrialHandler {
    lifecycle: Arc<SubscriptionLifecycle>,
    metering: Arc<MeteringEngine>,
    quotas: Arc<QuotaResolver>,
    clock: Arc<dyn Clock>,
}

impl StartTrialHandler {
    pub fn new(
        lifecycle: Arc<SubscriptionLifecycle>,
        metering: Arc<MeteringEngine>,
        quotas: Arc<QuotaResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            lifecycle,
            metering,
            quotas,
            clock,
        }
    }

    pub async fn handle(&self, cmd: StartTrialCommand) -> Result<StartTrialResult, SubscriptionError> {
        let now = self.clock.now();
        let policy = self.quotas.trial();
        self.quotas.catalog().plan(&policy.tier)?;

        let history = self
            .lifecycle
            .repository()
            .list_by_account(&cmd.account_id)
            .await?;
        if history.iter().any(Subscription::used_trial) {
            warn!(account_id = %cmd.account_id, "Trial requested again");
            return Err(SubscriptionError::trial_already_used(cmd.account_id));
        }

        release_replaceable(&self.lifecycle, self.quotas.catalog(), &cmd.account_id, now, true).await?;

        let subscription = Subscription::start_trial(
            SubscriptionId::new(),
            cmd.account_id,
            policy.tier.clone(),
            policy.days,
            now,
        );
        self.lifecycle.repository().insert(&subscription).await?;
        self.metering
            .rollover_if_needed(&subscription.account_id, &subscription.current_period())
            .await?;

        info!(
            subscription_id = %subscription.id,
            account_id = %subscription.account_id,
            tier = %subscription.tier,
            ends_at = %subscription.current_period_end,
            "Trial started"
        );

        Ok(StartTrialResult { subscription })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::test_support::{account, t0, tier, Harness};
    use crate::domain::subscription::SubscriptionStatus;

    fn handler(h: &Harness) -> StartTrialHandler {
        StartTrialHandler::new(h.lifecycle.clone(), h.metering.clone(), h.quotas.clone(), h.clock.clone())
    }

    fn command() -> StartTrialCommand {
        StartTrialCommand { account_id: account("acct-1") }
    }

    #[tokio::test]
    async fn trial_runs_seven_days_on_professional() {
        let h = Harness::new();
        let sub = handler(&h).handle(command()).await.unwrap().subscription;

        assert_eq!(sub.status, SubscriptionStatus::Trialing);
        assert_eq!(sub.tier, tier("professional"));
        assert_eq!(sub.current_period_end, t0().add_days(7));
        assert_eq!(sub.trial_ends_at, Some(t0().add_days(7)));
    }

    #[tokio::test]
    async fn second_trial_is_rejected_even_after_expiry() {
        let h = Harness::new();
        handler(&h).handle(command()).await.unwrap();
        h.clock.set(t0().add_days(30));

        let err = handler(&h).handle(command()).await.unwrap_err();
        assert_eq!(err, SubscriptionError::trial_already_used(account("acct-1")));
    }

    #[tokio::test]
    async fn trial_replaces_free_plan() {
        let h = Harness::new();
        let free = Subscription::start_free(SubscriptionId::new(), account("acct-1"), tier("free"), t0());
        h.insert(&free).await;

        handler(&h).handle(command()).await.unwrap();
        assert_eq!(h.load(&free.id).await.status, SubscriptionStatus::Canceled);
    }

    #[tokio::test]
    async fn trial_is_refused_to_paying_account() {
        let h = Harness::new();
        h.active("acct-1", "basic").await;

        let err = handler(&h).handle(command()).await.unwrap_err();
        assert!(matches!(err, SubscriptionError::AlreadySubscribed(_)));
    }
}
