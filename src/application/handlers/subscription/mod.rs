//! Subscription handlers.
//!
//! ## Commands
//! - Starting a checkout, a free plan or a trial
//! - Changing tier and cancelling
//! - Forcing a lazy period rollover
//!
//! ## Queries
//! - Access check (consumes quota when allowed)
//! - Subscription view, usage summary, usage history

mod advance_period;
mod cancel_subscription;
mod change_tier;
mod check_access;
mod get_subscription;
mod get_usage_history;
mod get_usage_summary;
mod start_checkout;
mod start_free;
mod start_trial;

use tracing::info;

use crate::application::lifecycle::SubscriptionLifecycle;
use crate::domain::catalog::PlanCatalog;
use crate::domain::foundation::{AccountId, Timestamp};
use crate::domain::subscription::{Subscription, SubscriptionError, SubscriptionStatus};

// Commands
pub use advance_period::{AdvancePeriodCommand, AdvancePeriodHandler, AdvancePeriodResult};
pub use cancel_subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
};
pub use change_tier::{ChangeTierCommand, ChangeTierHandler, ChangeTierResult};
pub use start_checkout::{StartCheckoutCommand, StartCheckoutHandler, StartCheckoutResult};
pub use start_free::{StartFreeCommand, StartFreeHandler, StartFreeResult};
pub use start_trial::{StartTrialCommand, StartTrialHandler, StartTrialResult};

// Queries
pub use check_access::{CheckAccessHandler, CheckAccessQuery};
pub use get_subscription::{GetSubscriptionHandler, GetSubscriptionQuery, SubscriptionView};
pub use get_usage_history::{GetUsageHistoryHandler, GetUsageHistoryQuery};
pub use get_usage_summary::{GetUsageSummaryHandler, GetUsageSummaryQuery, UsageLine, UsageSummary};

/// Loads the account's live subscription, brought up to `now`.
///
/// Fails with `NotFoundForAccount` when there is none or it has ended.
async fn load_live(
    lifecycle: &SubscriptionLifecycle,
    account_id: &AccountId,
    now: Timestamp,
) -> Result<Subscription, SubscriptionError> {
    let subscription = lifecycle
        .repository()
        .find_latest_by_account(account_id)
        .await?
        .ok_or_else(|| SubscriptionError::not_found_for_account(account_id.clone()))?;

    let subscription = lifecycle.bring_current(subscription, now).await?;
    if subscription.status == SubscriptionStatus::Canceled {
        return Err(SubscriptionError::not_found_for_account(account_id.clone()));
    }
    Ok(subscription)
}

/// Makes room for a new subscription on `account_id`.
///
/// An abandoned checkout is always replaced. A free-tier subscription is
/// replaced only when `replace_free` is set (moving to a paid plan or a
/// trial). Any other live subscription is `AlreadySubscribed`.
async fn release_replaceable(
    lifecycle: &SubscriptionLifecycle,
    catalog: &PlanCatalog,
    account_id: &AccountId,
    now: Timestamp,
    replace_free: bool,
) -> Result<(), SubscriptionError> {
    let existing = match lifecycle
        .repository()
        .find_latest_by_account(account_id)
        .await?
    {
        Some(s) => lifecycle.bring_current(s, now).await?,
        None => return Ok(()),
    };

    let replaceable = match existing.status {
        SubscriptionStatus::Canceled => return Ok(()),
        SubscriptionStatus::Incomplete => true,
        SubscriptionStatus::Active => replace_free && catalog.is_free(&existing.tier),
        SubscriptionStatus::Trialing | SubscriptionStatus::PastDue => false,
    };
    if !replaceable {
        return Err(SubscriptionError::already_subscribed(account_id.clone()));
    }

    lifecycle
        .modify(existing.id, now, |s| {
            if s.status != SubscriptionStatus::Canceled {
                s.cancel(now)?;
            }
            Ok(())
        })
        .await?;

    info!(
        subscription_id = %existing.id,
        account_id = %account_id,
        status = %existing.status,
        "Replaced subscription"
    );
    Ok(())
}
