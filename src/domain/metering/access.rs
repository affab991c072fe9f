//! Access decisions returned to feature modules.

use serde::{Deserialize, Serialize};

use crate::domain::catalog::{Quota, UsageType};
use crate::domain::foundation::Timestamp;

use super::ConsumeOutcome;

/// Machine-readable reason an access check was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The account has never subscribed.
    NoSubscription,
    /// The subscription is canceled.
    SubscriptionCanceled,
    /// Checkout started but the first payment has not succeeded.
    CheckoutIncomplete,
    /// The tier does not include this usage type.
    NotIncludedInPlan,
    /// The period's quota is used up.
    QuotaExceeded,
}

/// What the presentation layer should offer the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    Subscribe,
    Reactivate,
    CompleteCheckout,
    Upgrade,
}

impl DenyReason {
    pub fn suggested_action(&self) -> SuggestedAction {
        match self {
            DenyReason::NoSubscription => SuggestedAction::Subscribe,
            DenyReason::SubscriptionCanceled => SuggestedAction::Reactivate,
            DenyReason::CheckoutIncomplete => SuggestedAction::CompleteCheckout,
            DenyReason::NotIncludedInPlan | DenyReason::QuotaExceeded => SuggestedAction::Upgrade,
        }
    }
}

/// Authoritative answer to "may this account use this feature now?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub usage_type: UsageType,
    pub allowed: bool,
    pub used: u32,
    pub limit: Quota,
    /// Uses left this period; `None` when unlimited.
    pub remaining: Option<u32>,
    /// When the counter resets (current period end).
    pub reset_at: Option<Timestamp>,
    pub reason: Option<DenyReason>,
}

impl AccessDecision {
    /// Deny before the metering engine is consulted.
    pub fn denied_upfront(usage_type: UsageType, reason: DenyReason, limit: Quota) -> Self {
        Self {
            usage_type,
            allowed: false,
            used: 0,
            limit,
            remaining: limit.remaining(0).map(|_| 0),
            reset_at: None,
            reason: Some(reason),
        }
    }

    /// Decision built from a metering outcome.
    pub fn from_outcome(usage_type: UsageType, outcome: ConsumeOutcome, reset_at: Timestamp) -> Self {
        Self {
            usage_type,
            allowed: outcome.allowed,
            used: outcome.used,
            limit: outcome.limit,
            remaining: outcome.remaining(),
            reset_at: Some(reset_at),
            reason: (!outcome.allowed).then_some(DenyReason::QuotaExceeded),
        }
    }

    pub fn suggested_action(&self) -> Option<SuggestedAction> {
        self.reason.map(|r| r.suggested_action())
    }
}
