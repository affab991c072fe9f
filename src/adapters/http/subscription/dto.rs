//! HTTP DTOs for the subscription, usage and billing endpoints.
//!
//! Domain read models that are already `Serialize` (access decisions,
//! usage summaries, subscription views) are returned as they are; these
//! types cover requests and the command responses.

use serde::{Deserialize, Serialize};

use crate::application::handlers::{
    CancelSubscriptionResult, ChangeTierResult, StartCheckoutResult,
};
use crate::domain::catalog::{BillingInterval, TierChange, TierId, UsageType};
use crate::domain::foundation::{SubscriptionId, Timestamp};
use crate::domain::metering::{AccessDecision, SuggestedAction, UsageRecord};
use crate::domain::subscription::{ChangeTiming, Subscription, SubscriptionStatus};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a paid checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct StartCheckoutRequest {
    pub tier: TierId,
    #[serde(default = "default_interval")]
    pub interval: BillingInterval,
}

fn default_interval() -> BillingInterval {
    BillingInterval::Monthly
}

/// Request to change tier.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeTierRequest {
    pub tier: TierId,
    #[serde(default)]
    pub timing: ChangeTiming,
}

/// Request to cancel. Defaults to the end of the current period.
#[derive(Debug, Clone, Deserialize)]
pub struct CancelRequest {
    #[serde(default = "default_cancel_timing")]
    pub timing: ChangeTiming,
}

fn default_cancel_timing() -> ChangeTiming {
    ChangeTiming::AtPeriodEnd
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Subscription state after a command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub id: SubscriptionId,
    pub account_id: String,
    pub tier: TierId,
    pub status: SubscriptionStatus,
    pub interval: BillingInterval,
    pub current_period_start: Timestamp,
    pub current_period_end: Timestamp,
    pub cancel_at: Option<Timestamp>,
    pub pending_tier: Option<TierId>,
    pub trial_ends_at: Option<Timestamp>,
}

impl From<&Subscription> for SubscriptionResponse {
    fn from(s: &Subscription) -> Self {
        Self {
            id: s.id,
            account_id: s.account_id.to_string(),
            tier: s.tier.clone(),
            status: s.status,
            interval: s.interval,
            current_period_start: s.current_period_start,
            current_period_end: s.current_period_end,
            cancel_at: s.cancel_at,
            pending_tier: s.pending_tier.clone(),
            trial_ends_at: s.trial_ends_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub subscription: SubscriptionResponse,
    /// Minor currency units.
    pub amount_due: i64,
}

impl From<StartCheckoutResult> for CheckoutResponse {
    fn from(result: StartCheckoutResult) -> Self {
        Self {
            subscription: SubscriptionResponse::from(&result.subscription),
            amount_due: result.amount_due,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierChangeResponse {
    pub subscription: SubscriptionResponse,
    pub change: TierChange,
    pub effective_at: Timestamp,
}

impl From<ChangeTierResult> for TierChangeResponse {
    fn from(result: ChangeTierResult) -> Self {
        Self {
            subscription: SubscriptionResponse::from(&result.subscription),
            change: result.change,
            effective_at: result.effective_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub subscription: SubscriptionResponse,
    pub effective_at: Timestamp,
}

impl From<CancelSubscriptionResult> for CancelResponse {
    fn from(result: CancelSubscriptionResult) -> Self {
        Self {
            subscription: SubscriptionResponse::from(&result.subscription),
            effective_at: result.effective_at,
        }
    }
}

/// Access decision plus the prompt the client should show on denial.
#[derive(Debug, Clone, Serialize)]
pub struct AccessResponse {
    #[serde(flatten)]
    pub decision: AccessDecision,
    pub suggested_action: Option<SuggestedAction>,
}

impl From<AccessDecision> for AccessResponse {
    fn from(decision: AccessDecision) -> Self {
        let suggested_action = decision.suggested_action();
        Self {
            decision,
            suggested_action,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageHistoryResponse {
    pub usage_type: UsageType,
    pub records: Vec<UsagePeriodResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsagePeriodResponse {
    pub period_start: Timestamp,
    pub period_end: Timestamp,
    pub count: u32,
}

impl From<&UsageRecord> for UsagePeriodResponse {
    fn from(record: &UsageRecord) -> Self {
        Self {
            period_start: record.period.start,
            period_end: record.period.end,
            count: record.count,
        }
    }
}

/// Error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    /// True if repeating the same request may succeed.
    #[serde(default)]
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            retryable: false,
        }
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}
