//! Billing attempts and inbound payment outcomes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{BillingEventId, SubscriptionId, Timestamp, ValidationError};

/// What the processor was charging for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeKind {
    /// First charge after checkout (or trial conversion).
    Initial,
    /// Scheduled charge for a new period.
    Renewal,
    /// Retry of a failed charge.
    Retry,
}

impl ChargeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeKind::Initial => "initial",
            ChargeKind::Renewal => "renewal",
            ChargeKind::Retry => "retry",
        }
    }
}

impl fmt::Display for ChargeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChargeKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "initial" => Ok(ChargeKind::Initial),
            "renewal" => Ok(ChargeKind::Renewal),
            "retry" => Ok(ChargeKind::Retry),
            other => Err(ValidationError::invalid_format(
                "charge_kind",
                format!("unknown charge kind '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Succeeded,
    Failed,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptOutcome::Succeeded => "succeeded",
            AttemptOutcome::Failed => "failed",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptOutcome {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "succeeded" => Ok(AttemptOutcome::Succeeded),
            "failed" => Ok(AttemptOutcome::Failed),
            other => Err(ValidationError::invalid_format(
                "outcome",
                format!("unknown attempt outcome '{}'", other),
            )),
        }
    }
}

/// Payment result delivered by the processor.
///
/// `event_id` is the idempotency key; redeliveries carry the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub event_id: BillingEventId,
    pub subscription_id: SubscriptionId,
    pub success: bool,
    #[serde(default)]
    pub reason: Option<String>,
    pub charge_kind: ChargeKind,
    pub occurred_at: Timestamp,
}

/// One charge attempt against a subscription. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingAttempt {
    pub subscription_id: SubscriptionId,
    /// 1-based, monotonic per subscription.
    pub attempt_number: u32,
    pub event_id: BillingEventId,
    pub occurred_at: Timestamp,
    pub outcome: AttemptOutcome,
    pub failure_reason: Option<String>,
    pub charge_kind: ChargeKind,
    /// Retry time decided for this failure, if one was scheduled.
    pub next_retry_at: Option<Timestamp>,
}

impl BillingAttempt {
    /// Builds the attempt record for a payment outcome.
    pub fn from_outcome(outcome: &PaymentOutcome, attempt_number: u32) -> Self {
        Self {
            subscription_id: outcome.subscription_id,
            attempt_number,
            event_id: outcome.event_id.clone(),
            occurred_at: outcome.occurred_at,
            outcome: if outcome.success {
                AttemptOutcome::Succeeded
            } else {
                AttemptOutcome::Failed
            },
            failure_reason: if outcome.success {
                None
            } else {
                outcome.reason.clone()
            },
            charge_kind: outcome.charge_kind,
            next_retry_at: None,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.outcome == AttemptOutcome::Failed
    }
}

/// Failures since the most recent success (the current dunning episode).
///
/// `attempts` must be ordered by `attempt_number`.
pub fn failures_since_last_success(attempts: &[BillingAttempt]) -> u32 {
    attempts
        .iter()
        .rev()
        .take_while(|a| a.is_failure())
        .count() as u32
}
