//! Billing domain module.
//!
//! - `attempt` - Payment outcomes and the append-only attempt ledger
//! - `retry_policy` - Backoff schedule for failed charges
//! - `webhook_verifier` - HMAC verification of processor webhooks

mod attempt;
mod retry_policy;
mod webhook_errors;
mod webhook_verifier;

pub use attempt::{
    failures_since_last_success, AttemptOutcome, BillingAttempt, ChargeKind, PaymentOutcome,
};
pub use retry_policy::{RetryDecision, RetryPolicy};
pub use webhook_errors::WebhookError;
pub use webhook_verifier::{
    sign_payload, SignatureHeader, WebhookVerifier, DEFAULT_MAX_EVENT_AGE_SECS,
};
