//! Billing handlers.
//!
//! - Applying payment outcomes delivered by the processor
//! - Confirming scheduled retries when they fire

mod confirm_retry;
mod handle_payment_outcome;

pub use confirm_retry::{ConfirmRetryCommand, ConfirmRetryHandler, ConfirmRetryResult, SkipReason};
pub use handle_payment_outcome::{
    HandlePaymentOutcomeCommand, HandlePaymentOutcomeHandler, PaymentOutcomeResult,
};
