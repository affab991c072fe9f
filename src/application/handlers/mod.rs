//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod billing;
pub mod subscription;

#[cfg(test)]
pub(crate) mod test_support;

pub use billing::{
    ConfirmRetryCommand, ConfirmRetryHandler, ConfirmRetryResult, HandlePaymentOutcomeCommand,
    HandlePaymentOutcomeHandler, PaymentOutcomeResult, SkipReason,
};
pub use subscription::{
    AdvancePeriodCommand, AdvancePeriodHandler, AdvancePeriodResult, CancelSubscriptionCommand,
    CancelSubscriptionHandler, CancelSubscriptionResult, ChangeTierCommand, ChangeTierHandler,
    ChangeTierResult, CheckAccessHandler, CheckAccessQuery, GetSubscriptionHandler,
    GetSubscriptionQuery, GetUsageHistoryHandler, GetUsageHistoryQuery, GetUsageSummaryHandler,
    GetUsageSummaryQuery, StartCheckoutCommand, StartCheckoutHandler, StartCheckoutResult,
    StartFreeCommand, StartFreeHandler, StartFreeResult, StartTrialCommand, StartTrialHandler,
    StartTrialResult, SubscriptionView, UsageLine, UsageSummary,
};
