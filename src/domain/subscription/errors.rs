//! Subscription-specific error types.
//!
//! Errors returned by lifecycle, metering and billing operations.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | NotFound / NotFoundForAccount | 404 |
//! | AlreadySubscribed / TrialAlreadyUsed | 409 |
//! | UnknownTier | 400 |
//! | InvalidTransition | 409 |
//! | ConcurrentUpdateConflict / StaleSubscriptionState | 409 |
//! | InvalidWebhookSignature | 401 |
//! | ValidationFailed | 400 |
//! | Infrastructure | 500 |

use crate::domain::catalog::CatalogError;
use crate::domain::foundation::{
    AccountId, DomainError, ErrorCode, SubscriptionId, ValidationError,
};

/// Subscription-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// Subscription was not found.
    NotFound(SubscriptionId),

    /// The account has never subscribed.
    NotFoundForAccount(AccountId),

    /// The account already has a non-canceled subscription.
    AlreadySubscribed(AccountId),

    /// The account has already used its one trial.
    TrialAlreadyUsed(AccountId),

    /// The tier is not in the catalog.
    UnknownTier(String),

    /// The status change is not allowed from the current state.
    InvalidTransition { from: String, to: String },

    /// Lost an optimistic-concurrency race after bounded retries.
    ConcurrentUpdateConflict,

    /// The period boundary could not be reconciled after a reload and retry.
    StaleSubscriptionState(SubscriptionId),

    /// Webhook signature verification failed.
    InvalidWebhookSignature,

    /// Validation failed.
    ValidationFailed { field: String, message: String },

    /// Infrastructure error.
    Infrastructure(String),
}

impl SubscriptionError {
    pub fn not_found(id: SubscriptionId) -> Self {
        SubscriptionError::NotFound(id)
    }

    pub fn not_found_for_account(account_id: AccountId) -> Self {
        SubscriptionError::NotFoundForAccount(account_id)
    }

    pub fn already_subscribed(account_id: AccountId) -> Self {
        SubscriptionError::AlreadySubscribed(account_id)
    }

    pub fn trial_already_used(account_id: AccountId) -> Self {
        SubscriptionError::TrialAlreadyUsed(account_id)
    }

    pub fn unknown_tier(tier: impl Into<String>) -> Self {
        SubscriptionError::UnknownTier(tier.into())
    }

    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        SubscriptionError::InvalidTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn stale(id: SubscriptionId) -> Self {
        SubscriptionError::StaleSubscriptionState(id)
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SubscriptionError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        SubscriptionError::Infrastructure(message.into())
    }

    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            SubscriptionError::NotFound(_) | SubscriptionError::NotFoundForAccount(_) => {
                ErrorCode::SubscriptionNotFound
            }
            SubscriptionError::AlreadySubscribed(_) => ErrorCode::SubscriptionExists,
            SubscriptionError::TrialAlreadyUsed(_) => ErrorCode::TrialAlreadyUsed,
            SubscriptionError::UnknownTier(_) => ErrorCode::UnknownTier,
            SubscriptionError::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            SubscriptionError::ConcurrentUpdateConflict => ErrorCode::ConcurrentUpdateConflict,
            SubscriptionError::StaleSubscriptionState(_) => ErrorCode::StaleSubscriptionState,
            SubscriptionError::InvalidWebhookSignature => ErrorCode::InvalidWebhookSignature,
            SubscriptionError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            SubscriptionError::Infrastructure(_) => ErrorCode::InternalError,
        }
    }

    /// Returns a user-friendly error message.
    pub fn message(&self) -> String {
        match self {
            SubscriptionError::NotFound(id) => format!("Subscription not found: {}", id),
            SubscriptionError::NotFoundForAccount(account_id) => {
                format!("No subscription found for account: {}", account_id)
            }
            SubscriptionError::AlreadySubscribed(account_id) => {
                format!("Account {} already has a subscription", account_id)
            }
            SubscriptionError::TrialAlreadyUsed(account_id) => {
                format!("Account {} has already used its free trial", account_id)
            }
            SubscriptionError::UnknownTier(tier) => format!("Unknown tier: {}", tier),
            SubscriptionError::InvalidTransition { from, to } => {
                format!("Cannot move subscription from {} to {}", from, to)
            }
            SubscriptionError::ConcurrentUpdateConflict => {
                "Subscription was modified concurrently, please retry".to_string()
            }
            SubscriptionError::StaleSubscriptionState(id) => {
                format!("Subscription {} could not be brought up to date", id)
            }
            SubscriptionError::InvalidWebhookSignature => "Invalid webhook signature".to_string(),
            SubscriptionError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            SubscriptionError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// Returns true if the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubscriptionError::Infrastructure(_)
                | SubscriptionError::ConcurrentUpdateConflict
                | SubscriptionError::StaleSubscriptionState(_)
        )
    }
}

impl std::fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for SubscriptionError {}

impl From<DomainError> for SubscriptionError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ConcurrentUpdateConflict => SubscriptionError::ConcurrentUpdateConflict,
            ErrorCode::UnknownTier => {
                SubscriptionError::UnknownTier(err.details.get("tier").cloned().unwrap_or(err.message))
            }
            ErrorCode::InvalidStateTransition => SubscriptionError::InvalidTransition {
                from: err.details.get("from").cloned().unwrap_or_default(),
                to: err.details.get("to").cloned().unwrap_or_default(),
            },
            ErrorCode::ValidationFailed => SubscriptionError::ValidationFailed {
                field: err.details.get("field").cloned().unwrap_or_default(),
                message: err.message,
            },
            ErrorCode::SubscriptionExists => match err
                .details
                .get("account_id")
                .and_then(|id| AccountId::new(id.clone()).ok())
            {
                Some(account_id) => SubscriptionError::AlreadySubscribed(account_id),
                None => SubscriptionError::Infrastructure(err.to_string()),
            },
            _ => SubscriptionError::Infrastructure(err.to_string()),
        }
    }
}

impl From<CatalogError> for SubscriptionError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnknownTier(tier) => SubscriptionError::UnknownTier(tier),
            other => SubscriptionError::Infrastructure(other.to_string()),
        }
    }
}

impl From<ValidationError> for SubscriptionError {
    fn from(err: ValidationError) -> Self {
        DomainError::from(err).into()
    }
}
