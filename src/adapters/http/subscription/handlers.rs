//! HTTP handlers for subscription, usage and billing endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Json, Path, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::application::handlers::{
    AdvancePeriodCommand, AdvancePeriodHandler, CancelSubscriptionCommand,
    CancelSubscriptionHandler, ChangeTierCommand, ChangeTierHandler, CheckAccessHandler,
    CheckAccessQuery, ConfirmRetryCommand, ConfirmRetryHandler, GetSubscriptionHandler,
    GetSubscriptionQuery, GetUsageHistoryHandler, GetUsageHistoryQuery, GetUsageSummaryHandler,
    GetUsageSummaryQuery, HandlePaymentOutcomeCommand, HandlePaymentOutcomeHandler,
    StartCheckoutCommand, StartCheckoutHandler, StartFreeCommand, StartFreeHandler,
    StartTrialCommand, StartTrialHandler,
};
use crate::application::{MeteringEngine, QuotaResolver, SubscriptionLifecycle, SubscriptionLocks};
use crate::domain::billing::{RetryPolicy, WebhookError, WebhookVerifier};
use crate::domain::catalog::{PlanCatalog, UsageType};
use crate::domain::foundation::{AccountId, DomainError, SubscriptionId};
use crate::domain::subscription::SubscriptionError;
use crate::ports::{BillingLedger, Clock, ProcessedEventStore, RetryScheduler};

use super::dto::{
    AccessResponse, CancelRequest, CancelResponse, ChangeTierRequest, CheckoutResponse,
    ErrorResponse, StartCheckoutRequest, SubscriptionResponse, TierChangeResponse,
    UsageHistoryResponse, UsagePeriodResponse,
};

/// Header carrying the account id verified by the upstream gateway.
pub const ACCOUNT_ID_HEADER: &str = "X-Account-Id";

/// Header carrying the processor's webhook signature.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned per request; everything inside is behind an `Arc`.
#[derive(Clone)]
pub struct SubscriptionAppState {
    pub lifecycle: Arc<SubscriptionLifecycle>,
    pub metering: Arc<MeteringEngine>,
    pub quotas: Arc<QuotaResolver>,
    pub catalog: Arc<PlanCatalog>,
    pub ledger: Arc<dyn BillingLedger>,
    pub processed_events: Arc<dyn ProcessedEventStore>,
    pub retry_scheduler: Arc<dyn RetryScheduler>,
    pub locks: Arc<SubscriptionLocks>,
    pub clock: Arc<dyn Clock>,
    pub retry_policy: RetryPolicy,
    pub webhook_verifier: Arc<WebhookVerifier>,
}

impl SubscriptionAppState {
    /// Create handlers on demand from the shared state.
    pub fn check_access_handler(&self) -> CheckAccessHandler {
        CheckAccessHandler::new(
            self.lifecycle.clone(),
            self.metering.clone(),
            self.quotas.clone(),
            self.clock.clone(),
        )
    }

    pub fn usage_summary_handler(&self) -> GetUsageSummaryHandler {
        GetUsageSummaryHandler::new(
            self.lifecycle.clone(),
            self.metering.clone(),
            self.quotas.clone(),
            self.clock.clone(),
        )
    }

    pub fn usage_history_handler(&self) -> GetUsageHistoryHandler {
        GetUsageHistoryHandler::new(self.metering.clone())
    }

    pub fn get_subscription_handler(&self) -> GetSubscriptionHandler {
        GetSubscriptionHandler::new(self.lifecycle.clone(), self.catalog.clone(), self.clock.clone())
    }

    pub fn start_checkout_handler(&self) -> StartCheckoutHandler {
        StartCheckoutHandler::new(self.lifecycle.clone(), self.catalog.clone(), self.clock.clone())
    }

    pub fn start_free_handler(&self) -> StartFreeHandler {
        StartFreeHandler::new(
            self.lifecycle.clone(),
            self.metering.clone(),
            self.catalog.clone(),
            self.clock.clone(),
        )
    }

    pub fn start_trial_handler(&self) -> StartTrialHandler {
        StartTrialHandler::new(
            self.lifecycle.clone(),
            self.metering.clone(),
            self.quotas.clone(),
            self.clock.clone(),
        )
    }

    pub fn change_tier_handler(&self) -> ChangeTierHandler {
        ChangeTierHandler::new(self.lifecycle.clone(), self.catalog.clone(), self.clock.clone())
    }

    pub fn cancel_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(self.lifecycle.clone(), self.clock.clone())
    }

    pub fn advance_period_handler(&self) -> AdvancePeriodHandler {
        AdvancePeriodHandler::new(self.lifecycle.clone(), self.clock.clone())
    }

    pub fn payment_outcome_handler(&self) -> HandlePaymentOutcomeHandler {
        HandlePaymentOutcomeHandler::new(
            self.lifecycle.clone(),
            self.ledger.clone(),
            self.processed_events.clone(),
            self.retry_scheduler.clone(),
            self.locks.clone(),
            self.clock.clone(),
            self.retry_policy,
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
}

// ════════════════════════════════════════════════════════════════════════════════
// Account Context
// ════════════════════════════════════════════════════════════════════════════════

/// Account id set by the authentication gateway in front of this service.
#[derive(Debug, Clone)]
pub struct VerifiedAccount {
    pub account_id: AccountId,
}

/// Rejection type for VerifiedAccount extraction.
pub struct AccountRequired;

impl IntoResponse for AccountRequired {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for VerifiedAccount
where
    S: Send + Sync,
{
    type Rejection = AccountRequired;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let account_id = parts
            .headers
            .get(ACCOUNT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| AccountId::new(s).ok())
            .ok_or(AccountRequired)?;

        Ok(VerifiedAccount { account_id })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers (GET endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/subscription - Current subscription for plan display
pub async fn get_subscription(
    State(state): State<SubscriptionAppState>,
    account: VerifiedAccount,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .get_subscription_handler()
        .handle(GetSubscriptionQuery {
            account_id: account.account_id,
        })
        .await?;
    Ok(Json(view))
}

/// GET /api/usage - Usage against quota for the current period
pub async fn get_usage(
    State(state): State<SubscriptionAppState>,
    account: VerifiedAccount,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state
        .usage_summary_handler()
        .handle(GetUsageSummaryQuery {
            account_id: account.account_id,
        })
        .await?;
    Ok(Json(summary))
}

/// GET /api/usage/:usage_type/history - Retained per-period counters
pub async fn get_usage_history(
    State(state): State<SubscriptionAppState>,
    account: VerifiedAccount,
    Path(usage_type): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let usage_type: UsageType = usage_type.parse().map_err(SubscriptionError::from)?;
    let records = state
        .usage_history_handler()
        .handle(GetUsageHistoryQuery {
            account_id: account.account_id,
            usage_type,
        })
        .await?;

    Ok(Json(UsageHistoryResponse {
        usage_type,
        records: records.iter().map(UsagePeriodResponse::from).collect(),
    }))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/access/:usage_type - Check and consume one unit of quota
///
/// A denial is a normal `200` response with `allowed: false`.
pub async fn check_access(
    State(state): State<SubscriptionAppState>,
    account: VerifiedAccount,
    Path(usage_type): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let usage_type: UsageType = usage_type.parse().map_err(SubscriptionError::from)?;
    let decision = state
        .check_access_handler()
        .handle(CheckAccessQuery {
            account_id: account.account_id,
            usage_type,
        })
        .await?;
    Ok(Json(AccessResponse::from(decision)))
}

/// POST /api/subscription/checkout - Start a paid checkout
pub async fn start_checkout(
    State(state): State<SubscriptionAppState>,
    account: VerifiedAccount,
    Json(request): Json<StartCheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .start_checkout_handler()
        .handle(StartCheckoutCommand {
            account_id: account.account_id,
            tier: request.tier,
            interval: request.interval,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(CheckoutResponse::from(result))))
}

/// POST /api/subscription/free - Start the free plan
pub async fn start_free(
    State(state): State<SubscriptionAppState>,
    account: VerifiedAccount,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .start_free_handler()
        .handle(StartFreeCommand {
            account_id: account.account_id,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SubscriptionResponse::from(&result.subscription)),
    ))
}

/// POST /api/subscription/trial - Start the one-time trial
pub async fn start_trial(
    State(state): State<SubscriptionAppState>,
    account: VerifiedAccount,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .start_trial_handler()
        .handle(StartTrialCommand {
            account_id: account.account_id,
        })
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(SubscriptionResponse::from(&result.subscription)),
    ))
}

/// POST /api/subscription/tier - Upgrade or downgrade
pub async fn change_tier(
    State(state): State<SubscriptionAppState>,
    account: VerifiedAccount,
    Json(request): Json<ChangeTierRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .change_tier_handler()
        .handle(ChangeTierCommand {
            account_id: account.account_id,
            tier: request.tier,
            timing: request.timing,
        })
        .await?;
    Ok(Json(TierChangeResponse::from(result)))
}

/// POST /api/subscription/cancel - Cancel now or at period end
pub async fn cancel_subscription(
    State(state): State<SubscriptionAppState>,
    account: VerifiedAccount,
    Json(request): Json<CancelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .cancel_handler()
        .handle(CancelSubscriptionCommand {
            account_id: account.account_id,
            timing: request.timing,
        })
        .await?;
    Ok(Json(CancelResponse::from(result)))
}

/// POST /api/subscription/advance - Apply any pending period boundary
pub async fn advance_period(
    State(state): State<SubscriptionAppState>,
    account: VerifiedAccount,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .advance_period_handler()
        .handle(AdvancePeriodCommand {
            account_id: account.account_id,
        })
        .await?;
    Ok(Json(SubscriptionResponse::from(&result.subscription)))
}

/// POST /api/webhooks/payments - Payment outcome from the processor
///
/// No account header: the request is authenticated by its signature.
pub async fn handle_payment_webhook(
    State(state): State<SubscriptionAppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    let outcome = state
        .webhook_verifier
        .verify_and_parse(&body, signature, state.clock.now())?;

    let result = state
        .payment_outcome_handler()
        .handle(HandlePaymentOutcomeCommand { outcome })
        .await?;
    Ok(Json(result))
}

/// POST /api/billing/retries/:subscription_id/:attempt/confirm - Retry timer fired
pub async fn confirm_retry(
    State(state): State<SubscriptionAppState>,
    Path((subscription_id, attempt_number)): Path<(String, u32)>,
) -> Result<impl IntoResponse, ApiError> {
    let subscription_id: SubscriptionId = subscription_id
        .parse()
        .map_err(|_| SubscriptionError::validation("subscription_id", "must be a UUID"))?;

    let result = state
        .confirm_retry_handler()
        .handle(ConfirmRetryCommand {
            subscription_id,
            attempt_number,
        })
        .await?;
    Ok(Json(result))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts domain errors to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    Subscription(SubscriptionError),
    Webhook(WebhookError),
}

impl From<SubscriptionError> for ApiError {
    fn from(err: SubscriptionError) -> Self {
        ApiError::Subscription(err)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Subscription(err.into())
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        ApiError::Webhook(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Subscription(err) => {
                let status = match &err {
                    SubscriptionError::NotFound(_) | SubscriptionError::NotFoundForAccount(_) => {
                        StatusCode::NOT_FOUND
                    }
                    SubscriptionError::AlreadySubscribed(_)
                    | SubscriptionError::TrialAlreadyUsed(_)
                    | SubscriptionError::InvalidTransition { .. }
                    | SubscriptionError::ConcurrentUpdateConflict => StatusCode::CONFLICT,
                    SubscriptionError::StaleSubscriptionState(_) => StatusCode::SERVICE_UNAVAILABLE,
                    SubscriptionError::UnknownTier(_) | SubscriptionError::ValidationFailed { .. } => {
                        StatusCode::BAD_REQUEST
                    }
                    SubscriptionError::InvalidWebhookSignature => StatusCode::UNAUTHORIZED,
                    SubscriptionError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    warn!(error = %err, "Request failed");
                }
                let body = ErrorResponse::new(err.code().to_string(), err.message())
                    .retryable(err.is_retryable());
                (status, body)
            }
            ApiError::Webhook(err) => {
                warn!(error = %err, "Webhook rejected");
                (err.status_code(), ErrorResponse::new(err.code(), err.to_string()))
            }
        };

        (status, Json(body)).into_response()
    }
}
