//! Axum router configuration for subscription, usage and billing endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    advance_period, cancel_subscription, change_tier, check_access, confirm_retry,
    get_subscription, get_usage, get_usage_history, handle_payment_webhook, start_checkout,
    start_free, start_trial, SubscriptionAppState,
};

/// Account-scoped endpoints (require `X-Account-Id`).
///
/// # Routes
/// - `GET /subscription` - Current subscription
/// - `POST /subscription/checkout` - Start paid checkout
/// - `POST /subscription/free` - Start free plan
/// - `POST /subscription/trial` - Start trial
/// - `POST /subscription/tier` - Change tier
/// - `POST /subscription/cancel` - Cancel
/// - `POST /subscription/advance` - Force lazy rollover
/// - `POST /access/:usage_type` - Check and consume quota
/// - `GET /usage` - Usage summary
/// - `GET /usage/:usage_type/history` - Per-period history
pub fn account_routes() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/subscription", get(get_subscription))
        .route("/subscription/checkout", post(start_checkout))
        .route("/subscription/free", post(start_free))
        .route("/subscription/trial", post(start_trial))
        .route("/subscription/tier", post(change_tier))
        .route("/subscription/cancel", post(cancel_subscription))
        .route("/subscription/advance", post(advance_period))
        .route("/access/:usage_type", post(check_access))
        .route("/usage", get(get_usage))
        .route("/usage/:usage_type/history", get(get_usage_history))
}

/// Machine-to-machine endpoints: the processor webhook (signature
/// verified) and the retry timer callback.
pub fn billing_routes() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/webhooks/payments", post(handle_payment_webhook))
        .route(
            "/billing/retries/:subscription_id/:attempt/confirm",
            post(confirm_retry),
        )
}

/// The complete API, suitable for mounting at `/api`.
///
/// ```ignore
/// let app = Router::new()
///     .nest("/api", subscription_router())
///     .with_state(state);
/// ```
pub fn subscription_router() -> Router<SubscriptionAppState> {
    Router::new().merge(account_routes()).merge(billing_routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::adapters::clock::FixedClock;
    use crate::adapters::memory::{
        InMemoryBillingLedger, InMemoryProcessedEventStore, InMemorySubscriptionRepository,
        InMemoryUsageStore, RecordingRetryScheduler,
    };
    use crate::application::{MeteringEngine, QuotaResolver, SubscriptionLifecycle, SubscriptionLocks};
    use crate::domain::billing::{sign_payload, RetryPolicy, WebhookVerifier};
    use crate::domain::catalog::PlanCatalog;
    use crate::domain::foundation::Timestamp;
    use crate::domain::subscription::TrialPolicy;

    const SECRET: &str = "whsec_test";

    fn now() -> Timestamp {
        Timestamp::from_unix_secs(1_704_067_200).unwrap()
    }

    fn app() -> Router {
        let repo = Arc::new(InMemorySubscriptionRepository::new());
        let metering = Arc::new(MeteringEngine::new(Arc::new(InMemoryUsageStore::new())));
        let catalog = Arc::new(PlanCatalog::default());
        let state = SubscriptionAppState {
            lifecycle: Arc::new(SubscriptionLifecycle::new(repo, metering.clone())),
            metering,
            quotas: Arc::new(QuotaResolver::new(catalog.clone(), TrialPolicy::default())),
            catalog,
            ledger: Arc::new(InMemoryBillingLedger::new()),
            processed_events: Arc::new(InMemoryProcessedEventStore::new()),
            retry_scheduler: Arc::new(RecordingRetryScheduler::new()),
            locks: Arc::new(SubscriptionLocks::new()),
            clock: Arc::new(FixedClock::new(now())),
            retry_policy: RetryPolicy::default(),
            webhook_verifier: Arc::new(WebhookVerifier::new(SecretString::new(SECRET.to_string()))),
        };
        Router::new().nest("/api", subscription_router()).with_state(state)
    }

    fn post(uri: &str, account: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(account) = account {
            builder = builder.header("X-Account-Id", account);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn account_header_is_required() {
        let response = app()
            .oneshot(post("/api/access/ai_query", None, json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn access_without_subscription_is_denied_with_ok_status() {
        let response = app()
            .oneshot(post("/api/access/ai_query", Some("acct-1"), json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["allowed"], false);
        assert_eq!(body["reason"], "no_subscription");
        assert_eq!(body["suggested_action"], "subscribe");
    }

    #[tokio::test]
    async fn unknown_usage_type_is_bad_request() {
        let response = app()
            .oneshot(post("/api/access/teleport", Some("acct-1"), json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error_code"], "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn checkout_then_signed_payment_grants_access() {
        let app = app();

        let response = app
            .clone()
            .oneshot(post("/api/subscription/checkout", Some("acct-1"), json!({ "tier": "basic" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let checkout = json_body(response).await;
        assert_eq!(checkout["amount_due"], 19_900);
        let subscription_id = checkout["subscription"]["id"].as_str().unwrap().to_string();

        let payload = json!({
            "event_id": "evt_1",
            "subscription_id": subscription_id,
            "success": true,
            "charge_kind": "initial",
            "occurred_at": now(),
        })
        .to_string();
        let signature = sign_payload(SECRET, now().as_unix_secs(), payload.as_bytes()).unwrap();
        let webhook = Request::builder()
            .method("POST")
            .uri("/api/webhooks/payments")
            .header("X-Webhook-Signature", signature)
            .body(Body::from(payload))
            .unwrap();
        let response = app.clone().oneshot(webhook).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["result"], "activated");

        let response = app
            .oneshot(post("/api/access/ai_query", Some("acct-1"), json!({})))
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["allowed"], true);
        assert_eq!(body["used"], 1);
        assert_eq!(body["remaining"], 49);
    }

    #[tokio::test]
    async fn webhook_with_bad_signature_is_rejected() {
        let payload = json!({ "event_id": "evt_1" }).to_string();
        let signature = sign_payload("wrong_secret", now().as_unix_secs(), payload.as_bytes()).unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/api/webhooks/payments")
            .header("X-Webhook-Signature", signature)
            .body(Body::from(payload))
            .unwrap();

        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error_code"], "INVALID_WEBHOOK_SIGNATURE");
    }

    #[tokio::test]
    async fn confirm_retry_for_unknown_subscription_skips() {
        let uri = format!(
            "/api/billing/retries/{}/1/confirm",
            crate::domain::foundation::SubscriptionId::new()
        );
        let response = app().oneshot(post(&uri, None, json!({}))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["decision"], "skip");
        assert_eq!(body["reason"], "subscription_not_found");
    }

    #[tokio::test]
    async fn second_free_plan_conflicts() {
        let app = app();
        let first = app
            .clone()
            .oneshot(post("/api/subscription/free", Some("acct-1"), json!({})))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .oneshot(post("/api/subscription/free", Some("acct-1"), json!({})))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(second).await["error_code"], "SUBSCRIPTION_EXISTS");
    }
}
