//! Wiring from configuration to a running router.
//!
//! Picks adapters for the configured metering backend and builds the
//! shared HTTP state. `main` only initialises logging and serves.

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::adapters::http::{subscription_router, SubscriptionAppState};
use crate::adapters::memory::{
    InMemoryBillingLedger, InMemoryProcessedEventStore, InMemorySubscriptionRepository,
    InMemoryUsageStore, RecordingRetryScheduler,
};
use crate::adapters::postgres::{
    PostgresBillingLedger, PostgresProcessedEventStore, PostgresSubscriptionRepository,
    PostgresUsageStore,
};
use crate::adapters::redis::RedisUsageStore;
use crate::adapters::SystemClock;
use crate::application::{MeteringEngine, QuotaResolver, SubscriptionLifecycle, SubscriptionLocks};
use crate::config::{AppConfig, DatabaseConfig, MeteringBackend, RedisConfig, ServerConfig, ValidationError};
use crate::domain::catalog::CatalogError;
use crate::ports::{
    BillingLedger, Clock, ProcessedEventStore, RetryScheduler, SubscriptionRepository, UsageStore,
};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("catalog could not be loaded: {0}")]
    Catalog(#[from] CatalogError),

    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migrations failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("redis connection failed: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("redis connection timed out")]
    RedisTimeout,
}

struct Stores {
    subscriptions: Arc<dyn SubscriptionRepository>,
    usage: Arc<dyn UsageStore>,
    ledger: Arc<dyn BillingLedger>,
    processed: Arc<dyn ProcessedEventStore>,
}

impl Stores {
    fn in_memory() -> Self {
        Self {
            subscriptions: Arc::new(InMemorySubscriptionRepository::new()),
            usage: Arc::new(InMemoryUsageStore::new()),
            ledger: Arc::new(InMemoryBillingLedger::new()),
            processed: Arc::new(InMemoryProcessedEventStore::new()),
        }
    }

    fn postgres(pool: PgPool, usage: Arc<dyn UsageStore>) -> Self {
        Self {
            subscriptions: Arc::new(PostgresSubscriptionRepository::new(pool.clone())),
            usage,
            ledger: Arc::new(PostgresBillingLedger::new(pool.clone())),
            processed: Arc::new(PostgresProcessedEventStore::new(pool)),
        }
    }
}

/// Builds the application state for the configured backend.
///
/// Validates the configuration first; nothing is connected on failure.
pub async fn build_state(config: &AppConfig) -> Result<SubscriptionAppState, BootstrapError> {
    config.validate()?;

    let catalog = Arc::new(config.catalog.load()?);
    let trial = config.trial.policy()?;
    let retry_policy = config.billing.retry_policy()?;

    let stores = match config.metering.backend {
        MeteringBackend::Memory => Stores::in_memory(),
        MeteringBackend::Postgres => {
            let pool = connect_postgres(&config.database).await?;
            let usage: Arc<dyn UsageStore> = Arc::new(PostgresUsageStore::new(pool.clone()));
            Stores::postgres(pool, usage)
        }
        MeteringBackend::Redis => {
            let pool = connect_postgres(&config.database).await?;
            let usage: Arc<dyn UsageStore> = Arc::new(connect_redis(&config.redis).await?);
            Stores::postgres(pool, usage)
        }
    };

    info!(
        backend = ?config.metering.backend,
        plans = catalog.plans().len(),
        max_retries = retry_policy.max_retries,
        trial_days = trial.days,
        "Subscription engine configured"
    );

    let metering = Arc::new(
        MeteringEngine::new(stores.usage)
            .with_max_conflict_retries(config.metering.max_conflict_retries),
    );
    let lifecycle = Arc::new(SubscriptionLifecycle::new(stores.subscriptions, metering.clone()));
    let quotas = Arc::new(QuotaResolver::new(catalog.clone(), trial));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    // TODO: replace with a durable scheduler that calls the confirm endpoint at fire_at.
    let retry_scheduler: Arc<dyn RetryScheduler> = Arc::new(RecordingRetryScheduler::new());

    Ok(SubscriptionAppState {
        lifecycle,
        metering,
        quotas,
        catalog,
        ledger: stores.ledger,
        processed_events: stores.processed,
        retry_scheduler,
        locks: Arc::new(SubscriptionLocks::new()),
        clock,
        retry_policy,
        webhook_verifier: Arc::new(config.billing.webhook_verifier()),
    })
}

/// Mounts the API under `/api` with tracing, timeout, request-id and CORS layers.
pub fn build_app(state: SubscriptionAppState, server: &ServerConfig) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .nest("/api", subscription_router())
        .with_state(state)
        .layer(TimeoutLayer::new(server.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid));

    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    if !origins.is_empty() {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }
    app
}

async fn health() -> &'static str {
    "ok"
}

async fn connect_postgres(config: &DatabaseConfig) -> Result<PgPool, BootstrapError> {
    let pool = config
        .pool_options()
        .connect_with(config.connect_options()?)
        .await?;

    if config.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");
    }
    Ok(pool)
}

async fn connect_redis(config: &RedisConfig) -> Result<RedisUsageStore, BootstrapError> {
    let url = config
        .url
        .as_deref()
        .ok_or(ValidationError::MissingRequired("REDIS__URL"))?;
    let client = redis::Client::open(url)?;
    let conn = tokio::time::timeout(config.timeout(), client.get_multiplexed_tokio_connection())
        .await
        .map_err(|_| BootstrapError::RedisTimeout)??;
    Ok(RedisUsageStore::new(conn))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BillingConfig, CatalogConfig, DatabaseConfig, MeteringConfig, TrialConfig};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use tower::ServiceExt;

    fn memory_config() -> AppConfig {
        AppConfig {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            redis: RedisConfig::default(),
            billing: BillingConfig {
                webhook_secret: SecretString::new("whsec_test".to_string()),
                ..Default::default()
            },
            metering: MeteringConfig::default(),
            catalog: CatalogConfig::default(),
            trial: TrialConfig::default(),
        }
    }

    #[tokio::test]
    async fn memory_backend_builds_and_serves_health() {
        let config = memory_config();
        let state = build_state(&config).await.unwrap();
        let app = build_app(state, &config.server);

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_before_connecting() {
        let mut config = memory_config();
        config.metering.backend = MeteringBackend::Postgres;

        let result = build_state(&config).await;
        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }

    #[tokio::test]
    async fn configured_retry_policy_reaches_state() {
        let mut config = memory_config();
        config.billing.max_retries = 5;

        let state = build_state(&config).await.unwrap();
        assert_eq!(state.retry_policy.max_retries, 5);
    }
}
