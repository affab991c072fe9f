//! PostgreSQL implementation of SubscriptionRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::catalog::{BillingInterval, TierId};
use crate::domain::foundation::{
    AccountId, BillingEventId, DomainError, ErrorCode, SubscriptionId, Timestamp,
};
use crate::domain::subscription::{Subscription, SubscriptionStatus};
use crate::ports::SubscriptionRepository;

use super::errors::{corrupt_row, map_sqlx_error, violated_constraint};

const LIVE_ACCOUNT_CONSTRAINT: &str = "subscriptions_live_account_key";

const SELECT_COLUMNS: &str = r#"
    id, account_id, tier, status, billing_interval, period_anchor,
    current_period_start, current_period_end, cancel_at, canceled_at,
    pending_tier, trial_ends_at, last_billing_event_at, last_billing_event_id,
    created_at, updated_at, version
"#;

/// PostgreSQL implementation of the SubscriptionRepository port.
///
/// The partial unique index on `account_id WHERE status <> 'canceled'`
/// enforces one live subscription per account.
pub struct PostgresSubscriptionRepository {
    pool: PgPool,
}

impl PostgresSubscriptionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: Uuid,
    account_id: String,
    tier: String,
    status: String,
    billing_interval: String,
    period_anchor: DateTime<Utc>,
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
    cancel_at: Option<DateTime<Utc>>,
    canceled_at: Option<DateTime<Utc>>,
    pending_tier: Option<String>,
    trial_ends_at: Option<DateTime<Utc>>,
    last_billing_event_at: Option<DateTime<Utc>>,
    last_billing_event_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: i64,
}

impl TryFrom<SubscriptionRow> for Subscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let status: SubscriptionStatus =
            row.status.parse().map_err(|_| corrupt_row("status", &row.status))?;
        let interval: BillingInterval = row
            .billing_interval
            .parse()
            .map_err(|_| corrupt_row("billing_interval", &row.billing_interval))?;
        let tier = TierId::new(&row.tier).map_err(|_| corrupt_row("tier", &row.tier))?;
        let pending_tier = row
            .pending_tier
            .map(|t| TierId::new(&t).map_err(|_| corrupt_row("pending_tier", &t)))
            .transpose()?;
        let account_id =
            AccountId::new(&row.account_id).map_err(|_| corrupt_row("account_id", &row.account_id))?;
        let last_billing_event_id = row
            .last_billing_event_id
            .map(|e| BillingEventId::new(&e).map_err(|_| corrupt_row("last_billing_event_id", &e)))
            .transpose()?;

        Ok(Subscription {
            id: SubscriptionId::from_uuid(row.id),
            account_id,
            tier,
            status,
            interval,
            period_anchor: Timestamp::from_datetime(row.period_anchor),
            current_period_start: Timestamp::from_datetime(row.current_period_start),
            current_period_end: Timestamp::from_datetime(row.current_period_end),
            cancel_at: row.cancel_at.map(Timestamp::from_datetime),
            canceled_at: row.canceled_at.map(Timestamp::from_datetime),
            pending_tier,
            trial_ends_at: row.trial_ends_at.map(Timestamp::from_datetime),
            last_billing_event_at: row.last_billing_event_at.map(Timestamp::from_datetime),
            last_billing_event_id,
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
            version: row.version,
        })
    }
}

fn opt_datetime(ts: Option<Timestamp>) -> Option<DateTime<Utc>> {
    ts.map(|t| *t.as_datetime())
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn insert(&self, subscription: &Subscription) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, account_id, tier, status, billing_interval, period_anchor,
                current_period_start, current_period_end, cancel_at, canceled_at,
                pending_tier, trial_ends_at, last_billing_event_at, last_billing_event_id,
                created_at, updated_at, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.account_id.as_str())
        .bind(subscription.tier.as_str())
        .bind(subscription.status.as_str())
        .bind(subscription.interval.as_str())
        .bind(subscription.period_anchor.as_datetime())
        .bind(subscription.current_period_start.as_datetime())
        .bind(subscription.current_period_end.as_datetime())
        .bind(opt_datetime(subscription.cancel_at))
        .bind(opt_datetime(subscription.canceled_at))
        .bind(subscription.pending_tier.as_ref().map(|t| t.as_str().to_string()))
        .bind(opt_datetime(subscription.trial_ends_at))
        .bind(opt_datetime(subscription.last_billing_event_at))
        .bind(subscription.last_billing_event_id.as_ref().map(|e| e.as_str().to_string()))
        .bind(subscription.created_at.as_datetime())
        .bind(subscription.updated_at.as_datetime())
        .bind(subscription.version)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if violated_constraint(&e) == Some(LIVE_ACCOUNT_CONSTRAINT) {
                return DomainError::new(
                    ErrorCode::SubscriptionExists,
                    format!("Account {} already has a subscription", subscription.account_id),
                )
                .with_detail("account_id", subscription.account_id.as_str());
            }
            map_sqlx_error("Failed to insert subscription", e)
        })?;

        Ok(())
    }

    async fn update(&self, subscription: &Subscription) -> Result<Subscription, DomainError> {
        let new_version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE subscriptions SET
                tier = $3,
                status = $4,
                billing_interval = $5,
                period_anchor = $6,
                current_period_start = $7,
                current_period_end = $8,
                cancel_at = $9,
                canceled_at = $10,
                pending_tier = $11,
                trial_ends_at = $12,
                last_billing_event_at = $13,
                last_billing_event_id = $14,
                updated_at = $15,
                version = version + 1
            WHERE id = $1 AND version = $2
            RETURNING version
            "#,
        )
        .bind(subscription.id.as_uuid())
        .bind(subscription.version)
        .bind(subscription.tier.as_str())
        .bind(subscription.status.as_str())
        .bind(subscription.interval.as_str())
        .bind(subscription.period_anchor.as_datetime())
        .bind(subscription.current_period_start.as_datetime())
        .bind(subscription.current_period_end.as_datetime())
        .bind(opt_datetime(subscription.cancel_at))
        .bind(opt_datetime(subscription.canceled_at))
        .bind(subscription.pending_tier.as_ref().map(|t| t.as_str().to_string()))
        .bind(opt_datetime(subscription.trial_ends_at))
        .bind(opt_datetime(subscription.last_billing_event_at))
        .bind(subscription.last_billing_event_id.as_ref().map(|e| e.as_str().to_string()))
        .bind(subscription.updated_at.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to update subscription", e))?;

        match new_version {
            Some(version) => {
                let mut updated = subscription.clone();
                updated.version = version;
                Ok(updated)
            }
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM subscriptions WHERE id = $1)")
                        .bind(subscription.id.as_uuid())
                        .fetch_one(&self.pool)
                        .await
                        .map_err(|e| map_sqlx_error("Failed to check subscription", e))?;
                if exists {
                    Err(DomainError::conflict(format!(
                        "Subscription {} was modified concurrently",
                        subscription.id
                    ))
                    .with_detail("expected_version", subscription.version.to_string()))
                } else {
                    Err(DomainError::new(
                        ErrorCode::SubscriptionNotFound,
                        format!("Subscription {} not found", subscription.id),
                    ))
                }
            }
        }
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to find subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn find_latest_by_account(
        &self,
        account_id: &AccountId,
    ) -> Result<Option<Subscription>, DomainError> {
        // Live subscription first, then the newest canceled one.
        let row: Option<SubscriptionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM subscriptions
            WHERE account_id = $1
            ORDER BY (status <> 'canceled') DESC, created_at DESC
            LIMIT 1
            "#,
            SELECT_COLUMNS
        ))
        .bind(account_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to find subscription", e))?;

        row.map(Subscription::try_from).transpose()
    }

    async fn list_by_account(&self, account_id: &AccountId) -> Result<Vec<Subscription>, DomainError> {
        let rows: Vec<SubscriptionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM subscriptions WHERE account_id = $1 ORDER BY created_at DESC",
            SELECT_COLUMNS
        ))
        .bind(account_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to list subscriptions", e))?;

        rows.into_iter().map(Subscription::try_from).collect()
    }
}
