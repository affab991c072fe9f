//! PostgreSQL implementation of ProcessedEventStore.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{BillingEventId, DomainError, SubscriptionId, Timestamp};
use crate::ports::{ProcessedEventRecord, ProcessedEventStore, SaveResult};

use super::errors::{corrupt_row, map_sqlx_error};

pub struct PostgresProcessedEventStore {
    pool: PgPool,
}

impl PostgresProcessedEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProcessedRow {
    event_id: String,
    subscription_id: Uuid,
    result: String,
    processed_at: DateTime<Utc>,
}

impl TryFrom<ProcessedRow> for ProcessedEventRecord {
    type Error = DomainError;

    fn try_from(row: ProcessedRow) -> Result<Self, Self::Error> {
        Ok(ProcessedEventRecord {
            event_id: BillingEventId::new(&row.event_id)
                .map_err(|_| corrupt_row("event_id", &row.event_id))?,
            subscription_id: SubscriptionId::from_uuid(row.subscription_id),
            result: row.result,
            processed_at: Timestamp::from_datetime(row.processed_at),
        })
    }
}

#[async_trait]
impl ProcessedEventStore for PostgresProcessedEventStore {
    async fn contains(&self, event_id: &BillingEventId) -> Result<bool, DomainError> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM processed_payment_events WHERE event_id = $1)",
        )
        .bind(event_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to check processed event", e))
    }

    async fn find(&self, event_id: &BillingEventId) -> Result<Option<ProcessedEventRecord>, DomainError> {
        let row: Option<ProcessedRow> = sqlx::query_as(
            r#"
            SELECT event_id, subscription_id, result, processed_at
            FROM processed_payment_events
            WHERE event_id = $1
            "#,
        )
        .bind(event_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to find processed event", e))?;

        row.map(ProcessedEventRecord::try_from).transpose()
    }

    async fn save(&self, record: ProcessedEventRecord) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_payment_events (event_id, subscription_id, result, processed_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(record.event_id.as_str())
        .bind(record.subscription_id.as_uuid())
        .bind(&record.result)
        .bind(record.processed_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to save processed event", e))?;

        if result.rows_affected() == 0 {
            Ok(SaveResult::AlreadyExists)
        } else {
            Ok(SaveResult::Inserted)
        }
    }
}
