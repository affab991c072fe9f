//! PostgreSQL implementation of BillingLedger.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::BillingAttempt;
use crate::domain::foundation::{BillingEventId, DomainError, SubscriptionId, Timestamp};
use crate::ports::BillingLedger;

use super::errors::{corrupt_row, map_sqlx_error, violated_constraint};

const ATTEMPT_KEY_CONSTRAINT: &str = "billing_attempts_pkey";

pub struct PostgresBillingLedger {
    pool: PgPool,
}

impl PostgresBillingLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AttemptRow {
    subscription_id: Uuid,
    attempt_number: i32,
    event_id: String,
    occurred_at: DateTime<Utc>,
    outcome: String,
    failure_reason: Option<String>,
    charge_kind: String,
    next_retry_at: Option<DateTime<Utc>>,
}

impl TryFrom<AttemptRow> for BillingAttempt {
    type Error = DomainError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        Ok(BillingAttempt {
            subscription_id: SubscriptionId::from_uuid(row.subscription_id),
            attempt_number: u32::try_from(row.attempt_number)
                .map_err(|_| corrupt_row("attempt_number", row.attempt_number))?,
            event_id: BillingEventId::new(&row.event_id)
                .map_err(|_| corrupt_row("event_id", &row.event_id))?,
            occurred_at: Timestamp::from_datetime(row.occurred_at),
            outcome: row.outcome.parse().map_err(|_| corrupt_row("outcome", &row.outcome))?,
            failure_reason: row.failure_reason,
            charge_kind: row
                .charge_kind
                .parse()
                .map_err(|_| corrupt_row("charge_kind", &row.charge_kind))?,
            next_retry_at: row.next_retry_at.map(Timestamp::from_datetime),
        })
    }
}

#[async_trait]
impl BillingLedger for PostgresBillingLedger {
    async fn append(&self, attempt: &BillingAttempt) -> Result<(), DomainError> {
        let attempt_number = i32::try_from(attempt.attempt_number)
            .map_err(|_| DomainError::validation("attempt_number", "Attempt number too large"))?;

        sqlx::query(
            r#"
            INSERT INTO billing_attempts (
                subscription_id, attempt_number, event_id, occurred_at, outcome,
                failure_reason, charge_kind, next_retry_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(attempt.subscription_id.as_uuid())
        .bind(attempt_number)
        .bind(attempt.event_id.as_str())
        .bind(attempt.occurred_at.as_datetime())
        .bind(attempt.outcome.as_str())
        .bind(&attempt.failure_reason)
        .bind(attempt.charge_kind.as_str())
        .bind(attempt.next_retry_at.map(|t| *t.as_datetime()))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if violated_constraint(&e) == Some(ATTEMPT_KEY_CONSTRAINT) {
                return DomainError::conflict(format!(
                    "Attempt {} already recorded for subscription {}",
                    attempt.attempt_number, attempt.subscription_id
                ));
            }
            map_sqlx_error("Failed to append billing attempt", e)
        })?;

        Ok(())
    }

    async fn list_for_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> Result<Vec<BillingAttempt>, DomainError> {
        let rows: Vec<AttemptRow> = sqlx::query_as(
            r#"
            SELECT subscription_id, attempt_number, event_id, occurred_at, outcome,
                   failure_reason, charge_kind, next_retry_at
            FROM billing_attempts
            WHERE subscription_id = $1
            ORDER BY attempt_number ASC
            "#,
        )
        .bind(subscription_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to list billing attempts", e))?;

        rows.into_iter().map(BillingAttempt::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{AttemptOutcome, ChargeKind};

    #[test]
    fn attempt_row_converts() {
        let attempt = BillingAttempt::try_from(AttemptRow {
            subscription_id: Uuid::new_v4(),
            attempt_number: 2,
            event_id: "evt_2".to_string(),
            occurred_at: Utc::now(),
            outcome: "failed".to_string(),
            failure_reason: Some("card_declined".to_string()),
            charge_kind: "retry".to_string(),
            next_retry_at: None,
        })
        .unwrap();

        assert_eq!(attempt.outcome, AttemptOutcome::Failed);
        assert_eq!(attempt.charge_kind, ChargeKind::Retry);
        assert_eq!(attempt.attempt_number, 2);
    }

    #[test]
    fn negative_attempt_number_is_rejected() {
        let result = BillingAttempt::try_from(AttemptRow {
            subscription_id: Uuid::new_v4(),
            attempt_number: -1,
            event_id: "evt".to_string(),
            occurred_at: Utc::now(),
            outcome: "failed".to_string(),
            failure_reason: None,
            charge_kind: "retry".to_string(),
            next_retry_at: None,
        });
        assert!(result.is_err());
    }
}
