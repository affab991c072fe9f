//! PostgreSQL implementation of UsageStore.
//!
//! `try_consume` is a single conditional `UPDATE ... WHERE count < limit`;
//! the row lock it takes serializes concurrent consumers of one counter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::catalog::{Quota, UsageType};
use crate::domain::foundation::{AccountId, BillingPeriod, DomainError, Timestamp};
use crate::domain::metering::{ConsumeOutcome, UsageRecord};
use crate::ports::UsageStore;

use super::errors::{corrupt_row, map_sqlx_error};

pub struct PostgresUsageStore {
    pool: PgPool,
}

impl PostgresUsageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_record(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO usage_records (account_id, usage_type, period_start, period_end, count)
            VALUES ($1, $2, $3, $4, 0)
            ON CONFLICT (account_id, usage_type, period_start) DO NOTHING
            "#,
        )
        .bind(account_id.as_str())
        .bind(usage_type.as_str())
        .bind(period.start.as_datetime())
        .bind(period.end.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to open usage record", e))?;

        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UsageRow {
    account_id: String,
    usage_type: String,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    count: i64,
}

impl TryFrom<UsageRow> for UsageRecord {
    type Error = DomainError;

    fn try_from(row: UsageRow) -> Result<Self, Self::Error> {
        let period = BillingPeriod::new(
            Timestamp::from_datetime(row.period_start),
            Timestamp::from_datetime(row.period_end),
        )
        .map_err(|e| corrupt_row("period", e))?;

        Ok(UsageRecord {
            account_id: AccountId::new(&row.account_id)
                .map_err(|_| corrupt_row("account_id", &row.account_id))?,
            usage_type: row
                .usage_type
                .parse()
                .map_err(|_| corrupt_row("usage_type", &row.usage_type))?,
            period,
            count: to_count(row.count),
        })
    }
}

fn to_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

#[async_trait]
impl UsageStore for PostgresUsageStore {
    async fn try_consume(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
        limit: Quota,
    ) -> Result<ConsumeOutcome, DomainError> {
        self.ensure_record(account_id, usage_type, period).await?;

        let incremented: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE usage_records SET count = count + 1
            WHERE account_id = $1 AND usage_type = $2 AND period_start = $3
              AND ($4 < 0 OR count < $4)
            RETURNING count
            "#,
        )
        .bind(account_id.as_str())
        .bind(usage_type.as_str())
        .bind(period.start.as_datetime())
        .bind(limit.as_signed())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to consume usage", e))?;

        match incremented {
            Some(count) => Ok(ConsumeOutcome::allowed(to_count(count), limit)),
            None => {
                let used = self.current_usage(account_id, usage_type, period).await?;
                Ok(ConsumeOutcome::denied(used, limit))
            }
        }
    }

    async fn report_only(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
        delta: u32,
    ) -> Result<u32, DomainError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO usage_records (account_id, usage_type, period_start, period_end, count)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (account_id, usage_type, period_start)
            DO UPDATE SET count = usage_records.count + EXCLUDED.count
            RETURNING count
            "#,
        )
        .bind(account_id.as_str())
        .bind(usage_type.as_str())
        .bind(period.start.as_datetime())
        .bind(period.end.as_datetime())
        .bind(i64::from(delta))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to report usage", e))?;

        Ok(to_count(count))
    }

    async fn current_usage(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
    ) -> Result<u32, DomainError> {
        let count: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT count FROM usage_records
            WHERE account_id = $1 AND usage_type = $2 AND period_start = $3
            "#,
        )
        .bind(account_id.as_str())
        .bind(usage_type.as_str())
        .bind(period.start.as_datetime())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to read usage", e))?;

        Ok(count.map_or(0, to_count))
    }

    async fn rollover_if_needed(
        &self,
        account_id: &AccountId,
        period: &BillingPeriod,
    ) -> Result<bool, DomainError> {
        let mut opened = false;
        for usage_type in UsageType::ALL {
            opened |= self.ensure_record(account_id, usage_type, period).await?;
        }
        Ok(opened)
    }

    async fn usage_history(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
    ) -> Result<Vec<UsageRecord>, DomainError> {
        let rows: Vec<UsageRow> = sqlx::query_as(
            r#"
            SELECT account_id, usage_type, period_start, period_end, count
            FROM usage_records
            WHERE account_id = $1 AND usage_type = $2
            ORDER BY period_start DESC
            "#,
        )
        .bind(account_id.as_str())
        .bind(usage_type.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("Failed to list usage history", e))?;

        rows.into_iter().map(UsageRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_clamp_into_u32() {
        assert_eq!(to_count(-3), 0);
        assert_eq!(to_count(42), 42);
        assert_eq!(to_count(i64::MAX), u32::MAX);
    }

    #[test]
    fn usage_row_converts() {
        let start = Utc::now();
        let record = UsageRecord::try_from(UsageRow {
            account_id: "acct-1".to_string(),
            usage_type: "case_search".to_string(),
            period_start: start,
            period_end: start + chrono::Duration::days(31),
            count: 9,
        })
        .unwrap();

        assert_eq!(record.usage_type, UsageType::CaseSearch);
        assert_eq!(record.count, 9);
    }
}
