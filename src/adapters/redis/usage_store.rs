//! Redis-backed usage store for multi-server deployments.
//!
//! Each counter is a HASH `{count, period_end}`; a sorted set per
//! (account, usage type) indexes period starts for history queries. Keys
//! share the `{account}` hash tag so scripts stay on one cluster slot.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};

use crate::domain::catalog::{Quota, UsageType};
use crate::domain::foundation::{AccountId, BillingPeriod, DomainError, ErrorCode, Timestamp};
use crate::domain::metering::{ConsumeOutcome, UsageRecord};
use crate::ports::UsageStore;

/// Opens the record if missing, then increments only while below the limit.
///
/// KEYS: record hash, period index. ARGV: limit (-1 = unlimited),
/// period start (unix secs), period end (unix secs).
/// Returns `{allowed, count}`.
const TRY_CONSUME_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  redis.call('HSET', KEYS[1], 'count', 0, 'period_end', ARGV[3])
  redis.call('ZADD', KEYS[2], ARGV[2], ARGV[2])
end
local count = tonumber(redis.call('HGET', KEYS[1], 'count'))
local limit = tonumber(ARGV[1])
if limit >= 0 and count >= limit then
  return {0, count}
end
count = redis.call('HINCRBY', KEYS[1], 'count', 1)
return {1, count}
"#;

/// Opens the record if missing, then adds ARGV[4] unconditionally.
const REPORT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  redis.call('HSET', KEYS[1], 'count', 0, 'period_end', ARGV[3])
  redis.call('ZADD', KEYS[2], ARGV[2], ARGV[2])
end
return redis.call('HINCRBY', KEYS[1], 'count', ARGV[4])
"#;

/// Opens the record if missing. Returns 1 if it was created.
const OPEN_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 1 then
  return 0
end
redis.call('HSET', KEYS[1], 'count', 0, 'period_end', ARGV[2])
redis.call('ZADD', KEYS[2], ARGV[1], ARGV[1])
return 1
"#;

#[derive(Clone)]
pub struct RedisUsageStore {
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisUsageStore {
    pub fn new(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            prefix: "metering".to_string(),
        }
    }

    /// Use a custom key prefix (for sharing one Redis between environments).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn record_key(&self, account_id: &AccountId, usage_type: UsageType, start_secs: i64) -> String {
        format!(
            "{}:{{{}}}:usage:{}:{}",
            self.prefix, account_id, usage_type, start_secs
        )
    }

    fn index_key(&self, account_id: &AccountId, usage_type: UsageType) -> String {
        format!("{}:{{{}}}:periods:{}", self.prefix, account_id, usage_type)
    }
}

fn cache_error(context: &str, err: redis::RedisError) -> DomainError {
    DomainError::new(ErrorCode::CacheError, format!("{}: {}", context, err))
}

fn to_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

#[async_trait]
impl UsageStore for RedisUsageStore {
    async fn try_consume(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
        limit: Quota,
    ) -> Result<ConsumeOutcome, DomainError> {
        let start = period.start.as_unix_secs();
        let mut conn = self.conn.clone();

        let (allowed, count): (i64, i64) = Script::new(TRY_CONSUME_SCRIPT)
            .key(self.record_key(account_id, usage_type, start))
            .key(self.index_key(account_id, usage_type))
            .arg(limit.as_signed())
            .arg(start)
            .arg(period.end.as_unix_secs())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| cache_error("Failed to consume usage", e))?;

        if allowed == 1 {
            Ok(ConsumeOutcome::allowed(to_count(count), limit))
        } else {
            Ok(ConsumeOutcome::denied(to_count(count), limit))
        }
    }

    async fn report_only(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
        delta: u32,
    ) -> Result<u32, DomainError> {
        let start = period.start.as_unix_secs();
        let mut conn = self.conn.clone();

        let count: i64 = Script::new(REPORT_SCRIPT)
            .key(self.record_key(account_id, usage_type, start))
            .key(self.index_key(account_id, usage_type))
            .arg(-1)
            .arg(start)
            .arg(period.end.as_unix_secs())
            .arg(delta)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| cache_error("Failed to report usage", e))?;

        Ok(to_count(count))
    }

    async fn current_usage(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
        period: &BillingPeriod,
    ) -> Result<u32, DomainError> {
        let mut conn = self.conn.clone();
        let count: Option<i64> = conn
            .hget(
                self.record_key(account_id, usage_type, period.start.as_unix_secs()),
                "count",
            )
            .await
            .map_err(|e| cache_error("Failed to read usage", e))?;

        Ok(count.map_or(0, to_count))
    }

    async fn rollover_if_needed(
        &self,
        account_id: &AccountId,
        period: &BillingPeriod,
    ) -> Result<bool, DomainError> {
        let start = period.start.as_unix_secs();
        let mut conn = self.conn.clone();
        let mut opened = false;

        for usage_type in UsageType::ALL {
            let created: i64 = Script::new(OPEN_SCRIPT)
                .key(self.record_key(account_id, usage_type, start))
                .key(self.index_key(account_id, usage_type))
                .arg(start)
                .arg(period.end.as_unix_secs())
                .invoke_async(&mut conn)
                .await
                .map_err(|e| cache_error("Failed to open usage period", e))?;
            opened |= created == 1;
        }

        Ok(opened)
    }

    async fn usage_history(
        &self,
        account_id: &AccountId,
        usage_type: UsageType,
    ) -> Result<Vec<UsageRecord>, DomainError> {
        let mut conn = self.conn.clone();
        let starts: Vec<i64> = conn
            .zrevrange(self.index_key(account_id, usage_type), 0, -1)
            .await
            .map_err(|e| cache_error("Failed to list usage periods", e))?;

        let mut history = Vec::with_capacity(starts.len());
        for start_secs in starts {
            let (count, end_secs): (Option<i64>, Option<i64>) = conn
                .hget(
                    self.record_key(account_id, usage_type, start_secs),
                    &["count", "period_end"],
                )
                .await
                .map_err(|e| cache_error("Failed to read usage record", e))?;

            let (Some(count), Some(end_secs)) = (count, end_secs) else {
                continue;
            };
            let period = match (
                Timestamp::from_unix_secs(start_secs),
                Timestamp::from_unix_secs(end_secs),
            ) {
                (Some(start), Some(end)) => BillingPeriod::new(start, end)?,
                _ => continue,
            };

            history.push(UsageRecord {
                account_id: account_id.clone(),
                usage_type,
                period,
                count: to_count(count),
            });
        }

        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_guard_the_limit_before_incrementing() {
        let check = TRY_CONSUME_SCRIPT.find("count >= limit").unwrap();
        let incr = TRY_CONSUME_SCRIPT.find("HINCRBY").unwrap();
        assert!(check < incr);
    }

    #[test]
    fn counts_clamp_into_u32() {
        assert_eq!(to_count(-1), 0);
        assert_eq!(to_count(7), 7);
    }
}
