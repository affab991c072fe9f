//! Usage counters.

use serde::{Deserialize, Serialize};

use crate::domain::catalog::{Quota, UsageType};
use crate::domain::foundation::{AccountId, BillingPeriod};

/// Count of uses of one feature by one account in one period.
///
/// Unique per `(account_id, usage_type, period.start)`. Only ever
/// incremented; a rollover opens a new record and leaves this one intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub account_id: AccountId,
    pub usage_type: UsageType,
    pub period: BillingPeriod,
    pub count: u32,
}

impl UsageRecord {
    /// A fresh zero counter.
    pub fn open(account_id: AccountId, usage_type: UsageType, period: BillingPeriod) -> Self {
        Self {
            account_id,
            usage_type,
            period,
            count: 0,
        }
    }

    /// Compare-and-increment against `limit`.
    ///
    /// Stores must run this (or its equivalent) as one atomic unit.
    pub fn try_consume(&mut self, limit: Quota) -> ConsumeOutcome {
        if !limit.allows(self.count) {
            return ConsumeOutcome::denied(self.count, limit);
        }
        self.count = self.count.saturating_add(1);
        ConsumeOutcome::allowed(self.count, limit)
    }
}

/// Result of a `try_consume` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumeOutcome {
    pub allowed: bool,
    /// Count after the call (unchanged when denied).
    pub used: u32,
    pub limit: Quota,
}

impl ConsumeOutcome {
    pub fn allowed(used: u32, limit: Quota) -> Self {
        Self {
            allowed: true,
            used,
            limit,
        }
    }

    pub fn denied(used: u32, limit: Quota) -> Self {
        Self {
            allowed: false,
            used,
            limit,
        }
    }

    /// Uses left after this call; `None` when unlimited.
    pub fn remaining(&self) -> Option<u32> {
        self.limit.remaining(self.used)
    }
}
