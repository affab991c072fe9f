//! Billing intervals and anchor-based period arithmetic.

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{BillingPeriod, Timestamp, ValidationError};

/// How often a subscription renews.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingInterval {
    Monthly,
    Yearly,
}

impl BillingInterval {
    /// Calendar months per period.
    pub fn months(&self) -> u32 {
        match self {
            BillingInterval::Monthly => 1,
            BillingInterval::Yearly => 12,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Monthly => "monthly",
            BillingInterval::Yearly => "yearly",
        }
    }

    /// Start of the `index`-th period counted from `anchor`.
    ///
    /// Always computed from the anchor rather than the previous boundary, so a
    /// subscription anchored on the 31st returns to the 31st after a short
    /// month instead of drifting to the 28th.
    pub fn period_start(&self, anchor: Timestamp, index: u32) -> Timestamp {
        anchor.add_months(index.saturating_mul(self.months()))
    }

    /// The first period of a subscription anchored at `anchor`.
    pub fn first_period(&self, anchor: Timestamp) -> BillingPeriod {
        BillingPeriod {
            start: anchor,
            end: self.period_start(anchor, 1),
        }
    }

    /// The period that contains `at`.
    ///
    /// Instants before the anchor map to the first period.
    pub fn period_containing(&self, anchor: Timestamp, at: Timestamp) -> BillingPeriod {
        if at <= anchor {
            return self.first_period(anchor);
        }

        let a = anchor.as_datetime();
        let b = at.as_datetime();
        let elapsed_months = (b.year() - a.year()) * 12 + (b.month() as i32 - a.month() as i32);
        let mut index = (elapsed_months.max(0) as u32) / self.months();

        while index > 0 && self.period_start(anchor, index) > at {
            index -= 1;
        }
        while self.period_start(anchor, index + 1) <= at {
            index += 1;
        }

        BillingPeriod {
            start: self.period_start(anchor, index),
            end: self.period_start(anchor, index + 1),
        }
    }
}

impl fmt::Display for BillingInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillingInterval {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(BillingInterval::Monthly),
            "yearly" => Ok(BillingInterval::Yearly),
            other => Err(ValidationError::invalid_format(
                "billing_interval",
                format!("unknown interval '{}'", other),
            )),
        }
    }
}
