//! Plan definitions.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::domain::foundation::ValidationError;

use super::{BillingInterval, Quota, UsageType};

/// Identifier of a configured tier (`free`, `basic`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TierId(pub(crate) String);

impl TierId {
    /// Creates a tier id. Tier ids are lower-case and never empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into().trim().to_ascii_lowercase();
        if id.is_empty() {
            return Err(ValidationError::empty_field("tier"));
        }
        Ok(Self(id))
    }

    /// Returns the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TierId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TierId::new(value)
    }
}

impl From<TierId> for String {
    fn from(tier: TierId) -> Self {
        tier.0
    }
}

impl fmt::Display for TierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A purchasable plan.
///
/// Prices are integer minor currency units. Usage types missing from
/// `quotas` are not part of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub tier: TierId,
    pub rank: u8,
    pub display_name: String,
    pub monthly_price: i64,
    pub yearly_price: i64,
    #[serde(default)]
    pub quotas: HashMap<UsageType, Quota>,
    /// Informational per-unit overage price. The engine never bills overage.
    #[serde(default)]
    pub overage_price: Option<i64>,
}

impl Plan {
    /// Quota for a usage type; absent entries are `Limited(0)`.
    pub fn quota(&self, usage_type: UsageType) -> Quota {
        self.quotas
            .get(&usage_type)
            .copied()
            .unwrap_or(Quota::Limited(0))
    }

    /// Price for one period of the given interval.
    pub fn price(&self, interval: BillingInterval) -> i64 {
        match interval {
            BillingInterval::Monthly => self.monthly_price,
            BillingInterval::Yearly => self.yearly_price,
        }
    }

    /// True for the no-charge entry tier.
    pub fn is_free(&self) -> bool {
        self.monthly_price == 0 && self.yearly_price == 0
    }
}
