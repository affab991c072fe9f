//! Per-period usage allowance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How many uses of a feature a period allows.
///
/// Serialized as a plain integer or the string `"unlimited"`, which keeps
/// catalog files readable:
///
/// ```yaml
/// ai_query: 50
/// case_search: unlimited
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "QuotaRepr", into = "QuotaRepr")]
pub enum Quota {
    Limited(u32),
    Unlimited,
}

impl Quota {
    /// Returns true if one more use is allowed after `used` uses.
    pub fn allows(&self, used: u32) -> bool {
        match self {
            Quota::Limited(limit) => used < *limit,
            Quota::Unlimited => true,
        }
    }

    /// Uses left in the period; `None` when unlimited.
    pub fn remaining(&self, used: u32) -> Option<u32> {
        match self {
            Quota::Limited(limit) => Some(limit.saturating_sub(used)),
            Quota::Unlimited => None,
        }
    }

    /// A zero quota means the feature is not part of the plan at all.
    pub fn is_zero(&self) -> bool {
        matches!(self, Quota::Limited(0))
    }

    /// The numeric limit, `None` when unlimited.
    pub fn as_limit(&self) -> Option<u32> {
        match self {
            Quota::Limited(limit) => Some(*limit),
            Quota::Unlimited => None,
        }
    }

    /// Signed representation used by storage and the HTTP API (`-1` = unlimited).
    pub fn as_signed(&self) -> i64 {
        match self {
            Quota::Limited(limit) => i64::from(*limit),
            Quota::Unlimited => -1,
        }
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quota::Limited(limit) => write!(f, "{}", limit),
            Quota::Unlimited => f.write_str("unlimited"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum QuotaRepr {
    Count(u32),
    Keyword(String),
}

impl TryFrom<QuotaRepr> for Quota {
    type Error = String;

    fn try_from(repr: QuotaRepr) -> Result<Self, Self::Error> {
        match repr {
            QuotaRepr::Count(limit) => Ok(Quota::Limited(limit)),
            QuotaRepr::Keyword(word) if word.eq_ignore_ascii_case("unlimited") => {
                Ok(Quota::Unlimited)
            }
            QuotaRepr::Keyword(word) => Err(format!(
                "quota must be a non-negative integer or 'unlimited', got '{}'",
                word
            )),
        }
    }
}

impl From<Quota> for QuotaRepr {
    fn from(quota: Quota) -> Self {
        match quota {
            Quota::Limited(limit) => QuotaRepr::Count(limit),
            Quota::Unlimited => QuotaRepr::Keyword("unlimited".to_string()),
        }
    }
}
