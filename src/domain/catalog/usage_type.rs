//! Metered feature kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// A metered feature. Each has its own counter and quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageType {
    AiQuery,
    CaseSearch,
    InteractionCheck,
}

impl UsageType {
    /// Every usage type, in display order.
    pub const ALL: [UsageType; 3] = [
        UsageType::AiQuery,
        UsageType::CaseSearch,
        UsageType::InteractionCheck,
    ];

    /// Returns the wire/storage name.
    pub fn as_str(&self) -> &'static str {
        match self {
            UsageType::AiQuery => "ai_query",
            UsageType::CaseSearch => "case_search",
            UsageType::InteractionCheck => "interaction_check",
        }
    }
}

impl fmt::Display for UsageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UsageType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ai_query" => Ok(UsageType::AiQuery),
            "case_search" => Ok(UsageType::CaseSearch),
            "interaction_check" => Ok(UsageType::InteractionCheck),
            other => Err(ValidationError::invalid_format(
                "usage_type",
                format!("unknown usage type '{}'", other),
            )),
        }
    }
}
