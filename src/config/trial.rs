//! Free trial configuration.

use serde::Deserialize;
use std::collections::HashMap;

use crate::domain::catalog::{Quota, TierId, UsageType};
use crate::domain::subscription::TrialPolicy;

use super::error::ValidationError;

/// Trial configuration
///
/// Quota overrides are keyed by usage type, with values that are either a
/// count or `unlimited`:
/// `METERING__TRIAL__QUOTA_OVERRIDES__AI_QUERY=30`.
/// Leaving them unset keeps the built-in overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct TrialConfig {
    #[serde(default = "default_days")]
    pub days: u32,

    #[serde(default = "default_tier")]
    pub tier: String,

    #[serde(default)]
    pub quota_overrides: Option<HashMap<String, String>>,
}

impl TrialConfig {
    pub fn policy(&self) -> Result<TrialPolicy, ValidationError> {
        if self.days == 0 || self.days > 90 {
            return Err(ValidationError::InvalidTrial(format!(
                "days must be between 1 and 90, got {}",
                self.days
            )));
        }
        let tier = TierId::new(self.tier.as_str())
            .map_err(|e| ValidationError::InvalidTrial(e.to_string()))?;

        let quota_overrides = match &self.quota_overrides {
            None => TrialPolicy::default().quota_overrides,
            Some(raw) => raw
                .iter()
                .map(|(usage_type, quota)| Ok((parse_usage_type(usage_type)?, parse_quota(quota)?)))
                .collect::<Result<HashMap<_, _>, ValidationError>>()?,
        };

        Ok(TrialPolicy {
            days: self.days,
            tier,
            quota_overrides,
        })
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.policy().map(|_| ())
    }
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            days: default_days(),
            tier: default_tier(),
            quota_overrides: None,
        }
    }
}

fn parse_usage_type(raw: &str) -> Result<UsageType, ValidationError> {
    raw.trim()
        .to_ascii_lowercase()
        .parse()
        .map_err(|e: crate::domain::foundation::ValidationError| {
            ValidationError::InvalidTrial(e.to_string())
        })
}

fn parse_quota(raw: &str) -> Result<Quota, ValidationError> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("unlimited") {
        return Ok(Quota::Unlimited);
    }
    raw.parse::<u32>()
        .map(Quota::Limited)
        .map_err(|_| ValidationError::InvalidTrial(format!("invalid quota '{}'", raw)))
}

fn default_days() -> u32 {
    TrialPolicy::default().days
}

fn default_tier() -> String {
    TrialPolicy::default().tier.as_str().to_string()
}
