//! Free-trial rules.

use std::collections::HashMap;

use crate::domain::catalog::{Quota, TierId, UsageType};

/// Trial length, tier and quota overrides.
///
/// An account gets at most one trial, ever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialPolicy {
    pub days: u32,
    pub tier: TierId,
    pub quota_overrides: HashMap<UsageType, Quota>,
}

impl TrialPolicy {
    /// Quota override for a usage type while trialing, if any.
    pub fn override_for(&self, usage_type: UsageType) -> Option<Quota> {
        self.quota_overrides.get(&usage_type).copied()
    }
}

impl Default for TrialPolicy {
    /// Seven days of `professional` with AI queries capped at 30.
    fn default() -> Self {
        Self {
            days: 7,
            tier: TierId("professional".to_string()),
            quota_overrides: HashMap::from([(UsageType::AiQuery, Quota::Limited(30))]),
        }
    }
}
