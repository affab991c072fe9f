//! The plan catalog.
//!
//! Read-only at runtime; shared behind an `Arc` with no locking.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use super::{BillingInterval, CatalogError, Plan, Quota, TierId, UsageType};

/// Direction of a tier change, by rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierChange {
    Upgrade,
    Downgrade,
    Same,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    plans: Vec<Plan>,
}

/// Configured mapping of tiers to ranks, prices and quotas.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: HashMap<TierId, Plan>,
    free_tier: TierId,
}

impl PlanCatalog {
    /// Builds a catalog, validating that tiers and ranks are unique and that
    /// exactly one rank-0 plan exists to act as the free tier.
    pub fn from_plans(plans: Vec<Plan>) -> Result<Self, CatalogError> {
        if plans.is_empty() {
            return Err(CatalogError::Invalid("catalog has no plans".to_string()));
        }

        let mut ranks = HashSet::new();
        let mut by_tier = HashMap::with_capacity(plans.len());
        let mut free_tier = None;

        for plan in plans {
            if !ranks.insert(plan.rank) {
                return Err(CatalogError::Invalid(format!(
                    "rank {} is used by more than one plan",
                    plan.rank
                )));
            }
            if plan.monthly_price < 0 || plan.yearly_price < 0 {
                return Err(CatalogError::Invalid(format!(
                    "plan '{}' has a negative price",
                    plan.tier
                )));
            }
            if plan.rank == 0 {
                free_tier = Some(plan.tier.clone());
            }
            if by_tier.insert(plan.tier.clone(), plan).is_some() {
                return Err(CatalogError::Invalid("duplicate tier id".to_string()));
            }
        }

        let free_tier = free_tier
            .ok_or_else(|| CatalogError::Invalid("no rank 0 (free) plan".to_string()))?;

        Ok(Self {
            plans: by_tier,
            free_tier,
        })
    }

    /// Parses a catalog from YAML (`plans: [...]`).
    pub fn from_yaml(yaml: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile =
            serde_yaml::from_str(yaml).map_err(|e| CatalogError::Load(e.to_string()))?;
        Self::from_plans(file.plans)
    }

    /// Reads and parses a YAML catalog file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Load(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&contents)
    }

    /// Looks up a plan.
    pub fn plan(&self, tier: &TierId) -> Result<&Plan, CatalogError> {
        self.plans
            .get(tier)
            .ok_or_else(|| CatalogError::UnknownTier(tier.to_string()))
    }

    /// Quota of `usage_type` on `tier`.
    pub fn limit_for(&self, tier: &TierId, usage_type: UsageType) -> Result<Quota, CatalogError> {
        Ok(self.plan(tier)?.quota(usage_type))
    }

    /// Rank of `tier` in the plan hierarchy.
    pub fn rank(&self, tier: &TierId) -> Result<u8, CatalogError> {
        Ok(self.plan(tier)?.rank)
    }

    pub fn price_for(&self, tier: &TierId, interval: BillingInterval) -> Result<i64, CatalogError> {
        Ok(self.plan(tier)?.price(interval))
    }

    /// Compares two tiers by rank.
    pub fn compare(&self, from: &TierId, to: &TierId) -> Result<TierChange, CatalogError> {
        let from_rank = self.rank(from)?;
        let to_rank = self.rank(to)?;
        Ok(match to_rank.cmp(&from_rank) {
            std::cmp::Ordering::Greater => TierChange::Upgrade,
            std::cmp::Ordering::Less => TierChange::Downgrade,
            std::cmp::Ordering::Equal => TierChange::Same,
        })
    }

    /// The rank-0 tier new accounts land on.
    pub fn free_tier(&self) -> &TierId {
        &self.free_tier
    }

    pub fn is_free(&self, tier: &TierId) -> bool {
        tier == &self.free_tier
    }

    /// All plans ordered by rank.
    pub fn plans(&self) -> Vec<&Plan> {
        let mut plans: Vec<&Plan> = self.plans.values().collect();
        plans.sort_by_key(|p| p.rank);
        plans
    }
}

impl Default for PlanCatalog {
    /// The production price list.
    ///
    /// | Tier | Monthly | Yearly | ai_query | case_search | interaction_check |
    /// |------|---------|--------|----------|-------------|-------------------|
    /// | free | 0 | 0 | 10 | 10 | 10 |
    /// | basic | 19,900 | 199,000 | 50 | 200 | 200 |
    /// | professional | 99,000 | 990,000 | 300 | unlimited | unlimited |
    /// | clinic | 199,000 | 1,990,000 | unlimited | unlimited | unlimited |
    fn default() -> Self {
        use Quota::{Limited, Unlimited};
        use UsageType::{AiQuery, CaseSearch, InteractionCheck};

        let plan = |tier: &str,
                    rank: u8,
                    display_name: &str,
                    prices: (i64, i64),
                    quotas: [Quota; 3],
                    overage_price: Option<i64>| Plan {
            tier: TierId(tier.to_string()),
            rank,
            display_name: display_name.to_string(),
            monthly_price: prices.0,
            yearly_price: prices.1,
            quotas: HashMap::from([
                (AiQuery, quotas[0]),
                (CaseSearch, quotas[1]),
                (InteractionCheck, quotas[2]),
            ]),
            overage_price,
        };

        let plans = [
            plan("free", 0, "Free", (0, 0), [Limited(10), Limited(10), Limited(10)], None),
            plan(
                "basic",
                1,
                "Basic",
                (19_900, 199_000),
                [Limited(50), Limited(200), Limited(200)],
                Some(500),
            ),
            plan(
                "professional",
                2,
                "Professional",
                (99_000, 990_000),
                [Limited(300), Unlimited, Unlimited],
                Some(300),
            ),
            plan(
                "clinic",
                3,
                "Clinic",
                (199_000, 1_990_000),
                [Unlimited, Unlimited, Unlimited],
                None,
            ),
        ];

        Self {
            free_tier: TierId("free".to_string()),
            plans: plans.into_iter().map(|p| (p.tier.clone(), p)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tier(id: &str) -> TierId {
        TierId::new(id).unwrap()
    }

    const YAML: &str = r#"
plans:
  - tier: free
    rank: 0
    display_name: Free
    monthly_price: 0
    yearly_price: 0
    quotas:
      ai_query: 5
  - tier: pro
    rank: 1
    display_name: Pro
    monthly_price: 1000
    yearly_price: 10000
    quotas:
      ai_query: unlimited
      case_search: 40
"#;

    #[test]
    fn default_catalog_matches_price_list() {
        let catalog = PlanCatalog::default();

        assert_eq!(catalog.free_tier().as_str(), "free");
        assert_eq!(catalog.limit_for(&tier("free"), UsageType::AiQuery).unwrap(), Quota::Limited(10));
        assert_eq!(catalog.limit_for(&tier("basic"), UsageType::AiQuery).unwrap(), Quota::Limited(50));
        assert_eq!(
            catalog.limit_for(&tier("clinic"), UsageType::AiQuery).unwrap(),
            Quota::Unlimited
        );
        assert_eq!(
            catalog.price_for(&tier("professional"), BillingInterval::Yearly).unwrap(),
            990_000
        );
        assert_eq!(catalog.plans().len(), 4);
    }

    #[test]
    fn unknown_tier_is_an_error_not_a_default() {
        let catalog = PlanCatalog::default();
        let err = catalog.limit_for(&tier("enterprise"), UsageType::AiQuery).unwrap_err();
        assert_eq!(err, CatalogError::UnknownTier("enterprise".to_string()));
        assert!(catalog.rank(&tier("enterprise")).is_err());
    }

    #[test]
    fn compare_orders_by_rank() {
        let catalog = PlanCatalog::default();
        assert_eq!(catalog.compare(&tier("free"), &tier("clinic")).unwrap(), TierChange::Upgrade);
        assert_eq!(catalog.compare(&tier("clinic"), &tier("basic")).unwrap(), TierChange::Downgrade);
        assert_eq!(catalog.compare(&tier("basic"), &tier("basic")).unwrap(), TierChange::Same);
    }

    #[test]
    fn yaml_catalog_loads_with_unlimited_keyword() {
        let catalog = PlanCatalog::from_yaml(YAML).unwrap();

        assert_eq!(catalog.limit_for(&tier("pro"), UsageType::AiQuery).unwrap(), Quota::Unlimited);
        assert_eq!(catalog.limit_for(&tier("pro"), UsageType::CaseSearch).unwrap(), Quota::Limited(40));
        assert_eq!(
            catalog.limit_for(&tier("pro"), UsageType::InteractionCheck).unwrap(),
            Quota::Limited(0)
        );
    }

    #[test]
    fn catalog_loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let catalog = PlanCatalog::from_file(file.path()).unwrap();
        assert_eq!(catalog.rank(&tier("pro")).unwrap(), 1);
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = PlanCatalog::from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, CatalogError::Load(_)));
    }

    #[test]
    fn duplicate_ranks_are_rejected() {
        let yaml = r#"
plans:
  - { tier: free, rank: 0, display_name: Free, monthly_price: 0, yearly_price: 0 }
  - { tier: a, rank: 1, display_name: A, monthly_price: 1, yearly_price: 10 }
  - { tier: b, rank: 1, display_name: B, monthly_price: 2, yearly_price: 20 }
"#;
        assert!(matches!(PlanCatalog::from_yaml(yaml), Err(CatalogError::Invalid(_))));
    }

    #[test]
    fn catalog_without_free_plan_is_rejected() {
        let yaml = r#"
plans:
  - { tier: a, rank: 1, display_name: A, monthly_price: 1, yearly_price: 10 }
"#;
        assert!(matches!(PlanCatalog::from_yaml(yaml), Err(CatalogError::Invalid(_))));
    }
}
