//! Plan catalog domain module.
//!
//! Tiers, their hierarchy, prices and per-usage-type quotas. Pure data with
//! no side effects.
//!
//! # Module Structure
//!
//! - `usage_type` - Metered feature kinds
//! - `quota` - Limited / unlimited allowance
//! - `interval` - Billing intervals and period arithmetic
//! - `plan` - Plan and tier identifier
//! - `plan_catalog` - Catalog lookups and loading

mod errors;
mod interval;
mod plan;
mod plan_catalog;
mod quota;
mod usage_type;

pub use errors::CatalogError;
pub use interval::BillingInterval;
pub use plan::{Plan, TierId};
pub use plan_catalog::{PlanCatalog, TierChange};
pub use quota::Quota;
pub use usage_type::UsageType;
