//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, periods, errors)
//! - `catalog` - Tiers, prices and per-usage-type quotas
//! - `subscription` - Subscription aggregate and lifecycle state machine
//! - `metering` - Per-period usage counters and access decisions
//! - `billing` - Payment outcomes, attempt ledger and retry policy

pub mod billing;
pub mod catalog;
pub mod foundation;
pub mod metering;
pub mod subscription;
