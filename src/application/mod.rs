//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Shared services:
//!
//! - `metering` - usage store access with bounded conflict retries
//! - `lifecycle` - lazy rollover and version-checked subscription writes
//! - `locks` - per-subscription serialization of billing events

pub mod handlers;
pub mod lifecycle;
pub mod locks;
pub mod metering;

pub use lifecycle::SubscriptionLifecycle;
pub use locks::SubscriptionLocks;
pub use metering::{MeteringEngine, QuotaResolver};
