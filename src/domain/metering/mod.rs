//! Usage metering domain module.
//!
//! - `usage_record` - Per-period counters and compare-and-increment
//! - `access` - Access decisions and deny reasons

mod access;
mod usage_record;

pub use access::{AccessDecision, DenyReason, SuggestedAction};
pub use usage_record::{ConsumeOutcome, UsageRecord};
