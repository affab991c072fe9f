//! Subscription domain module.
//!
//! # Module Structure
//!
//! - `aggregate` - Subscription aggregate and period advancement
//! - `status` - SubscriptionStatus state machine
//! - `trial` - Trial policy
//! - `timing` - Immediate vs. period-end changes
//! - `errors` - SubscriptionError

mod aggregate;
mod errors;
mod status;
mod timing;
mod trial;

pub use aggregate::{EndReason, PeriodAdvance, Subscription};
pub use errors::SubscriptionError;
pub use status::SubscriptionStatus;
pub use timing::ChangeTiming;
pub use trial::TrialPolicy;
