//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, and error types that form the
//! vocabulary of the subscription engine.

mod errors;
mod ids;
mod period;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{AccountId, BillingEventId, SubscriptionId};
pub use period::BillingPeriod;
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
