//! PostgreSQL adapters - Database implementations for the persistence ports.
//!
//! - `PostgresSubscriptionRepository` - Subscriptions with version-checked updates
//! - `PostgresUsageStore` - Usage counters with conditional increments
//! - `PostgresBillingLedger` - Append-only billing attempts
//! - `PostgresProcessedEventStore` - Payment event idempotency

mod billing_ledger;
mod errors;
mod processed_event_store;
mod subscription_repository;
mod usage_store;

pub use billing_ledger::PostgresBillingLedger;
pub use processed_event_store::PostgresProcessedEventStore;
pub use subscription_repository::PostgresSubscriptionRepository;
pub use usage_store::PostgresUsageStore;
