//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `SubscriptionRepository` - Subscription aggregate with optimistic locking
//! - `UsageStore` - Per-period usage counters with atomic compare-and-increment
//! - `BillingLedger` - Append-only charge attempts
//! - `ProcessedEventStore` - Payment event idempotency
//!
//! ## Runtime Ports
//!
//! - `Clock` - Injected time
//! - `RetryScheduler` - External timer for billing retries

mod billing_ledger;
mod clock;
mod processed_event_store;
mod retry_scheduler;
mod subscription_repository;
mod usage_store;

pub use billing_ledger::BillingLedger;
pub use clock::Clock;
pub use processed_event_store::{ProcessedEventRecord, ProcessedEventStore, SaveResult};
pub use retry_scheduler::{RetryScheduler, ScheduledRetry};
pub use subscription_repository::SubscriptionRepository;
pub use usage_store::UsageStore;
