//! In-memory adapters.
//!
//! Thread-safe via tokio locks. Used by tests and by the `memory` metering
//! backend; nothing survives a restart.

mod billing_ledger;
mod processed_event_store;
mod retry_scheduler;
mod subscription_repository;
mod usage_store;

pub use billing_ledger::InMemoryBillingLedger;
pub use processed_event_store::InMemoryProcessedEventStore;
pub use retry_scheduler::RecordingRetryScheduler;
pub use subscription_repository::InMemorySubscriptionRepository;
pub use usage_store::InMemoryUsageStore;
