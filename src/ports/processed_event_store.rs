//! ProcessedEventStore port - idempotency tracking for payment events.
//!
//! The processor may deliver the same event more than once (network
//! retries, 5xx from our endpoint, lost acknowledgements). Every event id is
//! recorded once processing finishes so redeliveries become no-ops.

use async_trait::async_trait;

use crate::domain::foundation::{BillingEventId, DomainError, SubscriptionId, Timestamp};

/// Record of a processed payment event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedEventRecord {
    pub event_id: BillingEventId,
    pub subscription_id: SubscriptionId,
    /// Short outcome label, e.g. "activated", "retry_scheduled", "out_of_order".
    pub result: String,
    pub processed_at: Timestamp,
}

/// Result of attempting to save a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    Inserted,
    /// Another worker saved the same event id first.
    AlreadyExists,
}

#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    async fn contains(&self, event_id: &BillingEventId) -> Result<bool, DomainError>;

    async fn find(&self, event_id: &BillingEventId) -> Result<Option<ProcessedEventRecord>, DomainError>;

    /// Insert-if-absent.
    async fn save(&self, record: ProcessedEventRecord) -> Result<SaveResult, DomainError>;
}
