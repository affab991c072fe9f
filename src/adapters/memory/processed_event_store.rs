//! In-memory processed payment event store.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{BillingEventId, DomainError};
use crate::ports::{ProcessedEventRecord, ProcessedEventStore, SaveResult};

#[derive(Default)]
pub struct InMemoryProcessedEventStore {
    records: RwLock<HashMap<BillingEventId, ProcessedEventRecord>>,
}

impl InMemoryProcessedEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn contains(&self, event_id: &BillingEventId) -> Result<bool, DomainError> {
        Ok(self.records.read().await.contains_key(event_id))
    }

    async fn find(&self, event_id: &BillingEventId) -> Result<Option<ProcessedEventRecord>, DomainError> {
        Ok(self.records.read().await.get(event_id).cloned())
    }

    async fn save(&self, record: ProcessedEventRecord) -> Result<SaveResult, DomainError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.event_id) {
            return Ok(SaveResult::AlreadyExists);
        }
        records.insert(record.event_id.clone(), record);
        Ok(SaveResult::Inserted)
    }
}
