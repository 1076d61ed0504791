// Record Service - Core use cases for the customer aggregate

pub mod create;

#[cfg(test)]
mod create_test;

pub use create::CreateAggregateRequest;

use crate::application::search::{SearchOutcome, SearchResolver};
use crate::domain::{Aggregate, AggregateSummary, CustomerId, ExportBundle};
use crate::error::{AppError, Result};
use crate::port::{RecordStore, TimeProvider, TransactionalRecordStore};
use std::sync::Arc;

/// Record Service
///
/// The read/write contract the UI and reporting layers call into. Every call
/// goes straight to the store; there is no cache.
pub struct RecordService {
    store: Arc<dyn RecordStore>,
    tx_store: Arc<dyn TransactionalRecordStore>,
    time_provider: Arc<dyn TimeProvider>,
    resolver: SearchResolver,
}

impl RecordService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        tx_store: Arc<dyn TransactionalRecordStore>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            resolver: SearchResolver::new(Arc::clone(&store)),
            store,
            tx_store,
            time_provider,
        }
    }

    /// Create customer, prescription and product in one transaction
    pub async fn create_aggregate(&self, req: CreateAggregateRequest) -> Result<CustomerId> {
        create::execute(self.tx_store.as_ref(), self.time_provider.as_ref(), req).await
    }

    /// Summary rows, optionally filtered by name/phone/frame substring
    pub async fn list_aggregates(&self, filter: Option<&str>) -> Result<Vec<AggregateSummary>> {
        self.store.list_aggregates(filter).await
    }

    /// Full aggregate, or `AppError::NotFound`
    pub async fn get_aggregate(&self, id: CustomerId) -> Result<Aggregate> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(AppError::NotFound(id))
    }

    /// Search with exact / unique-partial resolution
    pub async fn search(&self, raw: &str) -> Result<SearchOutcome> {
        self.resolver.resolve(raw).await
    }

    /// Bulk read for exports
    pub async fn export(&self, filter: Option<&str>) -> Result<ExportBundle> {
        let filter = filter.map(str::trim).filter(|f| !f.is_empty());
        self.store.export(filter).await
    }
}
