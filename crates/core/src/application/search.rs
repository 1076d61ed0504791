// Search Resolver - two-tier exact / unique-partial resolution

use crate::domain::{Aggregate, AggregateSummary, CustomerId};
use crate::error::Result;
use crate::port::RecordStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// How (or whether) a search jumped straight to one customer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Resolution {
    /// Name or phone equals the term for exactly one customer
    Exact(CustomerId),
    /// Name or phone contains the term for exactly one customer
    UniquePartial(CustomerId),
    Unresolved,
}

impl Resolution {
    pub fn customer_id(&self) -> Option<CustomerId> {
        match self {
            Resolution::Exact(id) | Resolution::UniquePartial(id) => Some(*id),
            Resolution::Unresolved => None,
        }
    }
}

/// Result of a search: always the filtered list, sometimes a resolved record
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub term: String,
    pub rows: Vec<AggregateSummary>,
    pub resolution: Resolution,
    pub resolved: Option<Aggregate>,
}

/// Search Resolver
///
/// 1. blank term: full list, no resolution
/// 2. exactly one exact name/phone match: resolve to it
/// 3. else exactly one substring name/phone match: resolve to it
/// 4. else list only
///
/// Step 2 wins over step 3 even when other rows also contain the term.
pub struct SearchResolver {
    store: Arc<dyn RecordStore>,
}

impl SearchResolver {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, raw: &str) -> Result<SearchOutcome> {
        let term = raw.trim();

        if term.is_empty() {
            return Ok(SearchOutcome {
                term: String::new(),
                rows: self.store.list_aggregates(None).await?,
                resolution: Resolution::Unresolved,
                resolved: None,
            });
        }

        let resolution = self.classify(term).await?;
        debug!(term = %term, resolution = ?resolution, "Search classified");

        let resolved = match resolution.customer_id() {
            Some(id) => self.store.find_by_id(id).await?,
            None => None,
        };

        Ok(SearchOutcome {
            term: term.to_string(),
            rows: self.store.list_aggregates(Some(term)).await?,
            resolution,
            resolved,
        })
    }

    async fn classify(&self, term: &str) -> Result<Resolution> {
        if let [id] = self.store.find_exact_matches(term).await?.as_slice() {
            return Ok(Resolution::Exact(*id));
        }

        if let [id] = self.store.find_partial_matches(term).await?.as_slice() {
            return Ok(Resolution::UniquePartial(*id));
        }

        Ok(Resolution::Unresolved)
    }
}
