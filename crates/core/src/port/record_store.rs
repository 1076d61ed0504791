// Record Store Port (Interface)

use crate::domain::{Aggregate, AggregateSummary, CustomerId, ExportBundle};
use crate::error::Result;
use async_trait::async_trait;

/// Read side of the customer aggregate store
///
/// Substring filters are case-sensitive unless the adapter is explicitly
/// configured for case-insensitive matching.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Summary rows ordered by record date (newest first)
    ///
    /// A filter matches name OR phone OR frame name as a substring.
    async fn list_aggregates(&self, filter: Option<&str>) -> Result<Vec<AggregateSummary>>;

    /// Full aggregate by customer id
    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Aggregate>>;

    /// Customers whose name or phone equals `term`
    async fn find_exact_matches(&self, term: &str) -> Result<Vec<CustomerId>>;

    /// Customers whose name or phone contains `term`
    async fn find_partial_matches(&self, term: &str) -> Result<Vec<CustomerId>>;

    /// Bulk read for the reporting layer, filtered like `list_aggregates`
    async fn export(&self, filter: Option<&str>) -> Result<ExportBundle>;
}

pub mod mocks {
    use super::*;
    use crate::domain::CustomerRecord;
    use std::sync::Mutex;

    /// In-memory record store for resolver tests
    #[derive(Default)]
    pub struct MockRecordStore {
        aggregates: Mutex<Vec<Aggregate>>,
    }

    impl MockRecordStore {
        pub fn new(aggregates: Vec<Aggregate>) -> Self {
            Self {
                aggregates: Mutex::new(aggregates),
            }
        }

        fn matching<F>(&self, predicate: F) -> Vec<Aggregate>
        where
            F: Fn(&Aggregate) -> bool,
        {
            self.aggregates
                .lock()
                .unwrap()
                .iter()
                .filter(|a| predicate(a))
                .cloned()
                .collect()
        }
    }

    fn name_or_phone(aggregate: &Aggregate, test: impl Fn(&str) -> bool) -> bool {
        test(&aggregate.customer.name) || aggregate.customer.phone.as_deref().is_some_and(&test)
    }

    fn frame_name(aggregate: &Aggregate) -> &str {
        aggregate
            .product
            .as_ref()
            .map(|p| p.frame_name.as_str())
            .unwrap_or("")
    }

    #[async_trait]
    impl RecordStore for MockRecordStore {
        async fn list_aggregates(&self, filter: Option<&str>) -> Result<Vec<AggregateSummary>> {
            let mut rows: Vec<AggregateSummary> = self
                .matching(|a| match filter {
                    Some(term) => {
                        name_or_phone(a, |v| v.contains(term)) || frame_name(a).contains(term)
                    }
                    None => true,
                })
                .into_iter()
                .map(|a| AggregateSummary {
                    id: a.customer.id,
                    frame_name: frame_name(&a).to_string(),
                    total_cost: a.product.as_ref().map(|p| p.total_cost).unwrap_or(0.0),
                    name: a.customer.name,
                    phone: a.customer.phone,
                    record_date: a.customer.record_date,
                })
                .collect();

            rows.sort_by(|a, b| b.record_date.cmp(&a.record_date).then(b.id.cmp(&a.id)));
            Ok(rows)
        }

        async fn find_by_id(&self, id: CustomerId) -> Result<Option<Aggregate>> {
            Ok(self.matching(|a| a.customer.id == id).into_iter().next())
        }

        async fn find_exact_matches(&self, term: &str) -> Result<Vec<CustomerId>> {
            Ok(self
                .matching(|a| name_or_phone(a, |v| v == term))
                .iter()
                .map(Aggregate::id)
                .collect())
        }

        async fn find_partial_matches(&self, term: &str) -> Result<Vec<CustomerId>> {
            Ok(self
                .matching(|a| name_or_phone(a, |v| v.contains(term)))
                .iter()
                .map(Aggregate::id)
                .collect())
        }

        async fn export(&self, filter: Option<&str>) -> Result<ExportBundle> {
            let ids: Vec<CustomerId> = self
                .list_aggregates(filter)
                .await?
                .into_iter()
                .map(|row| row.id)
                .collect();
            let selected = self.matching(|a| ids.contains(&a.customer.id));

            let prescriptions = selected
                .iter()
                .filter_map(|a| {
                    a.prescription.clone().map(|record| CustomerRecord {
                        customer_id: a.id(),
                        record,
                    })
                })
                .collect();
            let products = selected
                .iter()
                .filter_map(|a| {
                    a.product.clone().map(|record| CustomerRecord {
                        customer_id: a.id(),
                        record,
                    })
                })
                .collect();

            Ok(ExportBundle::new(
                selected.into_iter().map(|a| a.customer).collect(),
                prescriptions,
                products,
            ))
        }
    }
}
