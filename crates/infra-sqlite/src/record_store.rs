// SQLite Record Store Implementation

use crate::connection::DatabaseHandle;
use crate::error::map_sqlx_error;
use crate::transaction::SqliteAggregateTransaction;
use async_trait::async_trait;
use optical_core::domain::{
    Aggregate, AggregateSummary, Customer, CustomerId, CustomerRecord, EyeMeasurement,
    ExportBundle, Prescription, Product,
};
use optical_core::error::Result;
use optical_core::port::{AggregateTransaction, RecordStore, TransactionalRecordStore};
use std::sync::Arc;
use tracing::{debug, info};

const SUMMARY_SELECT: &str = r#"
    SELECT c.id, c.name, c.phone, c.record_date, p.frame_name, p.total_cost
    FROM customers c
    LEFT JOIN products p ON p.customer_id = c.id
"#;

const SUMMARY_ORDER: &str = " ORDER BY c.record_date DESC, c.id DESC";

const CUSTOMER_COLUMNS: &str = "c.id, c.name, c.phone, c.record_date, c.created_at, c.updated_at";

/// Customer aggregate store over the shared database handle
///
/// Every operation holds the shared side of the handle lock for its whole
/// duration and acquires it exactly once.
pub struct SqliteRecordStore {
    handle: Arc<DatabaseHandle>,
    case_insensitive: bool,
}

impl SqliteRecordStore {
    pub fn new(handle: Arc<DatabaseHandle>) -> Self {
        Self {
            handle,
            case_insensitive: false,
        }
    }

    /// Opt into case-insensitive substring matching
    ///
    /// Only the substring filters fold case. Exact name or phone matches stay
    /// case-sensitive, so "ALICE SHARMA" still resolves as a partial match of
    /// "Alice Sharma" in this mode.
    pub fn with_case_insensitive_search(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    /// Delete a customer; prescriptions and products go with it
    ///
    /// Returns false when no such customer exists.
    pub async fn delete_customer(&self, id: CustomerId) -> Result<bool> {
        let guard = self.handle.shared().await?;
        let result = sqlx::query("DELETE FROM customers WHERE id = ?")
            .bind(id)
            .execute(guard.pool())
            .await
            .map_err(map_sqlx_error)?;

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(customer_id = id, "Customer deleted with dependent records");
        }
        Ok(deleted)
    }

    /// Substring predicate on a single column
    fn contains(&self, column: &str) -> String {
        if self.case_insensitive {
            format!("instr(lower({}), lower(?)) > 0", column)
        } else {
            format!("instr({}, ?) > 0", column)
        }
    }

    /// Equality predicate; case-sensitive in every mode
    fn equals(column: &str) -> String {
        format!("{} = ?", column)
    }

    /// name OR phone OR frame_name substring filter (three binds)
    fn three_way_filter(&self) -> String {
        format!(
            " WHERE {} OR {} OR {}",
            self.contains("c.name"),
            self.contains("c.phone"),
            self.contains("p.frame_name")
        )
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn list_aggregates(&self, filter: Option<&str>) -> Result<Vec<AggregateSummary>> {
        let guard = self.handle.shared().await?;

        let rows: Vec<SummaryRow> = match filter {
            Some(term) => {
                let sql = format!("{}{}{}", SUMMARY_SELECT, self.three_way_filter(), SUMMARY_ORDER);
                sqlx::query_as::<_, SummaryRow>(&sql)
                    .bind(term)
                    .bind(term)
                    .bind(term)
                    .fetch_all(guard.pool())
                    .await
            }
            None => {
                let sql = format!("{}{}", SUMMARY_SELECT, SUMMARY_ORDER);
                sqlx::query_as::<_, SummaryRow>(&sql)
                    .fetch_all(guard.pool())
                    .await
            }
        }
        .map_err(map_sqlx_error)?;

        debug!(filter = ?filter, rows = rows.len(), "Listed aggregates");
        Ok(rows.into_iter().map(SummaryRow::into_summary).collect())
    }

    async fn find_by_id(&self, id: CustomerId) -> Result<Option<Aggregate>> {
        let guard = self.handle.shared().await?;
        let pool = guard.pool();

        let customer_sql = format!("SELECT {} FROM customers c WHERE c.id = ?", CUSTOMER_COLUMNS);
        let customer: Option<CustomerRow> = sqlx::query_as(&customer_sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(map_sqlx_error)?;

        let Some(customer) = customer else {
            return Ok(None);
        };

        let prescription: Option<PrescriptionRow> = sqlx::query_as(
            "SELECT * FROM prescriptions WHERE customer_id = ? ORDER BY id LIMIT 1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx_error)?;

        let product: Option<ProductRow> =
            sqlx::query_as("SELECT * FROM products WHERE customer_id = ? ORDER BY id LIMIT 1")
                .bind(id)
                .fetch_optional(pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(Some(Aggregate {
            customer: customer.into_customer(),
            prescription: prescription.map(|r| r.into_prescription()),
            product: product.map(|r| r.into_product()),
        }))
    }

    async fn find_exact_matches(&self, term: &str) -> Result<Vec<CustomerId>> {
        let guard = self.handle.shared().await?;
        let sql = format!(
            "SELECT c.id FROM customers c WHERE {} OR {} ORDER BY c.id",
            Self::equals("c.name"),
            Self::equals("c.phone")
        );

        sqlx::query_scalar(&sql)
            .bind(term)
            .bind(term)
            .fetch_all(guard.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn find_partial_matches(&self, term: &str) -> Result<Vec<CustomerId>> {
        let guard = self.handle.shared().await?;
        let sql = format!(
            "SELECT c.id FROM customers c WHERE {} OR {} ORDER BY c.id",
            self.contains("c.name"),
            self.contains("c.phone")
        );

        sqlx::query_scalar(&sql)
            .bind(term)
            .bind(term)
            .fetch_all(guard.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn export(&self, filter: Option<&str>) -> Result<ExportBundle> {
        let guard = self.handle.shared().await?;

        // One read transaction so the three result sets agree
        let mut tx = guard.pool().begin().await.map_err(map_sqlx_error)?;

        let selected = match filter {
            Some(_) => format!(
                "SELECT DISTINCT c.id FROM customers c LEFT JOIN products p ON p.customer_id = c.id{}",
                self.three_way_filter()
            ),
            None => "SELECT c.id FROM customers c".to_string(),
        };
        let binds: Vec<&str> = filter.map(|term| vec![term; 3]).unwrap_or_default();

        let customers_sql = format!(
            "SELECT {} FROM customers c WHERE c.id IN ({}) ORDER BY c.record_date DESC, c.id DESC",
            CUSTOMER_COLUMNS, selected
        );
        let mut query = sqlx::query_as::<_, CustomerRow>(&customers_sql);
        for term in &binds {
            query = query.bind(*term);
        }
        let customers = query.fetch_all(&mut *tx).await.map_err(map_sqlx_error)?;

        let prescriptions_sql = format!(
            "SELECT * FROM prescriptions WHERE customer_id IN ({}) ORDER BY customer_id, id",
            selected
        );
        let mut query = sqlx::query_as::<_, PrescriptionRow>(&prescriptions_sql);
        for term in &binds {
            query = query.bind(*term);
        }
        let prescriptions = query.fetch_all(&mut *tx).await.map_err(map_sqlx_error)?;

        let products_sql = format!(
            "SELECT * FROM products WHERE customer_id IN ({}) ORDER BY customer_id, id",
            selected
        );
        let mut query = sqlx::query_as::<_, ProductRow>(&products_sql);
        for term in &binds {
            query = query.bind(*term);
        }
        let products = query.fetch_all(&mut *tx).await.map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        let bundle = ExportBundle::new(
            customers.into_iter().map(CustomerRow::into_customer).collect(),
            prescriptions
                .into_iter()
                .map(|r| CustomerRecord {
                    customer_id: r.customer_id,
                    record: r.into_prescription(),
                })
                .collect(),
            products
                .into_iter()
                .map(|r| CustomerRecord {
                    customer_id: r.customer_id,
                    record: r.into_product(),
                })
                .collect(),
        );

        info!(
            customers = bundle.summary.total_customers,
            total_revenue = bundle.summary.total_revenue,
            "Export read completed"
        );
        Ok(bundle)
    }
}

#[async_trait]
impl TransactionalRecordStore for SqliteRecordStore {
    async fn begin_transaction(&self) -> Result<Box<dyn AggregateTransaction>> {
        let guard = self.handle.shared().await?;
        let tx = SqliteAggregateTransaction::begin(guard).await?;
        Ok(Box::new(tx))
    }
}

/// Row of the customer/product summary join
#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    id: i64,
    name: String,
    phone: Option<String>,
    record_date: String,
    frame_name: Option<String>,
    total_cost: Option<f64>,
}

impl SummaryRow {
    fn into_summary(self) -> AggregateSummary {
        AggregateSummary {
            id: self.id,
            name: self.name,
            phone: self.phone,
            record_date: self.record_date,
            frame_name: self.frame_name.unwrap_or_default(),
            total_cost: self.total_cost.unwrap_or(0.0),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CustomerRow {
    id: i64,
    name: String,
    phone: Option<String>,
    record_date: String,
    created_at: String,
    updated_at: String,
}

impl CustomerRow {
    fn into_customer(self) -> Customer {
        Customer {
            id: self.id,
            name: self.name,
            phone: self.phone,
            record_date: self.record_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PrescriptionRow {
    customer_id: i64,
    right_sph: String,
    right_cyl: String,
    right_axis: String,
    right_add: String,
    left_sph: String,
    left_cyl: String,
    left_axis: String,
    left_add: String,
}

impl PrescriptionRow {
    fn into_prescription(self) -> Prescription {
        Prescription {
            right: EyeMeasurement::new(self.right_sph, self.right_cyl, self.right_axis, self.right_add),
            left: EyeMeasurement::new(self.left_sph, self.left_cyl, self.left_axis, self.left_add),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    customer_id: i64,
    frame_name: String,
    lens_name: String,
    frame_cost: f64,
    lens_cost: f64,
    total_cost: f64,
}

impl ProductRow {
    fn into_product(self) -> Product {
        Product {
            frame_name: self.frame_name,
            lens_name: self.lens_name,
            frame_cost: self.frame_cost,
            lens_cost: self.lens_cost,
            total_cost: self.total_cost,
        }
    }
}
