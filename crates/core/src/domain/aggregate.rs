// Customer Aggregate - Customer + Prescription + Product read as one unit

use super::customer::{Customer, CustomerId};
use super::prescription::Prescription;
use super::product::Product;
use serde::{Deserialize, Serialize};

/// Full aggregate as returned by `get_aggregate`
///
/// Prescription and product are optional only because the read is a left
/// join; aggregates written through the record service always have both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub customer: Customer,
    pub prescription: Option<Prescription>,
    pub product: Option<Product>,
}

impl Aggregate {
    pub fn id(&self) -> CustomerId {
        self.customer.id
    }
}

/// One row of the customer list
///
/// A customer without a product shows an empty frame name and a zero total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub id: CustomerId,
    pub name: String,
    pub phone: Option<String>,
    pub record_date: String,
    pub frame_name: String,
    pub total_cost: f64,
}

/// A dependent row tagged with its owning customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord<T> {
    pub customer_id: CustomerId,
    #[serde(flatten)]
    pub record: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub total_customers: usize,
    pub total_revenue: f64,
}

/// Bulk read for the reporting layer (one table per entity plus a summary)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub customers: Vec<Customer>,
    pub prescriptions: Vec<CustomerRecord<Prescription>>,
    pub products: Vec<CustomerRecord<Product>>,
    pub summary: ExportSummary,
}

impl ExportBundle {
    pub fn new(
        customers: Vec<Customer>,
        prescriptions: Vec<CustomerRecord<Prescription>>,
        products: Vec<CustomerRecord<Product>>,
    ) -> Self {
        let summary = ExportSummary {
            total_customers: customers.len(),
            total_revenue: products.iter().map(|p| p.record.total_cost).sum(),
        };

        Self {
            customers,
            prescriptions,
            products,
            summary,
        }
    }
}
