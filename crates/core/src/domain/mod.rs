// Domain Layer - Pure business types for the customer aggregate

pub mod aggregate;
pub mod customer;
pub mod error;
pub mod maintenance;
pub mod prescription;
pub mod product;

// Re-exports
pub use aggregate::{Aggregate, AggregateSummary, CustomerRecord, ExportBundle, ExportSummary};
pub use customer::{Customer, CustomerId, NewCustomer};
pub use error::ValidationError;
pub use maintenance::{MaintenanceStatus, MaintenanceWarning};
pub use prescription::{EyeMeasurement, Prescription};
pub use product::{Product, ProductDraft};
