// Port Layer - Interfaces for external dependencies

pub mod maintenance;
pub mod record_store;
pub mod time_provider; // For deterministic testing
pub mod transaction;

// Re-exports
pub use maintenance::{
    BackupRecord, IntegrityStatus, Maintenance, MaintenanceConfig, MaintenanceStats,
    RetentionReport,
};
pub use record_store::RecordStore;
pub use time_provider::TimeProvider;
pub use transaction::{AggregateTransaction, Transaction, TransactionalRecordStore};
