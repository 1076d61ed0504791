// Optical Shop Infrastructure - SQLite Adapter
// Implements: RecordStore, TransactionalRecordStore, Maintenance

mod backup;
mod connection;
mod error;
mod maintenance_impl;
mod record_store;
mod schema;
mod transaction;

pub use backup::{
    backup_file_name, list_backups, next_backup_path, parse_backup_name, parse_backup_timestamp,
    prune_backups, BackupFile, BACKUP_TIMESTAMP_FORMAT,
};
pub use connection::{
    DatabaseHandle, ExclusiveGuard, SharedGuard, StorageLayout, BACKUP_DIR_NAME, BUSY_TIMEOUT,
    MAX_CONNECTIONS,
};
pub use maintenance_impl::SqliteMaintenance;
pub use record_store::SqliteRecordStore;
pub use schema::ensure_schema;
pub use transaction::SqliteAggregateTransaction;

// Note: sqlx::Error conversion is handled by `error::map_sqlx_error`
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
