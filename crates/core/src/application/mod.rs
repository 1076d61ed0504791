// Application Layer - Use Cases over the record store

pub mod maintenance;
pub mod records;
pub mod search;
pub mod shutdown;

// Re-exports
pub use maintenance::{BackupReport, MaintenanceScheduler, OptimizeReport};
pub use records::{CreateAggregateRequest, RecordService};
pub use search::{Resolution, SearchOutcome, SearchResolver};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};
