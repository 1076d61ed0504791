// Maintenance Domain Types - non-fatal outcomes of scheduled upkeep

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Non-fatal maintenance issue
///
/// Warnings are logged and published through the scheduler status. They are
/// never returned across the write path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MaintenanceWarning {
    SnapshotFailed(String),
    ReconnectFailed(String),
    RetentionFailed { path: PathBuf, reason: String },
    CompactionFailed(String),
    IntegrityCheckFailed(String),
    IntegrityIssues(Vec<String>),
}

impl std::fmt::Display for MaintenanceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaintenanceWarning::SnapshotFailed(e) => write!(f, "snapshot failed: {}", e),
            MaintenanceWarning::ReconnectFailed(e) => write!(f, "reconnect failed: {}", e),
            MaintenanceWarning::RetentionFailed { path, reason } => {
                write!(f, "could not delete backup {}: {}", path.display(), reason)
            }
            MaintenanceWarning::CompactionFailed(e) => write!(f, "compaction failed: {}", e),
            MaintenanceWarning::IntegrityCheckFailed(e) => {
                write!(f, "integrity check could not run: {}", e)
            }
            MaintenanceWarning::IntegrityIssues(issues) => {
                write!(f, "integrity check reported: {}", issues.join("; "))
            }
        }
    }
}

/// Observable state of the maintenance scheduler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceStatus {
    /// Completed periodic cycles (manual triggers are not counted)
    pub cycles_completed: u64,
    pub last_cycle_started_at: Option<i64>, // epoch ms
    pub last_cycle_finished_at: Option<i64>,
    pub last_backup: Option<PathBuf>,
    /// Warnings from the most recent cycle or manual run
    pub warnings: Vec<MaintenanceWarning>,
}

impl MaintenanceStatus {
    pub fn is_healthy(&self) -> bool {
        self.warnings.is_empty()
    }
}
