// Database Maintenance Port
use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default period between scheduled maintenance cycles (2 hours)
pub const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);

/// Default number of snapshots kept by retention
pub const DEFAULT_BACKUP_RETENTION: usize = 10;

/// Database maintenance statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceStats {
    pub db_size_mb: f64,
    pub db_size_bytes: i64,
    pub customer_count: i64,
    pub backup_count: usize,
    pub fragmentation_percent: f64,
}

/// Maintenance configuration
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Period between scheduled cycles
    pub interval: Duration,

    /// Snapshots kept after each backup (newest first)
    pub backup_retention: usize,
}

impl MaintenanceConfig {
    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(AppError::Config(
                "maintenance interval must be greater than zero".to_string(),
            ));
        }
        if self.backup_retention == 0 {
            return Err(AppError::Config(
                "backup retention must keep at least one snapshot".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_MAINTENANCE_INTERVAL,
            backup_retention: DEFAULT_BACKUP_RETENTION,
        }
    }
}

/// A snapshot written to the backup directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub path: PathBuf,
    pub taken_at: i64, // epoch ms
    pub size_bytes: u64,
}

/// Outcome of applying backup retention
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetentionReport {
    pub kept: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    /// Backups that should have been deleted but could not be
    pub failures: Vec<(PathBuf, String)>,
}

/// Result of the engine consistency check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IntegrityStatus {
    Ok,
    Issues(Vec<String>),
}

impl IntegrityStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, IntegrityStatus::Ok)
    }
}

/// Database maintenance operations
#[async_trait]
pub trait Maintenance: Send + Sync {
    /// Copy the database file into the backup directory
    ///
    /// Takes exclusive ownership of the database handle for the duration of
    /// the copy: the handle is closed, copied and reopened. Implementations
    /// must attempt the reopen even when the copy fails.
    async fn snapshot(&self) -> Result<BackupRecord>;

    /// Reopen the database handle if it is not usable
    async fn reconnect(&self) -> Result<()>;

    /// Delete all but the newest `keep` snapshots
    ///
    /// Individual deletion failures are reported in the returned report
    /// rather than as an error.
    async fn prune_backups(&self, keep: usize) -> Result<RetentionReport>;

    /// Run VACUUM to reclaim space
    ///
    /// # Returns
    /// Bytes reclaimed
    async fn vacuum(&self) -> Result<u64>;

    /// Run the engine-level consistency check
    async fn integrity_check(&self) -> Result<IntegrityStatus>;

    /// Get maintenance statistics
    async fn get_stats(&self) -> Result<MaintenanceStats>;
}

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scriptable maintenance backend for scheduler tests
    #[derive(Default)]
    pub struct MockMaintenance {
        pub snapshots: AtomicUsize,
        pub reconnects: AtomicUsize,
        pub prunes: AtomicUsize,
        pub vacuums: AtomicUsize,
        pub integrity_checks: AtomicUsize,
        fail_snapshot: AtomicBool,
        fail_vacuum: AtomicBool,
        integrity_issues: Mutex<Vec<String>>,
        undeletable: Mutex<Vec<PathBuf>>,
    }

    impl MockMaintenance {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn fail_snapshot(&self, fail: bool) {
            self.fail_snapshot.store(fail, Ordering::SeqCst);
        }

        pub fn fail_vacuum(&self, fail: bool) {
            self.fail_vacuum.store(fail, Ordering::SeqCst);
        }

        pub fn report_integrity_issues(&self, issues: Vec<String>) {
            *self.integrity_issues.lock().unwrap() = issues;
        }

        pub fn refuse_deletion_of(&self, path: impl Into<PathBuf>) {
            self.undeletable.lock().unwrap().push(path.into());
        }

        pub fn count(counter: &AtomicUsize) -> usize {
            counter.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Maintenance for MockMaintenance {
        async fn snapshot(&self) -> Result<BackupRecord> {
            let n = self.snapshots.fetch_add(1, Ordering::SeqCst);
            if self.fail_snapshot.load(Ordering::SeqCst) {
                return Err(AppError::Maintenance("disk full".to_string()));
            }
            Ok(BackupRecord {
                path: PathBuf::from(format!("backups/shop_backup_{:02}.db", n)),
                taken_at: n as i64,
                size_bytes: 4096,
            })
        }

        async fn reconnect(&self) -> Result<()> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn prune_backups(&self, _keep: usize) -> Result<RetentionReport> {
            self.prunes.fetch_add(1, Ordering::SeqCst);
            let failures = self
                .undeletable
                .lock()
                .unwrap()
                .iter()
                .map(|p| (p.clone(), "permission denied".to_string()))
                .collect();
            Ok(RetentionReport {
                failures,
                ..Default::default()
            })
        }

        async fn vacuum(&self) -> Result<u64> {
            self.vacuums.fetch_add(1, Ordering::SeqCst);
            if self.fail_vacuum.load(Ordering::SeqCst) {
                return Err(AppError::Maintenance("database is locked".to_string()));
            }
            Ok(0)
        }

        async fn integrity_check(&self) -> Result<IntegrityStatus> {
            self.integrity_checks.fetch_add(1, Ordering::SeqCst);
            let issues = self.integrity_issues.lock().unwrap().clone();
            if issues.is_empty() {
                Ok(IntegrityStatus::Ok)
            } else {
                Ok(IntegrityStatus::Issues(issues))
            }
        }

        async fn get_stats(&self) -> Result<MaintenanceStats> {
            Ok(MaintenanceStats {
                db_size_mb: 0.0,
                db_size_bytes: 0,
                customer_count: 0,
                backup_count: Self::count(&self.snapshots),
                fragmentation_percent: 0.0,
            })
        }
    }
}
