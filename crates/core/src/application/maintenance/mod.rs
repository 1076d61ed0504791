// Maintenance Service
// Scheduled snapshot, retention, compaction and integrity checking

use crate::application::shutdown::ShutdownToken;
use crate::domain::{MaintenanceStatus, MaintenanceWarning};
use crate::error::Result;
use crate::port::{
    BackupRecord, IntegrityStatus, Maintenance, MaintenanceConfig, RetentionReport, TimeProvider,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

/// Shortest period the loop will tick at
const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Result of `backup_now`: the new snapshot plus what retention did
#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub backup: BackupRecord,
    pub retention: RetentionReport,
}

/// Result of `optimize_now`
#[derive(Debug, Clone, Serialize)]
pub struct OptimizeReport {
    pub reclaimed_bytes: u64,
    pub integrity: IntegrityStatus,
}

/// Maintenance scheduler
///
/// Runs the maintenance cycle in the background and exposes the same steps as
/// manual triggers. Both paths go through the `Maintenance` port, so they share
/// the handle locking of the adapter.
pub struct MaintenanceScheduler {
    maintenance: Arc<dyn Maintenance>,
    config: MaintenanceConfig,
    time_provider: Arc<dyn TimeProvider>,
    status: watch::Sender<MaintenanceStatus>,
}

impl MaintenanceScheduler {
    /// Create a new maintenance scheduler
    ///
    /// # Arguments
    /// * `maintenance` - Maintenance implementation
    /// * `config` - Interval and backup retention
    /// * `time_provider` - Clock used for status timestamps
    pub fn new(
        maintenance: Arc<dyn Maintenance>,
        config: MaintenanceConfig,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        let (status, _) = watch::channel(MaintenanceStatus::default());
        Self {
            maintenance,
            config,
            time_provider,
            status,
        }
    }

    pub fn config(&self) -> &MaintenanceConfig {
        &self.config
    }

    /// Current status snapshot
    pub fn status(&self) -> MaintenanceStatus {
        self.status.borrow().clone()
    }

    /// Receive a notification every time the status changes
    pub fn subscribe(&self) -> watch::Receiver<MaintenanceStatus> {
        self.status.subscribe()
    }

    /// Run maintenance loop (background task)
    ///
    /// The first cycle runs immediately, then once per interval. Shutdown is
    /// observed while waiting between cycles; a cycle in progress completes.
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        let period = self.config.interval.max(MIN_INTERVAL);
        info!(
            interval_secs = period.as_secs(),
            backup_retention = self.config.backup_retention,
            "Maintenance scheduler started"
        );

        let mut tick = interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                _ = shutdown.wait() => break,
            }

            if shutdown.is_shutdown() {
                break;
            }

            self.run_cycle().await;
        }

        info!("Maintenance scheduler stopped");
    }

    /// One full cycle: snapshot, retention, compaction, integrity check
    ///
    /// Never fails; problems are logged and returned as warnings.
    pub async fn run_cycle(&self) -> Vec<MaintenanceWarning> {
        let started_at = self.time_provider.now_millis();
        self.status
            .send_modify(|s| s.last_cycle_started_at = Some(started_at));

        info!("Running scheduled maintenance...");
        let mut warnings = Vec::new();

        let backup = self.backup_with_retention(&mut warnings).await.ok();

        match self.maintenance.vacuum().await {
            Ok(reclaimed) => info!(reclaimed_bytes = reclaimed, "Compaction completed"),
            Err(e) => {
                warn!(error = %e, "Compaction failed");
                warnings.push(MaintenanceWarning::CompactionFailed(e.to_string()));
            }
        }

        self.check_integrity(&mut warnings).await;

        let finished_at = self.time_provider.now_millis();
        if warnings.is_empty() {
            info!(
                duration_ms = finished_at - started_at,
                "Scheduled maintenance completed successfully"
            );
        } else {
            error!(
                warnings = warnings.len(),
                "Scheduled maintenance completed with warnings"
            );
        }

        let published = warnings.clone();
        self.status.send_modify(move |s| {
            s.cycles_completed += 1;
            s.last_cycle_finished_at = Some(finished_at);
            if let Some(report) = backup {
                s.last_backup = Some(report.backup.path);
            }
            s.warnings = published;
        });

        warnings
    }

    /// Snapshot plus retention, right now (manual trigger)
    pub async fn backup_now(&self) -> Result<BackupReport> {
        info!("Running manual backup...");

        let mut warnings = Vec::new();
        let result = self.backup_with_retention(&mut warnings).await;

        let last_backup = result.as_ref().ok().map(|r| r.backup.path.clone());
        self.status.send_modify(move |s| {
            if last_backup.is_some() {
                s.last_backup = last_backup;
            }
            s.warnings = warnings;
        });

        result
    }

    /// Compaction plus integrity check, right now (manual trigger)
    ///
    /// A failing compaction is returned as an error; integrity issues are a
    /// warning and come back in the report.
    pub async fn optimize_now(&self) -> Result<OptimizeReport> {
        info!("Running manual optimization...");

        let reclaimed_bytes = self.maintenance.vacuum().await?;
        let mut warnings = Vec::new();
        let integrity = self
            .check_integrity(&mut warnings)
            .await
            .unwrap_or_else(|| IntegrityStatus::Issues(vec!["integrity check did not run".into()]));

        self.status.send_modify(move |s| s.warnings = warnings);

        info!(
            reclaimed_bytes = reclaimed_bytes,
            integrity_ok = integrity.is_ok(),
            "Manual optimization completed"
        );
        Ok(OptimizeReport {
            reclaimed_bytes,
            integrity,
        })
    }

    async fn backup_with_retention(
        &self,
        warnings: &mut Vec<MaintenanceWarning>,
    ) -> Result<BackupReport> {
        let backup = match self.maintenance.snapshot().await {
            Ok(backup) => backup,
            Err(e) => {
                error!(error = %e, "Snapshot failed");
                warnings.push(MaintenanceWarning::SnapshotFailed(e.to_string()));

                // The adapter already tried to reopen; make sure before the next cycle
                if let Err(reconnect_err) = self.maintenance.reconnect().await {
                    error!(error = %reconnect_err, "Reconnect after failed snapshot failed");
                    warnings.push(MaintenanceWarning::ReconnectFailed(
                        reconnect_err.to_string(),
                    ));
                }
                return Err(e);
            }
        };

        info!(
            path = %backup.path.display(),
            size_bytes = backup.size_bytes,
            "Snapshot created"
        );

        let retention = match self
            .maintenance
            .prune_backups(self.config.backup_retention)
            .await
        {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "Backup retention failed");
                let dir = backup
                    .path
                    .parent()
                    .map(|p| p.to_path_buf())
                    .unwrap_or_default();
                warnings.push(MaintenanceWarning::RetentionFailed {
                    path: dir,
                    reason: e.to_string(),
                });
                RetentionReport::default()
            }
        };

        for (path, reason) in &retention.failures {
            warn!(path = %path.display(), reason = %reason, "Failed to delete old backup");
            warnings.push(MaintenanceWarning::RetentionFailed {
                path: path.clone(),
                reason: reason.clone(),
            });
        }

        if !retention.deleted.is_empty() {
            info!(
                deleted = retention.deleted.len(),
                kept = retention.kept.len(),
                "Old backups removed"
            );
        }

        Ok(BackupReport { backup, retention })
    }

    /// Integrity check; `None` when the check itself could not run
    async fn check_integrity(
        &self,
        warnings: &mut Vec<MaintenanceWarning>,
    ) -> Option<IntegrityStatus> {
        match self.maintenance.integrity_check().await {
            Ok(IntegrityStatus::Ok) => Some(IntegrityStatus::Ok),
            Ok(IntegrityStatus::Issues(issues)) => {
                warn!(issues = ?issues, "Database integrity issue");
                warnings.push(MaintenanceWarning::IntegrityIssues(issues.clone()));
                Some(IntegrityStatus::Issues(issues))
            }
            Err(e) => {
                warn!(error = %e, "Integrity check failed to run");
                warnings.push(MaintenanceWarning::IntegrityCheckFailed(e.to_string()));
                None
            }
        }
    }
}
