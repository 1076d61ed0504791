// SQLite Maintenance Implementation
use crate::backup;
use crate::connection::DatabaseHandle;
use async_trait::async_trait;
use optical_core::error::{AppError, Result};
use optical_core::port::{
    BackupRecord, IntegrityStatus, Maintenance, MaintenanceStats, RetentionReport, TimeProvider,
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{error, info, warn};

/// SQLite maintenance implementation
pub struct SqliteMaintenance {
    handle: Arc<DatabaseHandle>,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteMaintenance {
    pub fn new(handle: Arc<DatabaseHandle>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            handle,
            time_provider,
        }
    }

    /// Get DB size in bytes (page_count * page_size)
    async fn get_db_size(pool: &SqlitePool) -> Result<i64> {
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(pool)
            .await
            .map_err(|e| AppError::Maintenance(format!("Failed to get page count: {}", e)))?;

        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(pool)
            .await
            .map_err(|e| AppError::Maintenance(format!("Failed to get page size: {}", e)))?;

        Ok(page_count * page_size)
    }
}

#[async_trait]
impl Maintenance for SqliteMaintenance {
    async fn snapshot(&self) -> Result<BackupRecord> {
        let layout = self.handle.layout();
        tokio::fs::create_dir_all(&layout.backup_dir).await?;

        // Waits until every in-flight query and transaction has released the handle
        let mut guard = self.handle.exclusive().await;

        if guard.is_shut_down() {
            return Err(AppError::Maintenance(
                "Database handle is shut down; snapshot skipped".to_string(),
            ));
        }

        let taken_at = self.time_provider.now_local();
        let path =
            backup::next_backup_path(&layout.backup_dir, &layout.base_name(), &taken_at).await?;

        info!(path = %path.display(), "Taking database snapshot...");

        let copied = match guard.close().await {
            Ok(()) => tokio::fs::copy(&layout.db_path, &path)
                .await
                .map_err(|e| AppError::Maintenance(format!("Snapshot copy failed: {}", e))),
            Err(e) => Err(AppError::Maintenance(format!(
                "Failed to close database for snapshot: {}",
                e
            ))),
        };

        // Reopen is attempted whatever happened above
        if let Err(e) = guard.reopen().await {
            error!(error = %e, "Failed to reopen database after snapshot");
            return Err(AppError::Maintenance(format!(
                "Failed to reopen database after snapshot: {}",
                e
            )));
        }
        drop(guard);

        let size_bytes = copied?;
        info!(path = %path.display(), size_bytes, "Snapshot completed");

        Ok(BackupRecord {
            path,
            taken_at: taken_at.timestamp_millis(),
            size_bytes,
        })
    }

    async fn reconnect(&self) -> Result<()> {
        self.handle.reconnect().await.map_err(|e| {
            AppError::Maintenance(format!("Failed to reconnect database handle: {}", e))
        })
    }

    async fn prune_backups(&self, keep: usize) -> Result<RetentionReport> {
        let layout = self.handle.layout();
        backup::prune_backups(&layout.backup_dir, &layout.base_name(), keep).await
    }

    async fn vacuum(&self) -> Result<u64> {
        info!("Running VACUUM to optimize database...");
        let guard = self.handle.shared().await?;
        let pool = guard.pool();

        // Get size before VACUUM
        let size_before = Self::get_db_size(pool).await?;

        // Run VACUUM (reclaims space and defragments)
        sqlx::query("VACUUM")
            .execute(pool)
            .await
            .map_err(|e| AppError::Maintenance(format!("VACUUM failed: {}", e)))?;

        // Get size after VACUUM
        let size_after = Self::get_db_size(pool).await?;
        let reclaimed = (size_before - size_after).max(0) as u64;

        info!(
            size_before_bytes = size_before,
            size_after_bytes = size_after,
            reclaimed_bytes = reclaimed,
            "VACUUM completed"
        );

        Ok(reclaimed)
    }

    async fn integrity_check(&self) -> Result<IntegrityStatus> {
        let guard = self.handle.shared().await?;
        let results: Vec<String> = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_all(guard.pool())
            .await
            .map_err(|e| AppError::Maintenance(format!("Integrity check failed: {}", e)))?;

        if results.len() == 1 && results[0] == "ok" {
            info!("Integrity check passed");
            Ok(IntegrityStatus::Ok)
        } else {
            warn!(issues = results.len(), "Integrity check reported issues");
            Ok(IntegrityStatus::Issues(results))
        }
    }

    async fn get_stats(&self) -> Result<MaintenanceStats> {
        let layout = self.handle.layout();
        let backup_count = backup::list_backups(&layout.backup_dir, &layout.base_name())
            .await?
            .len();

        let guard = self.handle.shared().await?;
        let pool = guard.pool();

        let db_size_bytes = Self::get_db_size(pool).await?;
        let db_size_mb = db_size_bytes as f64 / (1024.0 * 1024.0);

        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(pool)
            .await
            .map_err(|e| AppError::Maintenance(format!("Failed to get page count: {}", e)))?;

        let freelist_count: i64 = sqlx::query_scalar("PRAGMA freelist_count")
            .fetch_one(pool)
            .await
            .map_err(|e| AppError::Maintenance(format!("Failed to get freelist count: {}", e)))?;

        let fragmentation_percent = if page_count > 0 {
            (freelist_count as f64 / page_count as f64) * 100.0
        } else {
            0.0
        };

        let customer_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(pool)
            .await
            .map_err(|e| AppError::Maintenance(format!("Failed to count customers: {}", e)))?;

        Ok(MaintenanceStats {
            db_size_mb,
            db_size_bytes,
            customer_count,
            backup_count,
            fragmentation_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::StorageLayout;
    use crate::schema::ensure_schema;
    use optical_core::port::time_provider::mocks::MockTimeProvider;
    use std::time::Duration;
    use tempfile::TempDir;

    const JAN_1_2024_NOON_UTC: i64 = 1_704_110_400_000;

    async fn setup() -> (TempDir, Arc<DatabaseHandle>, Arc<MockTimeProvider>, SqliteMaintenance) {
        let dir = TempDir::new().unwrap();
        let handle = Arc::new(
            DatabaseHandle::open(StorageLayout::new(dir.path().join("shop.db")))
                .await
                .unwrap(),
        );
        ensure_schema(&handle).await.unwrap();
        let clock = Arc::new(MockTimeProvider::new(JAN_1_2024_NOON_UTC));
        let maintenance = SqliteMaintenance::new(Arc::clone(&handle), clock.clone());
        (dir, handle, clock, maintenance)
    }

    async fn insert_customers(handle: &DatabaseHandle, count: usize) {
        let guard = handle.shared().await.unwrap();
        for i in 0..count {
            sqlx::query("INSERT INTO customers (name, record_date) VALUES (?, '2024-01-01')")
                .bind(format!("Customer {}", i))
                .execute(guard.pool())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_snapshot_copies_committed_data_and_reopens() {
        let (_dir, handle, _clock, maintenance) = setup().await;
        insert_customers(&handle, 3).await;

        let record = maintenance.snapshot().await.unwrap();
        assert!(record.path.exists());
        assert!(record.size_bytes > 0);
        assert!(handle.is_open().await);

        // The copy is a standalone database holding every committed row
        let copy = DatabaseHandle::open(StorageLayout::new(record.path.clone()))
            .await
            .unwrap();
        let guard = copy.shared().await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(guard.pool())
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_snapshot_names_follow_clock() {
        let (_dir, _handle, clock, maintenance) = setup().await;

        let first = maintenance.snapshot().await.unwrap();
        clock.advance_secs(1);
        let second = maintenance.snapshot().await.unwrap();

        assert_ne!(first.path, second.path);
        assert_eq!(second.taken_at - first.taken_at, 1000);
        assert_eq!(maintenance.get_stats().await.unwrap().backup_count, 2);
    }

    #[tokio::test]
    async fn test_snapshots_in_same_second_keep_both_copies() {
        let (_dir, handle, _clock, maintenance) = setup().await;

        insert_customers(&handle, 1).await;
        let first = maintenance.snapshot().await.unwrap();
        insert_customers(&handle, 1).await;
        let second = maintenance.snapshot().await.unwrap();

        assert_ne!(first.path, second.path);
        assert!(first.path.exists());
        assert!(second.path.to_string_lossy().ends_with("_1.db"));

        let listed = backup::list_backups(
            &handle.layout().backup_dir,
            &handle.layout().base_name(),
        )
        .await
        .unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].path, second.path);
        assert_eq!(listed[1].path, first.path);
    }

    #[tokio::test]
    async fn test_idle_snapshot_holds_handle_briefly() {
        let (_dir, handle, _clock, maintenance) = setup().await;
        insert_customers(&handle, 10).await;

        let started = std::time::Instant::now();
        maintenance.snapshot().await.unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed < Duration::from_secs(1), "snapshot took {:?}", elapsed);

        // Foreground reads still work right after
        assert_eq!(maintenance.get_stats().await.unwrap().customer_count, 10);
    }

    #[tokio::test]
    async fn test_snapshot_rejected_after_shutdown() {
        let (_dir, handle, _clock, maintenance) = setup().await;
        handle.close().await.unwrap();

        assert!(maintenance.snapshot().await.is_err());
        assert!(maintenance.reconnect().await.is_err());
        assert!(!handle.is_open().await);
    }

    #[tokio::test]
    async fn test_snapshot_waits_for_open_shared_guard() {
        let (_dir, handle, _clock, maintenance) = setup().await;
        let maintenance = Arc::new(maintenance);

        let shared = handle.shared().await.unwrap();
        let task = {
            let maintenance = Arc::clone(&maintenance);
            tokio::spawn(async move { maintenance.snapshot().await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        drop(shared);
        let record = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(record.path.exists());
    }

    #[tokio::test]
    async fn test_prune_through_port() {
        let (_dir, _handle, clock, maintenance) = setup().await;
        for _ in 0..4 {
            maintenance.snapshot().await.unwrap();
            clock.advance_secs(60);
        }

        let report = maintenance.prune_backups(2).await.unwrap();
        assert_eq!(report.kept.len(), 2);
        assert_eq!(report.deleted.len(), 2);
        assert_eq!(maintenance.get_stats().await.unwrap().backup_count, 2);
    }

    #[tokio::test]
    async fn test_vacuum_and_integrity_check() {
        let (_dir, handle, _clock, maintenance) = setup().await;
        insert_customers(&handle, 500).await;
        {
            let guard = handle.shared().await.unwrap();
            sqlx::query("DELETE FROM customers")
                .execute(guard.pool())
                .await
                .unwrap();
        }

        let before = maintenance.get_stats().await.unwrap();
        assert_eq!(before.customer_count, 0);

        maintenance.vacuum().await.unwrap();
        let after = maintenance.get_stats().await.unwrap();
        assert!(after.db_size_bytes <= before.db_size_bytes);
        assert_eq!(after.fragmentation_percent, 0.0);

        assert_eq!(maintenance.integrity_check().await.unwrap(), IntegrityStatus::Ok);
    }

    #[tokio::test]
    async fn test_reconnect_reopens_closed_handle() {
        let (_dir, handle, _clock, maintenance) = setup().await;
        handle.exclusive().await.close().await.unwrap();
        assert!(!handle.is_open().await);

        maintenance.reconnect().await.unwrap();
        assert!(handle.is_open().await);
    }
}
