// SQLite Database Handle
//
// The handle has an explicit lifecycle: Open(pool) -> (query | backup-exclusive)
// -> Closed. One process-wide RwLock guards it: foreground operations hold the
// shared side for their whole duration, the snapshot holds the exclusive side.

use crate::error::map_sqlx_error;
use optical_core::error::{AppError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{ConnectOptions, Connection};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::{debug, info};

/// Connections kept by the pool (single local process, low volume)
pub const MAX_CONNECTIONS: u32 = 4;

/// How long a statement waits on SQLite's own file lock
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Name of the snapshot directory next to the database file
pub const BACKUP_DIR_NAME: &str = "backups";

/// Where the database file and its snapshots live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub db_path: PathBuf,
    pub backup_dir: PathBuf,
}

impl StorageLayout {
    /// Layout with the default sibling `backups/` directory
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        let backup_dir = db_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(BACKUP_DIR_NAME);
        Self {
            db_path,
            backup_dir,
        }
    }

    pub fn with_backup_dir(mut self, backup_dir: impl Into<PathBuf>) -> Self {
        self.backup_dir = backup_dir.into();
        self
    }

    /// Prefix for snapshot names: the database file stem
    pub fn base_name(&self) -> String {
        self.db_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "database".to_string())
    }
}

enum HandleState {
    Open(SqlitePool),
    Closed,
    /// Terminal: closed for process shutdown, never reopened
    ShutDown,
}

/// Process-wide database handle
pub struct DatabaseHandle {
    layout: StorageLayout,
    state: Arc<RwLock<HandleState>>,
}

/// Shared access for one foreground operation
pub struct SharedGuard {
    pool: SqlitePool,
    _guard: OwnedRwLockReadGuard<HandleState>,
}

impl SharedGuard {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Exclusive ownership of the handle (snapshot window)
pub struct ExclusiveGuard {
    guard: OwnedRwLockWriteGuard<HandleState>,
    db_path: PathBuf,
}

impl ExclusiveGuard {
    pub fn is_open(&self) -> bool {
        matches!(*self.guard, HandleState::Open(_))
    }

    pub fn is_shut_down(&self) -> bool {
        matches!(*self.guard, HandleState::ShutDown)
    }

    /// Close the pool, leaving the handle Closed
    ///
    /// The pool is closed first so no pooled connection pins the WAL, then the
    /// WAL is checkpointed into the main file on a single dedicated connection.
    pub async fn close(&mut self) -> Result<()> {
        if let HandleState::Open(pool) = std::mem::replace(&mut *self.guard, HandleState::Closed) {
            pool.close().await;
            checkpoint_wal(&self.db_path).await?;
            debug!("Database handle closed");
        }
        Ok(())
    }

    /// Reopen if closed; no-op when already open
    pub async fn reopen(&mut self) -> Result<()> {
        match &*self.guard {
            HandleState::Open(_) => return Ok(()),
            HandleState::ShutDown => return Err(shut_down_error()),
            HandleState::Closed => {}
        }

        let pool = connect(&self.db_path).await?;
        *self.guard = HandleState::Open(pool);
        info!(db_path = %self.db_path.display(), "Database handle reopened");
        Ok(())
    }

    /// Close and mark the handle as shut down for good
    pub async fn shut_down(&mut self) -> Result<()> {
        let closed = self.close().await;
        *self.guard = HandleState::ShutDown;
        closed
    }
}

impl DatabaseHandle {
    /// Open the database file, creating it and the backup directory if missing
    pub async fn open(layout: StorageLayout) -> Result<Self> {
        if let Some(parent) = layout.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::create_dir_all(&layout.backup_dir).await?;

        let pool = connect(&layout.db_path).await?;
        info!(db_path = %layout.db_path.display(), "Database handle opened");

        Ok(Self {
            layout,
            state: Arc::new(RwLock::new(HandleState::Open(pool))),
        })
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Shared access for a query or a single-aggregate transaction
    ///
    /// Waits while a snapshot holds the handle. A handle left closed by a
    /// failed reopen is reopened here; a shut down handle is an error.
    pub async fn shared(&self) -> Result<SharedGuard> {
        let guard = Arc::clone(&self.state).read_owned().await;
        let open_pool = match &*guard {
            HandleState::Open(pool) => Some(pool.clone()),
            HandleState::ShutDown => return Err(shut_down_error()),
            HandleState::Closed => None,
        };
        if let Some(pool) = open_pool {
            return Ok(SharedGuard {
                pool,
                _guard: guard,
            });
        }
        drop(guard);

        let mut exclusive = self.exclusive().await;
        exclusive.reopen().await?;

        let guard = exclusive.guard.downgrade();
        let pool = match &*guard {
            HandleState::Open(pool) => pool.clone(),
            HandleState::Closed | HandleState::ShutDown => {
                return Err(AppError::Internal(
                    "database handle closed right after reopen".to_string(),
                ))
            }
        };
        Ok(SharedGuard {
            pool,
            _guard: guard,
        })
    }

    /// Exclusive access; waits for every in-flight foreground operation
    pub async fn exclusive(&self) -> ExclusiveGuard {
        ExclusiveGuard {
            guard: Arc::clone(&self.state).write_owned().await,
            db_path: self.layout.db_path.clone(),
        }
    }

    pub async fn is_open(&self) -> bool {
        matches!(*self.state.read().await, HandleState::Open(_))
    }

    /// Make sure the handle is open
    pub async fn reconnect(&self) -> Result<()> {
        self.exclusive().await.reopen().await
    }

    /// Close for process shutdown; later callers get an error instead of a reopen
    pub async fn close(&self) -> Result<()> {
        self.exclusive().await.shut_down().await?;
        info!("Database handle closed for shutdown");
        Ok(())
    }
}

fn shut_down_error() -> AppError {
    AppError::Database("Database handle is shut down".to_string())
}

/// Fold the WAL into the main database file
///
/// Runs on its own connection after the pool is closed; a checkpoint that
/// reports busy means another connection still reads the WAL.
async fn checkpoint_wal(db_path: &Path) -> Result<()> {
    let mut conn = SqliteConnectOptions::new()
        .filename(db_path)
        .busy_timeout(BUSY_TIMEOUT)
        .connect()
        .await
        .map_err(map_sqlx_error)?;

    let checkpoint: std::result::Result<(i64, i64, i64), AppError> =
        sqlx::query_as("PRAGMA wal_checkpoint(TRUNCATE)")
            .fetch_one(&mut conn)
            .await
            .map_err(map_sqlx_error);
    let closed = conn.close().await.map_err(map_sqlx_error);

    let (busy, log_frames, checkpointed) = checkpoint?;
    closed?;
    if busy != 0 {
        return Err(AppError::Database(format!(
            "WAL checkpoint blocked ({} of {} frames checkpointed)",
            checkpointed, log_frames
        )));
    }
    debug!(frames = checkpointed, "WAL checkpointed");
    Ok(())
}

/// Create the SQLite pool with WAL mode and foreign keys on every connection
pub(crate) async fn connect(db_path: &Path) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(options)
        .await
        .map_err(map_sqlx_error)
}
