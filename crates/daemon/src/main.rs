//! Optical Shop Record Store - Main Entry Point
//! Headless host: opens the database, ensures the schema, runs maintenance

mod config;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import workspace crates
use config::{DaemonConfig, LogFormat};
use optical_core::application::{shutdown_channel, MaintenanceScheduler, RecordService};
use optical_core::port::time_provider::SystemTimeProvider;
use optical_core::port::{Maintenance, TimeProvider};
use optical_infra_sqlite::{ensure_schema, DatabaseHandle, SqliteMaintenance, SqliteRecordStore, StorageLayout};
use tracing_appender::non_blocking::WorkerGuard;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const LOG_FILE_PREFIX: &str = "optical-store.log";
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let config = DaemonConfig::from_env().context("Invalid configuration")?;

    // 2. Initialize logging (guard flushes the log file on exit)
    let _log_guard = init_logging(&config)?;

    info!("Optical Shop Record Store v{} starting...", VERSION);

    // 3. Open database and ensure schema (fatal on failure)
    let mut layout = StorageLayout::new(&config.db_path);
    if let Some(dir) = &config.backup_dir {
        layout = layout.with_backup_dir(dir);
    }
    info!(
        db_path = %layout.db_path.display(),
        backup_dir = %layout.backup_dir.display(),
        "Initializing database..."
    );

    let handle = Arc::new(
        DatabaseHandle::open(layout)
            .await
            .context("Failed to open database")?,
    );
    ensure_schema(&handle)
        .await
        .context("Schema initialization failed")?;

    // 4. Setup dependencies (DI wiring)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let store = Arc::new(
        SqliteRecordStore::new(Arc::clone(&handle))
            .with_case_insensitive_search(config.case_insensitive_search),
    );
    let records = RecordService::new(store.clone(), store, time_provider.clone());
    let maintenance = Arc::new(SqliteMaintenance::new(
        Arc::clone(&handle),
        time_provider.clone(),
    ));

    let customers = records.list_aggregates(None).await?.len();
    match maintenance.get_stats().await {
        Ok(stats) => info!(
            customers,
            db_size_mb = stats.db_size_mb,
            backups = stats.backup_count,
            fragmentation_percent = stats.fragmentation_percent,
            "Record store ready"
        ),
        Err(e) => warn!(customers, error = %e, "Record store ready (stats unavailable)"),
    }

    // 5. Start Maintenance Scheduler
    info!(
        interval_secs = config.maintenance.interval.as_secs(),
        retention = config.maintenance.backup_retention,
        "Starting maintenance scheduler..."
    );
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let scheduler = Arc::new(MaintenanceScheduler::new(
        maintenance,
        config.maintenance.clone(),
        time_provider,
    ));

    let scheduler_handle = {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move {
            scheduler.run(shutdown_rx).await;
        })
    };

    info!("System ready. Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown: let an in-progress cycle finish, then close the handle
    shutdown_tx.shutdown();
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, scheduler_handle)
        .await
        .is_err()
    {
        warn!("Maintenance scheduler did not stop within timeout");
    }

    let status = scheduler.status();
    info!(
        cycles = status.cycles_completed,
        healthy = status.is_healthy(),
        "Maintenance summary"
    );

    if let Err(e) = handle.close().await {
        error!(error = %e, "Failed to close database cleanly");
    }

    info!("Shutdown complete.");

    Ok(())
}

/// Install the tracing subscriber: pretty or JSON on stdout, plus an optional
/// daily rolling JSON file
fn init_logging(config: &DaemonConfig) -> Result<Option<WorkerGuard>> {
    let (subscriber, guard) = build_subscriber(config)?;
    subscriber
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(guard)
}

type BoxedSubscriber = Box<dyn tracing::Subscriber + Send + Sync>;

/// Assemble the subscriber without installing it
///
/// The file layer sits below the stdout layer so both formats share one
/// subscriber stack type.
fn build_subscriber(config: &DaemonConfig) -> Result<(BoxedSubscriber, Option<WorkerGuard>)> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("optical=info"))
        .context("Failed to create env filter")?;

    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let base = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    let subscriber: BoxedSubscriber = match config.log_format {
        // Production: JSON structured logging
        LogFormat::Json => Box::new(base.with(fmt::layer().json())),
        // Development: Pretty formatting with colors
        LogFormat::Pretty => Box::new(base.with(fmt::layer().pretty())),
    };

    Ok((subscriber, guard))
}
