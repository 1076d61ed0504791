//! Shared fixtures: an on-disk store wired the way the daemon wires it

#![allow(dead_code)]

use optical_core::application::{CreateAggregateRequest, MaintenanceScheduler, RecordService};
use optical_core::domain::{CustomerId, EyeMeasurement, NewCustomer, Prescription, ProductDraft};
use optical_core::port::time_provider::SystemTimeProvider;
use optical_core::port::{MaintenanceConfig, TimeProvider};
use optical_infra_sqlite::{
    ensure_schema, DatabaseHandle, SqliteMaintenance, SqliteRecordStore, StorageLayout,
};
use std::sync::Arc;
use tempfile::TempDir;

pub struct Fixture {
    // Keeps the directory alive for the test's duration
    pub dir: TempDir,
    pub handle: Arc<DatabaseHandle>,
    pub store: Arc<SqliteRecordStore>,
    pub records: RecordService,
    pub maintenance: Arc<SqliteMaintenance>,
    pub time_provider: Arc<dyn TimeProvider>,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_clock(Arc::new(SystemTimeProvider)).await
    }

    pub async fn with_clock(time_provider: Arc<dyn TimeProvider>) -> Self {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path().join("data").join("optical_shop.db"));
        let handle = Arc::new(DatabaseHandle::open(layout).await.unwrap());
        ensure_schema(&handle).await.unwrap();

        let store = Arc::new(SqliteRecordStore::new(Arc::clone(&handle)));
        let records = RecordService::new(store.clone(), store.clone(), time_provider.clone());
        let maintenance = Arc::new(SqliteMaintenance::new(
            Arc::clone(&handle),
            time_provider.clone(),
        ));

        Self {
            dir,
            handle,
            store,
            records,
            maintenance,
            time_provider,
        }
    }

    pub fn scheduler(&self, config: MaintenanceConfig) -> MaintenanceScheduler {
        MaintenanceScheduler::new(
            self.maintenance.clone(),
            config,
            self.time_provider.clone(),
        )
    }

    pub async fn count(&self, table: &str) -> i64 {
        let guard = self.handle.shared().await.unwrap();
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(guard.pool())
            .await
            .unwrap()
    }
}

pub fn request(name: &str, phone: &str, frame: &str) -> CreateAggregateRequest {
    CreateAggregateRequest::new(
        NewCustomer::new(name)
            .with_phone(phone)
            .with_record_date("2024-05-01"),
        Prescription::new(
            EyeMeasurement::new("-2.00", "-0.75", "90", "+1.50"),
            EyeMeasurement::new("-1.75", "-0.50", "85", "+1.50"),
        ),
        ProductDraft::new(frame, "Progressive").with_costs("120", "80.5", ""),
    )
}

pub async fn create(fixture: &Fixture, name: &str, phone: &str, frame: &str) -> CustomerId {
    fixture
        .records
        .create_aggregate(request(name, phone, frame))
        .await
        .unwrap()
}
