// Schema Manager
//
// Idempotent DDL applied on every startup. Trigger bodies contain semicolons,
// so statements are kept as a list instead of splitting one script.

use crate::connection::DatabaseHandle;
use optical_core::error::{AppError, Result};
use tracing::{debug, info};

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS customers (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL CHECK (trim(name) <> ''),
        phone       TEXT,
        record_date TEXT NOT NULL,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS prescriptions (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
        right_sph   TEXT NOT NULL DEFAULT '',
        right_cyl   TEXT NOT NULL DEFAULT '',
        right_axis  TEXT NOT NULL DEFAULT '',
        right_add   TEXT NOT NULL DEFAULT '',
        left_sph    TEXT NOT NULL DEFAULT '',
        left_cyl    TEXT NOT NULL DEFAULT '',
        left_axis   TEXT NOT NULL DEFAULT '',
        left_add    TEXT NOT NULL DEFAULT '',
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
        frame_name  TEXT NOT NULL DEFAULT '',
        lens_name   TEXT NOT NULL DEFAULT '',
        frame_cost  REAL NOT NULL DEFAULT 0 CHECK (frame_cost >= 0),
        lens_cost   REAL NOT NULL DEFAULT 0 CHECK (lens_cost >= 0),
        total_cost  REAL NOT NULL DEFAULT 0,
        created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
        updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_customers_name ON customers(name)",
    "CREATE INDEX IF NOT EXISTS idx_customers_phone ON customers(phone)",
    "CREATE INDEX IF NOT EXISTS idx_prescriptions_customer ON prescriptions(customer_id)",
    "CREATE INDEX IF NOT EXISTS idx_products_customer ON products(customer_id)",
    r#"
    CREATE TRIGGER IF NOT EXISTS trg_customers_updated_at
    AFTER UPDATE ON customers
    FOR EACH ROW
    BEGIN
        UPDATE customers SET updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now') WHERE id = NEW.id;
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS trg_prescriptions_updated_at
    AFTER UPDATE ON prescriptions
    FOR EACH ROW
    BEGIN
        UPDATE prescriptions SET updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now') WHERE id = NEW.id;
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS trg_products_updated_at
    AFTER UPDATE ON products
    FOR EACH ROW
    BEGIN
        UPDATE products SET updated_at = strftime('%Y-%m-%d %H:%M:%f', 'now') WHERE id = NEW.id;
    END
    "#,
];

/// Columns each table must carry. `CREATE TABLE IF NOT EXISTS` leaves an
/// older table untouched, so its shape is checked after the DDL runs.
const REQUIRED_COLUMNS: &[(&str, &[&str])] = &[
    (
        "customers",
        &["id", "name", "phone", "record_date", "created_at", "updated_at"],
    ),
    (
        "prescriptions",
        &[
            "id",
            "customer_id",
            "right_sph",
            "right_cyl",
            "right_axis",
            "right_add",
            "left_sph",
            "left_cyl",
            "left_axis",
            "left_add",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "products",
        &[
            "id",
            "customer_id",
            "frame_name",
            "lens_name",
            "frame_cost",
            "lens_cost",
            "total_cost",
            "created_at",
            "updated_at",
        ],
    ),
];

/// Create tables, indices and triggers if absent
///
/// Safe to call on every startup. A pre-existing table missing any expected
/// column is rejected. Every failure surfaces as `AppError::Schema`.
pub async fn ensure_schema(handle: &DatabaseHandle) -> Result<()> {
    info!("Ensuring database schema...");
    let guard = handle.shared().await.map_err(schema_error)?;
    let pool = guard.pool();

    let foreign_keys: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::Schema(format!("Failed to read foreign_keys pragma: {}", e)))?;
    if foreign_keys != 1 {
        return Err(AppError::Schema(
            "Foreign key enforcement is disabled on the connection".to_string(),
        ));
    }

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::Schema(format!("Failed to begin schema transaction: {}", e)))?;

    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Schema(format!("DDL failed: {}", e)))?;
    }

    for (table, required) in REQUIRED_COLUMNS {
        let present: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
            .bind(*table)
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| AppError::Schema(format!("Failed to inspect table {}: {}", table, e)))?;

        let missing: Vec<&str> = required
            .iter()
            .copied()
            .filter(|column| !present.iter().any(|p| p == column))
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Schema(format!(
                "Table {} is incompatible, missing columns: {}",
                table,
                missing.join(", ")
            )));
        }
    }

    tx.commit()
        .await
        .map_err(|e| AppError::Schema(format!("Failed to commit schema: {}", e)))?;

    debug!(statements = SCHEMA_STATEMENTS.len(), "Schema statements applied");
    info!("Database schema ready");
    Ok(())
}

fn schema_error(err: AppError) -> AppError {
    match err {
        AppError::Schema(_) => err,
        other => AppError::Schema(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::StorageLayout;
    use tempfile::TempDir;

    async fn open(dir: &TempDir) -> DatabaseHandle {
        DatabaseHandle::open(StorageLayout::new(dir.path().join("shop.db")))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let handle = open(&dir).await;

        ensure_schema(&handle).await.unwrap();
        ensure_schema(&handle).await.unwrap();

        let guard = handle.shared().await.unwrap();
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(guard.pool())
        .await
        .unwrap();
        assert_eq!(tables, vec!["customers", "prescriptions", "products"]);

        let triggers: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'trigger'")
                .fetch_one(guard.pool())
                .await
                .unwrap();
        assert_eq!(triggers, 3);
    }

    #[tokio::test]
    async fn test_blank_name_rejected_by_check() {
        let dir = TempDir::new().unwrap();
        let handle = open(&dir).await;
        ensure_schema(&handle).await.unwrap();

        let guard = handle.shared().await.unwrap();
        let result = sqlx::query("INSERT INTO customers (name, record_date) VALUES ('   ', '2024-01-01')")
            .execute(guard.pool())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_orphan_product_rejected() {
        let dir = TempDir::new().unwrap();
        let handle = open(&dir).await;
        ensure_schema(&handle).await.unwrap();

        let guard = handle.shared().await.unwrap();
        let result = sqlx::query("INSERT INTO products (customer_id, frame_name) VALUES (42, 'Ray')")
            .execute(guard.pool())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_legacy_table_without_expected_columns_is_rejected() {
        let dir = TempDir::new().unwrap();
        let handle = open(&dir).await;
        {
            let guard = handle.shared().await.unwrap();
            sqlx::query("CREATE TABLE customers (id INTEGER PRIMARY KEY, name TEXT, phone TEXT, date TEXT)")
                .execute(guard.pool())
                .await
                .unwrap();
        }

        let err = ensure_schema(&handle).await.unwrap_err();
        assert!(matches!(err, AppError::Schema(_)));
        assert!(err.to_string().contains("record_date"));

        // Nothing from the rejected run is left behind.
        let guard = handle.shared().await.unwrap();
        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'products'",
        )
        .fetch_one(guard.pool())
        .await
        .unwrap();
        assert_eq!(tables, 0);
    }
}
