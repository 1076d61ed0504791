// SQLite Aggregate Transaction

use crate::connection::SharedGuard;
use crate::error::map_sqlx_error;
use async_trait::async_trait;
use optical_core::domain::{CustomerId, NewCustomer, Prescription, Product};
use optical_core::error::Result;
use optical_core::port::{AggregateTransaction, Transaction};
use sqlx::{Sqlite, Transaction as SqlxTransaction};

/// One customer aggregate write
///
/// Owns the shared handle guard, so no snapshot can start until the
/// transaction is committed, rolled back or dropped. `tx` is declared first
/// so it is dropped (rolled back) before the guard is released.
pub struct SqliteAggregateTransaction {
    tx: SqlxTransaction<'static, Sqlite>,
    _guard: SharedGuard,
}

impl SqliteAggregateTransaction {
    pub(crate) async fn begin(guard: SharedGuard) -> Result<Self> {
        let tx = guard.pool().begin().await.map_err(map_sqlx_error)?;
        Ok(Self { tx, _guard: guard })
    }
}

#[async_trait]
impl Transaction for SqliteAggregateTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        let Self { tx, _guard } = *self;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let Self { tx, _guard } = *self;
        tx.rollback().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}

#[async_trait]
impl AggregateTransaction for SqliteAggregateTransaction {
    async fn insert_customer(
        &mut self,
        customer: &NewCustomer,
        record_date: &str,
    ) -> Result<CustomerId> {
        let result = sqlx::query("INSERT INTO customers (name, phone, record_date) VALUES (?, ?, ?)")
            .bind(&customer.name)
            .bind(&customer.phone)
            .bind(record_date)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.last_insert_rowid())
    }

    async fn insert_prescription(
        &mut self,
        customer_id: CustomerId,
        prescription: &Prescription,
    ) -> Result<()> {
        let right = &prescription.right;
        let left = &prescription.left;

        sqlx::query(
            r#"
            INSERT INTO prescriptions (
                customer_id,
                right_sph, right_cyl, right_axis, right_add,
                left_sph, left_cyl, left_axis, left_add
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(customer_id)
        .bind(&right.sphere)
        .bind(&right.cylinder)
        .bind(&right.axis)
        .bind(&right.addition)
        .bind(&left.sphere)
        .bind(&left.cylinder)
        .bind(&left.axis)
        .bind(&left.addition)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn insert_product(&mut self, customer_id: CustomerId, product: &Product) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                customer_id, frame_name, lens_name, frame_cost, lens_cost, total_cost
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(customer_id)
        .bind(&product.frame_name)
        .bind(&product.lens_name)
        .bind(product.frame_cost)
        .bind(product.lens_cost)
        .bind(product.total_cost)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}
