// Create Aggregate Use Case

use crate::domain::{CustomerId, NewCustomer, Prescription, Product, ProductDraft, ValidationError};
use crate::error::Result;
use crate::port::{AggregateTransaction, TimeProvider, TransactionalRecordStore};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Everything needed to create one aggregate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAggregateRequest {
    pub customer: NewCustomer,

    #[serde(default)]
    pub prescription: Prescription,

    #[serde(default)]
    pub product: ProductDraft,
}

impl CreateAggregateRequest {
    pub fn new(customer: NewCustomer, prescription: Prescription, product: ProductDraft) -> Self {
        Self {
            customer,
            prescription,
            product,
        }
    }
}

/// Validate the request; nothing is written when this fails
pub fn validate_request(req: &CreateAggregateRequest) -> std::result::Result<Product, ValidationError> {
    if !req.customer.has_name() {
        return Err(ValidationError::EmptyName);
    }
    req.product.parse()
}

/// Execute create use case (with transaction for atomicity)
///
/// # Arguments
///
/// * `tx_store` - Transactional record store
/// * `time_provider` - Supplies the default record date
/// * `req` - Create request
///
/// Any failure after the transaction opens rolls it back and is reported as
/// `AppError::Write`.
pub async fn execute(
    tx_store: &dyn TransactionalRecordStore,
    time_provider: &dyn TimeProvider,
    req: CreateAggregateRequest,
) -> Result<CustomerId> {
    let product = validate_request(&req)?;

    let record_date = req
        .customer
        .record_date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| time_provider.today());

    let mut tx = tx_store
        .begin_transaction()
        .await
        .map_err(|e| e.into_write())?;

    match write_rows(tx.as_mut(), &req, &record_date, &product).await {
        Ok(customer_id) => {
            tx.commit().await.map_err(|e| e.into_write())?;
            info!(customer_id = customer_id, "Aggregate created");
            Ok(customer_id)
        }
        Err(e) => {
            warn!(error = %e, "Aggregate write failed, rolling back");
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback failed");
            }
            Err(e.into_write())
        }
    }
}

async fn write_rows(
    tx: &mut dyn AggregateTransaction,
    req: &CreateAggregateRequest,
    record_date: &str,
    product: &Product,
) -> Result<CustomerId> {
    let customer_id = tx.insert_customer(&req.customer, record_date).await?;
    tx.insert_prescription(customer_id, &req.prescription).await?;
    tx.insert_product(customer_id, product).await?;
    Ok(customer_id)
}
