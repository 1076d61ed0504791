// Transaction port for atomic multi-table writes

use crate::domain::{CustomerId, NewCustomer, Prescription, Product};
use crate::error::Result;
use async_trait::async_trait;

/// Transaction trait for atomic multi-step operations
#[async_trait]
pub trait Transaction: Send {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Record store that can open aggregate write transactions
#[async_trait]
pub trait TransactionalRecordStore: Send + Sync {
    /// Begin a new transaction
    ///
    /// The transaction holds the shared side of the database handle lock until
    /// it is committed, rolled back or dropped.
    async fn begin_transaction(&self) -> Result<Box<dyn AggregateTransaction>>;
}

/// Aggregate writes within a transaction
#[async_trait]
pub trait AggregateTransaction: Transaction {
    /// Insert the customer row and return the generated id
    async fn insert_customer(&mut self, customer: &NewCustomer, record_date: &str)
        -> Result<CustomerId>;

    async fn insert_prescription(
        &mut self,
        customer_id: CustomerId,
        prescription: &Prescription,
    ) -> Result<()>;

    async fn insert_product(&mut self, customer_id: CustomerId, product: &Product) -> Result<()>;
}

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::sync::{Arc, Mutex};

    /// Step at which [`MockTransactionalStore`] should fail
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FailAt {
        Never,
        Customer,
        Prescription,
        Product,
        Commit,
    }

    /// Journal of what the mock transaction saw
    #[derive(Debug, Default, Clone)]
    pub struct TransactionJournal {
        pub begun: usize,
        pub committed: usize,
        pub rolled_back: usize,
        pub staged: Vec<&'static str>,
        pub last_record_date: Option<String>,
    }

    /// In-memory transactional store with fault injection
    pub struct MockTransactionalStore {
        fail_at: FailAt,
        journal: Arc<Mutex<TransactionJournal>>,
    }

    impl MockTransactionalStore {
        pub fn new(fail_at: FailAt) -> Self {
            Self {
                fail_at,
                journal: Arc::new(Mutex::new(TransactionJournal::default())),
            }
        }

        pub fn journal(&self) -> TransactionJournal {
            self.journal.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TransactionalRecordStore for MockTransactionalStore {
        async fn begin_transaction(&self) -> Result<Box<dyn AggregateTransaction>> {
            self.journal.lock().unwrap().begun += 1;
            Ok(Box::new(MockTransaction {
                fail_at: self.fail_at,
                journal: Arc::clone(&self.journal),
                staged: Vec::new(),
            }))
        }
    }

    struct MockTransaction {
        fail_at: FailAt,
        journal: Arc<Mutex<TransactionJournal>>,
        staged: Vec<&'static str>,
    }

    impl MockTransaction {
        fn step(&mut self, step: FailAt, name: &'static str) -> Result<()> {
            if self.fail_at == step {
                return Err(AppError::Database(format!("injected failure at {}", name)));
            }
            self.staged.push(name);
            Ok(())
        }
    }

    #[async_trait]
    impl Transaction for MockTransaction {
        async fn commit(mut self: Box<Self>) -> Result<()> {
            self.step(FailAt::Commit, "commit")?;
            let mut journal = self.journal.lock().unwrap();
            journal.committed += 1;
            journal.staged.extend(self.staged.iter().filter(|s| **s != "commit"));
            Ok(())
        }

        async fn rollback(self: Box<Self>) -> Result<()> {
            self.journal.lock().unwrap().rolled_back += 1;
            Ok(())
        }
    }

    #[async_trait]
    impl AggregateTransaction for MockTransaction {
        async fn insert_customer(
            &mut self,
            _customer: &NewCustomer,
            record_date: &str,
        ) -> Result<CustomerId> {
            self.step(FailAt::Customer, "customer")?;
            self.journal.lock().unwrap().last_record_date = Some(record_date.to_string());
            Ok(1)
        }

        async fn insert_prescription(
            &mut self,
            _customer_id: CustomerId,
            _prescription: &Prescription,
        ) -> Result<()> {
            self.step(FailAt::Prescription, "prescription")
        }

        async fn insert_product(&mut self, _customer_id: CustomerId, _product: &Product) -> Result<()> {
            self.step(FailAt::Product, "product")
        }
    }
}
