//! Unit tests for create validation and rollback

use super::create::{execute, validate_request};
use super::*;
use crate::domain::{EyeMeasurement, NewCustomer, Prescription, ProductDraft, ValidationError};
use crate::port::time_provider::mocks::MockTimeProvider;
use crate::port::transaction::mocks::{FailAt, MockTransactionalStore};

// 2024-03-15 12:00:00 UTC
const FIXED_MILLIS: i64 = 1_710_504_000_000;

fn request(name: &str) -> CreateAggregateRequest {
    CreateAggregateRequest::new(
        NewCustomer::new(name).with_phone("9876543210"),
        Prescription::new(
            EyeMeasurement::new("-1.25", "-0.50", "90", ""),
            EyeMeasurement::new("-1.00", "", "", ""),
        ),
        ProductDraft::new("Ray-Ban RB5154", "Crizal").with_costs("3500", "2200", "5700"),
    )
}

#[test]
fn test_validate_empty_name() {
    let result = validate_request(&request(""));
    assert_eq!(result.unwrap_err(), ValidationError::EmptyName);

    let result = validate_request(&request("   "));
    assert!(result.unwrap_err().to_string().contains("empty"));
}

#[test]
fn test_validate_non_numeric_cost() {
    let mut req = request("Meera");
    req.product.lens_cost = "two thousand".to_string();

    let result = validate_request(&req);
    assert!(matches!(
        result.unwrap_err(),
        ValidationError::InvalidCost { field: "lens_cost", .. }
    ));
}

#[test]
fn test_validation_failure_opens_no_transaction() {
    let store = MockTransactionalStore::new(FailAt::Never);
    let clock = MockTimeProvider::new(FIXED_MILLIS);

    let result = tokio_test::block_on(execute(&store, &clock, request(" ")));

    assert!(matches!(result, Err(AppError::Validation(ValidationError::EmptyName))));
    assert_eq!(store.journal().begun, 0);
}

#[test]
fn test_successful_create_commits_all_three_rows() {
    let store = MockTransactionalStore::new(FailAt::Never);
    let clock = MockTimeProvider::new(FIXED_MILLIS);

    let id = tokio_test::block_on(execute(&store, &clock, request("Meera"))).unwrap();

    let journal = store.journal();
    assert_eq!(id, 1);
    assert_eq!(journal.committed, 1);
    assert_eq!(journal.rolled_back, 0);
    assert_eq!(journal.staged, vec!["customer", "prescription", "product"]);
}

#[test]
fn test_product_failure_rolls_back_whole_aggregate() {
    let store = MockTransactionalStore::new(FailAt::Product);
    let clock = MockTimeProvider::new(FIXED_MILLIS);

    let result = tokio_test::block_on(execute(&store, &clock, request("Meera")));

    assert!(matches!(result, Err(AppError::Write(_))));
    let journal = store.journal();
    assert_eq!(journal.committed, 0);
    assert_eq!(journal.rolled_back, 1);
    assert!(journal.staged.is_empty(), "nothing may be committed");
}

#[test]
fn test_commit_failure_is_write_error() {
    let store = MockTransactionalStore::new(FailAt::Commit);
    let clock = MockTimeProvider::new(FIXED_MILLIS);

    let result = tokio_test::block_on(execute(&store, &clock, request("Meera")));

    match result {
        Err(AppError::Write(msg)) => assert!(msg.contains("commit")),
        other => panic!("expected Write error, got {:?}", other),
    }
}

#[test]
fn test_record_date_defaults_to_today() {
    let store = MockTransactionalStore::new(FailAt::Never);
    let clock = MockTimeProvider::new(FIXED_MILLIS);

    tokio_test::block_on(execute(&store, &clock, request("Meera"))).unwrap();
    assert_eq!(store.journal().last_record_date, Some(clock.today()));

    let mut req = request("Ravi");
    req.customer.record_date = Some("15/03/2024".to_string());
    tokio_test::block_on(execute(&store, &clock, req)).unwrap();
    assert_eq!(store.journal().last_record_date.as_deref(), Some("15/03/2024"));
}
