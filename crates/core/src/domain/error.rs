// Domain Validation Errors

use thiserror::Error;

/// Caller-input problems detected before any row is written
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Customer name must not be empty")]
    EmptyName,

    #[error("Invalid {field}: '{value}' is not a number")]
    InvalidCost { field: &'static str, value: String },

    #[error("Invalid {field}: {value} must not be negative")]
    NegativeCost { field: &'static str, value: f64 },

    #[error("Invalid {field}: {value} is not a finite amount")]
    NonFiniteCost { field: &'static str, value: f64 },
}
