// Central Error Type for the Application

use crate::domain::{CustomerId, ValidationError};
use thiserror::Error;

/// Application-level error type
///
/// Each variant is a distinct condition callers are expected to branch on:
/// `Validation` means re-prompt, `Write` means the transaction was rolled back,
/// `NotFound` is a normal negative result and `Schema` is fatal at startup.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Write failed and was rolled back: {0}")]
    Write(String),

    #[error("Customer {0} not found")]
    NotFound(CustomerId),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Maintenance error: {0}")]
    Maintenance(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Collapse any failure raised inside a write transaction into `Write`.
    ///
    /// Errors that are already `Write` pass through untouched.
    pub fn into_write(self) -> Self {
        match self {
            AppError::Write(_) => self,
            other => AppError::Write(other.to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by converting to AppError::Database(String)
