// Customer Domain Model

use serde::{Deserialize, Serialize};

/// Surrogate key assigned by the store on insert
pub type CustomerId = i64;

/// Customer fields supplied by the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,

    #[serde(default)]
    pub phone: Option<String>,

    /// Free-text date; defaults to the creation day when absent or blank
    #[serde(default)]
    pub record_date: Option<String>,
}

impl NewCustomer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone: None,
            record_date: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_record_date(mut self, record_date: impl Into<String>) -> Self {
        self.record_date = Some(record_date.into());
        self
    }

    /// Name is required and must contain something other than whitespace
    pub fn has_name(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// Stored customer row
///
/// `created_at` and `updated_at` are assigned by the store; `updated_at` is
/// refreshed by a trigger on every row mutation and never written directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone: Option<String>,
    pub record_date: String,
    pub created_at: String,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_name_rejects_whitespace() {
        assert!(!NewCustomer::new("").has_name());
        assert!(!NewCustomer::new(" \t\n").has_name());
        assert!(NewCustomer::new(" Priya ").has_name());
    }

    #[test]
    fn test_builder_sets_optional_fields() {
        let customer = NewCustomer::new("Alice Sharma")
            .with_phone("9998887776")
            .with_record_date("2024-03-01");

        assert_eq!(customer.phone.as_deref(), Some("9998887776"));
        assert_eq!(customer.record_date.as_deref(), Some("2024-03-01"));
    }
}
