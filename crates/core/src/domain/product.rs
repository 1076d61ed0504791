// Product Domain Model

use super::error::ValidationError;
use serde::{Deserialize, Serialize};

/// Product order as entered by the caller
///
/// Costs arrive as the text of the caller's numeric fields and are parsed by
/// [`ProductDraft::parse`] before any row is written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub frame_name: String,
    pub lens_name: String,
    pub frame_cost: String,
    pub lens_cost: String,

    /// Caller-computed total; blank means `frame_cost + lens_cost`
    #[serde(default)]
    pub total_cost: String,
}

impl ProductDraft {
    pub fn new(frame_name: impl Into<String>, lens_name: impl Into<String>) -> Self {
        Self {
            frame_name: frame_name.into(),
            lens_name: lens_name.into(),
            ..Default::default()
        }
    }

    pub fn with_costs(
        mut self,
        frame_cost: impl Into<String>,
        lens_cost: impl Into<String>,
        total_cost: impl Into<String>,
    ) -> Self {
        self.frame_cost = frame_cost.into();
        self.lens_cost = lens_cost.into();
        self.total_cost = total_cost.into();
        self
    }

    /// Parse the cost fields into a storable [`Product`]
    ///
    /// Blank frame/lens costs count as zero. The total is taken as given (it is
    /// NOT checked against the sum); only a blank total is filled in.
    pub fn parse(&self) -> Result<Product, ValidationError> {
        let frame_cost = parse_amount("frame_cost", &self.frame_cost)?;
        let lens_cost = parse_amount("lens_cost", &self.lens_cost)?;

        let total_cost = if self.total_cost.trim().is_empty() {
            let sum = frame_cost + lens_cost;
            if !sum.is_finite() {
                return Err(ValidationError::NonFiniteCost {
                    field: "total_cost",
                    value: sum,
                });
            }
            sum
        } else {
            parse_number("total_cost", &self.total_cost)?
        };

        Ok(Product {
            frame_name: self.frame_name.clone(),
            lens_name: self.lens_name.clone(),
            frame_cost,
            lens_cost,
            total_cost,
        })
    }
}

/// Stored product row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub frame_name: String,
    pub lens_name: String,
    pub frame_cost: f64,
    pub lens_cost: f64,
    pub total_cost: f64,
}

impl Product {
    /// Whether the stored total agrees with its components
    pub fn total_matches_components(&self) -> bool {
        (self.frame_cost + self.lens_cost - self.total_cost).abs() < 0.005
    }
}

fn parse_number(field: &'static str, raw: &str) -> Result<f64, ValidationError> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidCost {
            field,
            value: raw.to_string(),
        })?;

    if !value.is_finite() {
        return Err(ValidationError::NonFiniteCost { field, value });
    }
    Ok(value)
}

fn parse_amount(field: &'static str, raw: &str) -> Result<f64, ValidationError> {
    if raw.trim().is_empty() {
        return Ok(0.0);
    }

    let value = parse_number(field, raw)?;
    if value < 0.0 {
        return Err(ValidationError::NegativeCost { field, value });
    }
    Ok(value)
}
