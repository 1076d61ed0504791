// Prescription Domain Model

use serde::{Deserialize, Serialize};

/// Optometric readings for one eye
///
/// All values are free text: blank, "plano" and other shop notations are
/// valid entries and are stored exactly as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EyeMeasurement {
    pub sphere: String,
    pub cylinder: String,
    pub axis: String,
    pub addition: String,
}

impl EyeMeasurement {
    pub fn new(
        sphere: impl Into<String>,
        cylinder: impl Into<String>,
        axis: impl Into<String>,
        addition: impl Into<String>,
    ) -> Self {
        Self {
            sphere: sphere.into(),
            cylinder: cylinder.into(),
            axis: axis.into(),
            addition: addition.into(),
        }
    }
}

/// Prescription belonging to exactly one customer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub right: EyeMeasurement,
    pub left: EyeMeasurement,
}

impl Prescription {
    pub fn new(right: EyeMeasurement, left: EyeMeasurement) -> Self {
        Self { right, left }
    }
}
