//! Field constraints shared by the client draft check and the server.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{FieldKey, RecipientFields};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: FieldKey,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: FieldKey, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }

    pub fn required(field: FieldKey) -> Self {
        Self::new(field, format!("{} is required", field.title()))
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Checks the constraints that typing alone cannot express.
pub fn validate_fields(fields: &RecipientFields) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    for (field, value) in [
        (FieldKey::FirstName, &fields.first_name),
        (FieldKey::LastName, &fields.last_name),
        (FieldKey::HouseholdId, &fields.household_id),
    ] {
        if is_blank(value) {
            violations.push(FieldViolation::required(field));
        }
    }
    violations
}

pub fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
