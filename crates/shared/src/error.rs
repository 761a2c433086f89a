use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// A textual value that is not part of its field's declared domain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {field} '{value}', expected one of: {expected}")]
pub struct ParseValueError {
    pub field: &'static str,
    pub value: String,
    pub expected: String,
}

impl ParseValueError {
    pub fn new<'a>(
        field: &'static str,
        value: &str,
        expected: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            field,
            value: value.to_string(),
            expected: expected.into_iter().collect::<Vec<_>>().join(", "),
        }
    }
}
