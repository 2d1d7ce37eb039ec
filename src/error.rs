//! Unified application error model and mapping helpers.
//! Every failure surfaced by validation, directory resolution, or the storage
//! collaborator is one `AppError`; the outer shell only needs `http_status`
//! (or the serialized form) to turn it into a user-visible response.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// What was wrong with a single request field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MissingField,
    InvalidEnum,
    OutOfRange,
    UnknownFacet,
    /// Present but not parseable (e.g. `limit=ten`).
    Malformed,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::MissingField => "missing_field",
            ViolationKind::InvalidEnum => "invalid_enum",
            ViolationKind::OutOfRange => "out_of_range",
            ViolationKind::UnknownFacet => "unknown_facet",
            ViolationKind::Malformed => "malformed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub kind: ViolationKind,
    pub message: String,
}

impl Violation {
    pub fn new(field: impl Into<String>, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self { field: field.into(), kind, message: message.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    Validation { code: String, message: String, violations: Vec<Violation> },
    NotFound { code: String, message: String },
    Storage { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::Validation { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Storage { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::Validation { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Storage { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn not_found<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn storage<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Storage { code: code.into(), message: msg.into() } }
    pub fn internal<C: Into<String>, M: Into<String>>(code: C, msg: M) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Build a validation error from the full list of violated fields.
    /// The summary message names every field so a log line alone is enough to fix the request.
    pub fn validation(violations: Vec<Violation>) -> Self {
        let fields: Vec<String> = violations.iter().map(|v| format!("{} ({})", v.field, v.kind.as_str())).collect();
        let code = if violations.iter().any(|v| v.kind == ViolationKind::UnknownFacet) { "unknown_facet" } else { "invalid_parameters" };
        AppError::Validation {
            code: code.to_string(),
            message: format!("invalid request parameters: {}", fields.join(", ")),
            violations,
        }
    }

    pub fn violations(&self) -> &[Violation] {
        match self {
            AppError::Validation { violations, .. } => violations.as_slice(),
            _ => &[],
        }
    }

    /// True when the request named a facet token the catalog does not know.
    pub fn is_unknown_facet(&self) -> bool {
        self.violations().iter().any(|v| v.kind == ViolationKind::UnknownFacet)
    }

    /// True when a violation of `kind` was reported for `field`.
    pub fn has_violation(&self, field: &str, kind: ViolationKind) -> bool {
        self.violations().iter().any(|v| v.field == field && v.kind == kind)
    }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::Validation { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Storage { .. } => 503,
            AppError::Internal { .. } => 500,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

impl From<tokio_postgres::Error> for AppError {
    fn from(err: tokio_postgres::Error) -> Self {
        AppError::Storage { code: "storage_error".into(), message: err.to_string() }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
