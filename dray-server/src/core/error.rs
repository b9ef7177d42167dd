//! Unified service-layer error types for dray-server
//!
//! `ServiceError` bridges the gap between DB-layer errors (`sqlx::Error`)
//! and the caller-facing error (`AppError`). It enables `?` propagation
//! without manual `.map_err(|e| { tracing::error!(...); ... })` boilerplate.
//!
//! `MultiError` is the field-keyed aggregate used by the validation engine
//! and the state coordinator: independent failures within one write are all
//! collected so a single call can report every problem at once.

use serde::Serialize;
use shared::error::{AppError, ErrorCode};
use std::fmt;

/// Field-level validation codes surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    Required,
    Invalid,
    AlreadyExists,
    VersionMismatch,
}

impl ValidationCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Required => "REQUIRED",
            Self::Invalid => "INVALID",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::VersionMismatch => "VERSION_MISMATCH",
        }
    }
}

/// One field-level failure, keyed by a path like
/// `moves[0].stops[1].plannedDeparture`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub code: ValidationCode,
    pub message: String,
}

impl FieldError {
    pub fn new(
        field: impl Into<String>,
        code: ValidationCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: [{}] {}", self.field, self.code.as_str(), self.message)
    }
}

/// Aggregate of independent field-level failures.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MultiError {
    pub errors: Vec<FieldError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, code: ValidationCode, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, code, message));
    }

    pub fn push(&mut self, err: FieldError) {
        self.errors.push(err);
    }

    /// Fold another aggregate in, prefixing its paths.
    pub fn merge_prefixed(&mut self, prefix: &str, other: MultiError) {
        for mut err in other.errors {
            err.field = if err.field.is_empty() {
                prefix.to_string()
            } else {
                format!("{prefix}.{}", err.field)
            };
            self.errors.push(err);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Ok when nothing was collected, Err(self) otherwise.
    pub fn into_result(self) -> Result<(), MultiError> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.errors.len())?;
        for err in &self.errors {
            write!(f, "; {err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}

impl From<MultiError> for AppError {
    fn from(multi: MultiError) -> Self {
        let fields = serde_json::to_value(&multi.errors).unwrap_or_default();
        AppError::new(ErrorCode::ValidationFailed).with_detail("fields", fields)
    }
}

/// Service-layer error.
///
/// - `Db`: database/infrastructure errors (auto-logged, mapped to DatabaseError)
/// - `App`: business-rule errors (transparent pass-through to client)
/// - `Validation`: the collected multi-error for a rejected write
#[derive(Debug)]
pub enum ServiceError {
    /// Database or infrastructure error
    Db(sqlx::Error),
    /// Business-rule or lookup error (already an AppError with the right code)
    App(AppError),
    /// Aggregated field-level failures
    Validation(MultiError),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Db(e) => write!(f, "database error: {e}"),
            Self::App(e) => write!(f, "{e}"),
            Self::Validation(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        ServiceError::Db(e)
    }
}

impl From<AppError> for ServiceError {
    fn from(e: AppError) -> Self {
        ServiceError::App(e)
    }
}

impl From<MultiError> for ServiceError {
    fn from(e: MultiError) -> Self {
        ServiceError::Validation(e)
    }
}

impl From<ServiceError> for AppError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::App(app_err) => app_err,
            ServiceError::Validation(multi) => multi.into(),
            ServiceError::Db(db_err) => {
                tracing::error!(error = %db_err, "Service database error");
                AppError::new(ErrorCode::DatabaseError)
            }
        }
    }
}

/// Convenience type alias for service-layer results
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multi_error_collects_and_prefixes() {
        let mut inner = MultiError::new();
        inner.add("plannedDeparture", ValidationCode::Invalid, "must follow arrival");

        let mut outer = MultiError::new();
        outer.add("proNumber", ValidationCode::Required, "missing");
        outer.merge_prefixed("moves[0].stops[1]", inner);

        assert_eq!(outer.len(), 2);
        assert_eq!(outer.errors[1].field, "moves[0].stops[1].plannedDeparture");
    }

    #[test]
    fn empty_multi_error_is_ok() {
        assert!(MultiError::new().into_result().is_ok());
    }

    #[test]
    fn multi_error_converts_to_app_error() {
        let mut multi = MultiError::new();
        multi.add("bol", ValidationCode::AlreadyExists, "duplicate BOL");
        let app: AppError = multi.into();
        assert_eq!(app.code, ErrorCode::ValidationFailed);
        assert!(app.details.unwrap().contains_key("fields"));
    }
}
