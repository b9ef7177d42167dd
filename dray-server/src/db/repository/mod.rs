//! Repository module
//!
//! Per-aggregate repositories over the PostgreSQL pools. Every query is
//! tenant-scoped; a repository method that receives empty tenant keys is a
//! programming error and fails fast.

pub mod assignment;
pub mod control;
pub mod diff;
pub mod hold;
pub mod location;
pub mod sequence;
pub mod shipment;

// Re-exports
pub use assignment::AssignmentRepository;
pub use control::ControlRepository;
pub use hold::HoldRepository;
pub use location::LocationRepository;
pub use sequence::ProNumberSequence;
pub use shipment::ShipmentRepository;

use shared::error::{AppError, ErrorCode};
use shared::types::TenantScope;
use thiserror::Error;

use crate::core::error::{MultiError, ServiceError};

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Optimistic CAS failure; always retryable after a re-read.
    #[error("version mismatch on {kind} {id}")]
    VersionMismatch { kind: &'static str, id: String },

    /// Violated domain rule that is not a pure field check
    #[error("{0}")]
    Business(AppError),

    /// Aggregated field-level failures from in-transaction derivation
    #[error(transparent)]
    Validation(MultiError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RepoError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn version_mismatch(kind: &'static str, id: impl Into<String>) -> Self {
        Self::VersionMismatch {
            kind,
            id: id.into(),
        }
    }

    pub fn business(code: ErrorCode, msg: impl Into<String>) -> Self {
        Self::Business(AppError::business_code(code, msg))
    }
}

impl From<MultiError> for RepoError {
    fn from(multi: MultiError) -> Self {
        Self::Validation(multi)
    }
}

impl From<RepoError> for ServiceError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound { kind, id } => ServiceError::App(AppError::not_found(kind, id)),
            RepoError::VersionMismatch { kind, id } => {
                ServiceError::App(AppError::version_mismatch(kind, id))
            }
            RepoError::Business(app) => ServiceError::App(app),
            RepoError::Validation(multi) => ServiceError::Validation(multi),
            RepoError::Database(db) => ServiceError::Db(db),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Fail fast when a caller forgot tenant scoping.
pub(crate) fn require_tenant(tenant: &TenantScope) -> RepoResult<()> {
    if tenant.organization_id.is_empty() || tenant.business_unit_id.is_empty() {
        return Err(RepoError::business(
            ErrorCode::TenantNotScoped,
            "query issued without tenant keys",
        ));
    }
    Ok(())
}
