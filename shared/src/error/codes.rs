//! Unified error codes for the Drayage TMS
//!
//! This module defines all error codes used across the engine and its
//! callers. Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Tenant errors
//! - 4xxx: Shipment errors
//! - 5xxx: Hold errors
//! - 6xxx: Assignment errors
//! - 7xxx: Billing / charge errors
//! - 9xxx: System errors

use http::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,
    /// Business rule violation
    BusinessRule = 9,

    // ==================== 1xxx: Auth ====================
    /// Caller is not authenticated
    NotAuthenticated = 1001,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,

    // ==================== 3xxx: Tenant ====================
    /// Tenant keys missing on a read or write
    TenantNotScoped = 3001,
    /// Tenant not found
    TenantNotFound = 3002,

    // ==================== 4xxx: Shipment ====================
    /// Shipment not found
    ShipmentNotFound = 4001,
    /// Optimistic version check failed; re-read and retry
    VersionMismatch = 4002,
    /// Shipment is in a terminal state
    ShipmentTerminal = 4003,
    /// Organization disallows removing moves from a shipment
    MoveRemovalNotAllowed = 4004,
    /// A move must keep at least one pickup, one delivery, two stops
    StopMinimumViolated = 4005,
    /// Move has fewer than two stops
    InsufficientStops = 4006,
    /// Duplicate bill-of-lading within tenant
    DuplicateBol = 4007,
    /// Invalid state transition requested
    InvalidTransition = 4008,

    // ==================== 5xxx: Hold ====================
    /// Hold reason code not found for tenant
    HoldReasonNotFound = 5001,
    /// Hold has already been released
    HoldAlreadyReleased = 5002,
    /// Dispatch is blocked by an active hold
    DispatchBlocked = 5003,
    /// Delivery is blocked by an active hold
    DeliveryBlocked = 5004,
    /// Billing is blocked by an active hold
    BillingBlocked = 5005,
    /// Blocking severity requires at least one blocks flag
    HoldSeverityRule = 5006,

    // ==================== 6xxx: Assignment ====================
    /// Assignment not found
    AssignmentNotFound = 6001,
    /// Move is not in an assignable state
    MoveNotAssignable = 6002,
    /// Move already has a non-canceled assignment
    AssignmentExists = 6003,

    // ==================== 7xxx: Billing / Charge ====================
    /// Shipment is not ready to bill
    NotReadyToBill = 7001,
    /// Formula template missing for formula-rated shipment
    FormulaTemplateMissing = 7002,

    // ==================== 9xxx: System ====================
    /// Internal error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Serialization / decoding error
    SerializationError = 9003,
    /// Job queue error
    JobQueueError = 9004,
}

impl ErrorCode {
    /// Default human-readable message for this code.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Unknown => "Unknown error",
            Self::ValidationFailed => "Validation failed",
            Self::NotFound => "Resource not found",
            Self::AlreadyExists => "Resource already exists",
            Self::InvalidRequest => "Invalid request",
            Self::InvalidFormat => "Invalid format",
            Self::RequiredField => "Required field missing",
            Self::ValueOutOfRange => "Value out of range",
            Self::BusinessRule => "Business rule violation",
            Self::NotAuthenticated => "Authentication required",
            Self::PermissionDenied => "Permission denied",
            Self::TenantNotScoped => "Read or write issued without tenant keys",
            Self::TenantNotFound => "Tenant not found",
            Self::ShipmentNotFound => "Shipment not found",
            Self::VersionMismatch => "Record was modified by another request",
            Self::ShipmentTerminal => "Shipment is in a terminal state",
            Self::MoveRemovalNotAllowed => "Organization disallows move removals",
            Self::StopMinimumViolated => {
                "A move must keep at least one pickup, one delivery, and two stops"
            }
            Self::InsufficientStops => "Move has fewer than two stops",
            Self::DuplicateBol => "Another shipment carries the same BOL",
            Self::InvalidTransition => "Invalid state transition",
            Self::HoldReasonNotFound => "Hold reason not found",
            Self::HoldAlreadyReleased => "Hold has already been released",
            Self::DispatchBlocked => "Dispatch is blocked by an active hold",
            Self::DeliveryBlocked => "Delivery is blocked by an active hold",
            Self::BillingBlocked => "Billing is blocked by an active hold",
            Self::HoldSeverityRule => "Blocking severity requires at least one blocks flag",
            Self::AssignmentNotFound => "Assignment not found",
            Self::MoveNotAssignable => "Move is not in an assignable state",
            Self::AssignmentExists => "Move already has an active assignment",
            Self::NotReadyToBill => "Shipment is not ready to bill",
            Self::FormulaTemplateMissing => "Formula template is missing",
            Self::InternalError => "Internal error",
            Self::DatabaseError => "Database error",
            Self::SerializationError => "Serialization error",
            Self::JobQueueError => "Job queue error",
        }
    }

    /// HTTP status semantics for callers that surface errors over HTTP.
    ///
    /// VersionMismatch maps to conflict so callers re-read and retry.
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,
            Self::ValidationFailed
            | Self::InvalidRequest
            | Self::InvalidFormat
            | Self::RequiredField
            | Self::ValueOutOfRange => StatusCode::BAD_REQUEST,
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::NotFound
            | Self::TenantNotFound
            | Self::ShipmentNotFound
            | Self::HoldReasonNotFound
            | Self::AssignmentNotFound => StatusCode::NOT_FOUND,
            Self::AlreadyExists | Self::VersionMismatch | Self::AssignmentExists => {
                StatusCode::CONFLICT
            }
            Self::BusinessRule
            | Self::ShipmentTerminal
            | Self::MoveRemovalNotAllowed
            | Self::StopMinimumViolated
            | Self::InsufficientStops
            | Self::DuplicateBol
            | Self::InvalidTransition
            | Self::HoldAlreadyReleased
            | Self::DispatchBlocked
            | Self::DeliveryBlocked
            | Self::BillingBlocked
            | Self::HoldSeverityRule
            | Self::MoveNotAssignable
            | Self::NotReadyToBill
            | Self::FormulaTemplateMissing => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unknown
            | Self::TenantNotScoped
            | Self::InternalError
            | Self::DatabaseError
            | Self::SerializationError
            | Self::JobQueueError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Raw u16 value of the code.
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", *self as u16)
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code as u16
    }
}

/// Error returned when deserializing an unrecognized error code value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            0 => Self::Success,
            1 => Self::Unknown,
            2 => Self::ValidationFailed,
            3 => Self::NotFound,
            4 => Self::AlreadyExists,
            5 => Self::InvalidRequest,
            6 => Self::InvalidFormat,
            7 => Self::RequiredField,
            8 => Self::ValueOutOfRange,
            9 => Self::BusinessRule,
            1001 => Self::NotAuthenticated,
            2001 => Self::PermissionDenied,
            3001 => Self::TenantNotScoped,
            3002 => Self::TenantNotFound,
            4001 => Self::ShipmentNotFound,
            4002 => Self::VersionMismatch,
            4003 => Self::ShipmentTerminal,
            4004 => Self::MoveRemovalNotAllowed,
            4005 => Self::StopMinimumViolated,
            4006 => Self::InsufficientStops,
            4007 => Self::DuplicateBol,
            4008 => Self::InvalidTransition,
            5001 => Self::HoldReasonNotFound,
            5002 => Self::HoldAlreadyReleased,
            5003 => Self::DispatchBlocked,
            5004 => Self::DeliveryBlocked,
            5005 => Self::BillingBlocked,
            5006 => Self::HoldSeverityRule,
            6001 => Self::AssignmentNotFound,
            6002 => Self::MoveNotAssignable,
            6003 => Self::AssignmentExists,
            7001 => Self::NotReadyToBill,
            7002 => Self::FormulaTemplateMissing,
            9001 => Self::InternalError,
            9002 => Self::DatabaseError,
            9003 => Self::SerializationError,
            9004 => Self::JobQueueError,
            other => return Err(InvalidErrorCode(other)),
        };
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_through_u16() {
        for code in [
            ErrorCode::ValidationFailed,
            ErrorCode::VersionMismatch,
            ErrorCode::DispatchBlocked,
            ErrorCode::MoveNotAssignable,
            ErrorCode::DatabaseError,
        ] {
            assert_eq!(ErrorCode::try_from(code.as_u16()).unwrap(), code);
        }
        assert!(ErrorCode::try_from(4242u16).is_err());
    }

    #[test]
    fn version_mismatch_maps_to_conflict() {
        assert_eq!(
            ErrorCode::VersionMismatch.http_status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn display_is_padded() {
        assert_eq!(ErrorCode::ValidationFailed.to_string(), "E0002");
        assert_eq!(ErrorCode::DispatchBlocked.to_string(), "E5003");
    }
}
