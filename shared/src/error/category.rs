//! Error category classification

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Error category classification based on error code ranges
///
/// Categories are determined by the leading digit of the error code:
/// - 0xxx: General errors
/// - 1xxx: Authentication errors
/// - 2xxx: Permission errors
/// - 3xxx: Tenant errors
/// - 4xxx: Shipment errors
/// - 5xxx: Hold errors
/// - 6xxx: Assignment errors
/// - 7xxx: Billing / charge errors
/// - 9xxx: System errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Authentication errors (1xxx)
    Auth,
    /// Permission errors (2xxx)
    Permission,
    /// Tenant errors (3xxx)
    Tenant,
    /// Shipment errors (4xxx)
    Shipment,
    /// Hold errors (5xxx)
    Hold,
    /// Assignment errors (6xxx)
    Assignment,
    /// Billing / charge errors (7xxx)
    Billing,
    /// System errors (9xxx)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            1000..2000 => Self::Auth,
            2000..3000 => Self::Permission,
            3000..4000 => Self::Tenant,
            4000..5000 => Self::Shipment,
            5000..6000 => Self::Hold,
            6000..7000 => Self::Assignment,
            7000..8000 => Self::Billing,
            _ => Self::System,
        }
    }

    /// Category of a typed error code
    pub fn of(code: ErrorCode) -> Self {
        Self::from_code(code.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_classify() {
        assert_eq!(ErrorCategory::of(ErrorCode::ValidationFailed), ErrorCategory::General);
        assert_eq!(ErrorCategory::of(ErrorCode::VersionMismatch), ErrorCategory::Shipment);
        assert_eq!(ErrorCategory::of(ErrorCode::DispatchBlocked), ErrorCategory::Hold);
        assert_eq!(ErrorCategory::of(ErrorCode::MoveNotAssignable), ErrorCategory::Assignment);
        assert_eq!(ErrorCategory::of(ErrorCode::DatabaseError), ErrorCategory::System);
    }
}
