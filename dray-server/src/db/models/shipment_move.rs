//! Shipment move model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::types::Timestamp;

use super::assignment::Assignment;
use super::stop::Stop;

/// Move lifecycle status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "move_status", rename_all = "snake_case")]
pub enum MoveStatus {
    #[default]
    New,
    Assigned,
    InTransit,
    Completed,
    Canceled,
}

impl MoveStatus {
    /// Canceled is the only terminal move state (Completed may still cancel).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

impl std::fmt::Display for MoveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::Assigned => "ASSIGNED",
            Self::InTransit => "IN_TRANSIT",
            Self::Completed => "COMPLETED",
            Self::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}

/// A contiguous leg of a shipment operated by one driver assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShipmentMove {
    pub id: String,
    pub shipment_id: String,
    pub organization_id: String,
    pub business_unit_id: String,
    /// 0-based, contiguous within the shipment
    pub sequence: i32,
    pub status: MoveStatus,
    pub loaded: bool,
    /// Miles; persisted whenever the move is inserted or its stop-set changes
    pub distance: Option<Decimal>,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,

    // ---- eager-loaded children (not columns) ----
    #[sqlx(skip)]
    #[serde(default)]
    pub assignment: Option<Assignment>,
    #[sqlx(skip)]
    #[serde(default)]
    pub stops: Vec<Stop>,
}

impl ShipmentMove {
    /// Whether an assignment may still be created for this move.
    pub fn is_assignable(&self) -> bool {
        matches!(self.status, MoveStatus::New | MoveStatus::Assigned)
    }

    /// The attached assignment, ignoring canceled ones.
    pub fn active_assignment(&self) -> Option<&Assignment> {
        self.assignment
            .as_ref()
            .filter(|a| !matches!(a.status, super::AssignmentStatus::Canceled))
    }
}
