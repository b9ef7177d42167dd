//! Assignment model (tractor + driver + trailer attached to a move)

use serde::{Deserialize, Serialize};
use shared::types::Timestamp;

/// Assignment lifecycle status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "assignment_status", rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    New,
    Assigned,
    InTransit,
    Completed,
    Canceled,
}

/// The tractor + driver(+trailer) attached to a move.
///
/// A move may hold at most one non-canceled assignment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Assignment {
    pub id: String,
    pub shipment_move_id: String,
    pub organization_id: String,
    pub business_unit_id: String,
    pub primary_worker_id: String,
    pub secondary_worker_id: Option<String>,
    pub tractor_id: String,
    pub trailer_id: Option<String>,
    pub status: AssignmentStatus,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
