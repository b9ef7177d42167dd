//! Per-tenant shipment control settings

use serde::{Deserialize, Serialize};
use shared::types::Timestamp;

/// Tenant-level switches consulted by the aggregate repository.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShipmentControl {
    pub organization_id: String,
    pub business_unit_id: String,
    /// Gates deletion of moves during an aggregate update
    pub allow_move_removals: bool,
    /// Enables the duplicate-BOL advisory check on create/update
    pub check_for_duplicate_bols: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Default for ShipmentControl {
    fn default() -> Self {
        Self {
            organization_id: String::new(),
            business_unit_id: String::new(),
            allow_move_removals: true,
            check_for_duplicate_bols: true,
            created_at: 0,
            updated_at: 0,
        }
    }
}
