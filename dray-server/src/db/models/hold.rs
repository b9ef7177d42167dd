//! Shipment hold and hold-reason models

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::types::Timestamp;

/// Hold severity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "hold_severity", rename_all = "snake_case")]
pub enum HoldSeverity {
    #[default]
    Informational,
    Advisory,
    Blocking,
}

/// Where a hold originated
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "hold_source", rename_all = "snake_case")]
pub enum HoldSource {
    #[default]
    User,
    System,
    Automation,
}

/// A named, possibly-blocking predicate attached to a shipment.
///
/// Active iff `released_at` is unset. The four blocking flags are
/// independent of each other and of the state machine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShipmentHold {
    pub id: String,
    pub shipment_id: String,
    pub organization_id: String,
    pub business_unit_id: String,
    pub reason_code: String,
    pub hold_type: String,
    pub severity: HoldSeverity,
    pub source: HoldSource,
    pub blocks_dispatch: bool,
    pub blocks_delivery: bool,
    pub blocks_billing: bool,
    pub visible_to_customer: bool,
    pub started_at: Timestamp,
    pub released_at: Option<Timestamp>,
    pub released_by_id: Option<String>,
    pub notes: String,
    /// Propagated verbatim from the reason's external_map
    #[sqlx(json)]
    pub metadata: Value,
    pub created_by_id: String,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ShipmentHold {
    /// A hold is active until it is released.
    pub fn is_active(&self) -> bool {
        self.released_at.is_none()
    }
}

/// Tenant-scoped hold reason catalog entry.
///
/// Defaults seed new holds; explicit overrides in the hold request take
/// precedence. `external_map` flows verbatim into the hold's metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct HoldReason {
    pub id: String,
    pub organization_id: String,
    pub business_unit_id: String,
    /// Unique per tenant
    pub code: String,
    pub label: String,
    pub default_severity: HoldSeverity,
    pub default_blocks_dispatch: bool,
    pub default_blocks_delivery: bool,
    pub default_blocks_billing: bool,
    pub default_visible_to_customer: bool,
    #[sqlx(json)]
    pub external_map: Value,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
