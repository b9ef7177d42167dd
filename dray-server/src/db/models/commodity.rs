//! Shipment commodity model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::types::Timestamp;

/// A commodity line on a shipment.
///
/// `hazmat` and `linear_feet_per_unit` are joined in from the commodity
/// catalog on load; they are not columns of the shipment_commodities table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct ShipmentCommodity {
    pub id: String,
    pub shipment_id: String,
    pub organization_id: String,
    pub business_unit_id: String,
    pub commodity_id: String,
    /// Must be >= 1
    pub pieces: i64,
    /// Per-unit weight, >= 0
    pub weight: Decimal,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,

    // ---- joined from the commodity catalog ----
    #[sqlx(default)]
    #[serde(default)]
    pub hazmat: bool,
    #[sqlx(default)]
    #[serde(default)]
    pub linear_feet_per_unit: Option<Decimal>,
}
