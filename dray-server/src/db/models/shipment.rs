//! Shipment root aggregate model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::types::Timestamp;

use super::charge::AdditionalCharge;
use super::comment::ShipmentComment;
use super::commodity::ShipmentCommodity;
use super::hold::ShipmentHold;
use super::shipment_move::ShipmentMove;

/// Shipment lifecycle status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "shipment_status", rename_all = "snake_case")]
pub enum ShipmentStatus {
    #[default]
    New,
    PartiallyAssigned,
    Assigned,
    InTransit,
    Delayed,
    PartiallyCompleted,
    Completed,
    ReadyToBill,
    ReviewRequired,
    Billed,
    Canceled,
}

impl ShipmentStatus {
    /// Terminal states admit no transitions out.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Billed | Self::Canceled)
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::PartiallyAssigned => "PARTIALLY_ASSIGNED",
            Self::Assigned => "ASSIGNED",
            Self::InTransit => "IN_TRANSIT",
            Self::Delayed => "DELAYED",
            Self::PartiallyCompleted => "PARTIALLY_COMPLETED",
            Self::Completed => "COMPLETED",
            Self::ReadyToBill => "READY_TO_BILL",
            Self::ReviewRequired => "REVIEW_REQUIRED",
            Self::Billed => "BILLED",
            Self::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}

/// How the freight (base) charge is derived
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "rating_method", rename_all = "snake_case")]
pub enum RatingMethod {
    #[default]
    FlatRate,
    PerMile,
    PerStop,
    PerPound,
    PerPallet,
    PerLinearFoot,
    Other,
    FormulaTemplate,
}

/// Shipment root entity
///
/// Children (`moves`, `commodities`, `additional_charges`, `holds`,
/// `comments`) are populated by the repository's eager loads and are never
/// read from the root row itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Shipment {
    pub id: String,
    pub organization_id: String,
    pub business_unit_id: String,
    /// Tenant-unique, server-assigned
    pub pro_number: String,
    pub status: ShipmentStatus,
    /// Bill-of-lading free text
    pub bol: String,
    pub customer_id: String,
    pub service_type_id: String,
    pub shipment_type_id: String,
    pub tractor_type_id: Option<String>,
    pub trailer_type_id: Option<String>,
    pub rating_method: RatingMethod,
    pub rating_unit: i64,
    pub freight_charge_amount: Option<Decimal>,
    pub other_charge_amount: Option<Decimal>,
    pub total_charge_amount: Option<Decimal>,
    pub weight: Option<i64>,
    pub pieces: Option<i64>,
    pub temperature_min: Option<Decimal>,
    pub temperature_max: Option<Decimal>,
    pub formula_template_id: Option<String>,
    pub owner_id: Option<String>,
    /// Billing flag: may only be set once the shipment is Completed
    pub ready_to_bill: bool,
    /// Derived: first origin stop's actual departure
    pub actual_ship_date: Option<Timestamp>,
    /// Derived: last destination stop's actual arrival
    pub actual_delivery_date: Option<Timestamp>,
    pub canceled_at: Option<Timestamp>,
    pub canceled_by_id: Option<String>,
    pub cancel_reason: Option<String>,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,

    // ---- eager-loaded children (not columns) ----
    #[sqlx(skip)]
    #[serde(default)]
    pub moves: Vec<ShipmentMove>,
    #[sqlx(skip)]
    #[serde(default)]
    pub commodities: Vec<ShipmentCommodity>,
    #[sqlx(skip)]
    #[serde(default)]
    pub additional_charges: Vec<AdditionalCharge>,
    #[sqlx(skip)]
    #[serde(default)]
    pub holds: Vec<ShipmentHold>,
    #[sqlx(skip)]
    #[serde(default)]
    pub comments: Vec<ShipmentComment>,
}

impl Shipment {
    /// Total stop count across all moves (used by PerStop rating).
    pub fn total_stops(&self) -> usize {
        self.moves.iter().map(|m| m.stops.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ShipmentStatus::Billed.is_terminal());
        assert!(ShipmentStatus::Canceled.is_terminal());
        assert!(!ShipmentStatus::Completed.is_terminal());
        assert!(!ShipmentStatus::ReadyToBill.is_terminal());
    }

    #[test]
    fn status_wire_form() {
        let json = serde_json::to_string(&ShipmentStatus::ReadyToBill).unwrap();
        assert_eq!(json, "\"READY_TO_BILL\"");
    }
}
