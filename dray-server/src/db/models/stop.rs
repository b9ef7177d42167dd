//! Stop model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::types::Timestamp;

/// Pickup / delivery classification
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "stop_type", rename_all = "snake_case")]
pub enum StopType {
    #[default]
    Pickup,
    Delivery,
    SplitPickup,
    SplitDelivery,
}

impl StopType {
    pub fn is_pickup_variant(&self) -> bool {
        matches!(self, Self::Pickup | Self::SplitPickup)
    }

    pub fn is_delivery_variant(&self) -> bool {
        matches!(self, Self::Delivery | Self::SplitDelivery)
    }
}

/// Stop lifecycle status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "stop_status", rename_all = "snake_case")]
pub enum StopStatus {
    #[default]
    New,
    InTransit,
    Completed,
    Canceled,
}

impl StopStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

impl std::fmt::Display for StopStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::InTransit => "IN_TRANSIT",
            Self::Completed => "COMPLETED",
            Self::Canceled => "CANCELED",
        };
        f.write_str(s)
    }
}

/// A physical pickup or delivery event within a move.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Stop {
    pub id: String,
    pub shipment_move_id: String,
    pub organization_id: String,
    pub business_unit_id: String,
    /// 0-based, contiguous within the move
    pub sequence: i32,
    pub stop_type: StopType,
    pub status: StopStatus,
    pub location_id: String,
    pub address_line: Option<String>,
    pub pieces: Option<i64>,
    pub weight: Option<Decimal>,
    pub planned_arrival: Timestamp,
    pub planned_departure: Timestamp,
    pub actual_arrival: Option<Timestamp>,
    pub actual_departure: Option<Timestamp>,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Stop {
    /// Whether this stop still participates in delay detection.
    pub fn is_open(&self) -> bool {
        matches!(self.status, StopStatus::New | StopStatus::InTransit)
    }
}
