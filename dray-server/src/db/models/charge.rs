//! Additional (accessorial) charge model

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::types::Timestamp;

/// How an additional charge amount is applied
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "additional_charge_method", rename_all = "snake_case")]
pub enum AdditionalChargeMethod {
    #[default]
    Flat,
    Distance,
    Percentage,
}

/// An accessorial charge layered on top of the base freight charge.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdditionalCharge {
    pub id: String,
    pub shipment_id: String,
    pub organization_id: String,
    pub business_unit_id: String,
    pub accessorial_charge_id: String,
    pub method: AdditionalChargeMethod,
    pub amount: Decimal,
    /// Defaults to 1 for Flat
    pub unit: i16,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
