//! Location and distance-override models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::types::Timestamp;

/// A physical location referenced by stops.
///
/// Coordinates are optional; segments missing coordinates are skipped by
/// the distance calculator with a warning.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct Location {
    pub id: String,
    pub organization_id: String,
    pub business_unit_id: String,
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Location {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Tenant-scoped distance override for an exact (origin, destination) pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize, sqlx::FromRow)]
pub struct DistanceOverride {
    pub id: String,
    pub organization_id: String,
    pub business_unit_id: String,
    pub origin_location_id: String,
    pub destination_location_id: String,
    /// Miles
    pub distance: Decimal,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
