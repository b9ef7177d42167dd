//! Engine event types
//!
//! These types are shared between the engine core and any consumer of the
//! trigger/notification layer (job workers, notification forwarders). They
//! carry plain wire-form statuses so consumers do not need the engine's
//! database models.

use serde::{Deserialize, Serialize};

use crate::types::{TenantScope, Timestamp};

/// Lifecycle event emitted by the shipment service after a committed write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentEventKind {
    Created,
    StatusChanged,
    Completed,
    Canceled,
    Uncanceled,
    HoldApplied,
    HoldReleased,
}

impl std::fmt::Display for ShipmentEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::StatusChanged => "status_changed",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::Uncanceled => "uncanceled",
            Self::HoldApplied => "hold_applied",
            Self::HoldReleased => "hold_released",
        };
        f.write_str(s)
    }
}

/// A committed shipment lifecycle event.
///
/// `previous_status` / `new_status` are wire-form status strings; they are
/// only set for events that represent a status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentEvent {
    pub kind: ShipmentEventKind,
    pub shipment_id: String,
    pub customer_id: String,
    pub tenant: TenantScope,
    pub user_id: String,
    pub timestamp: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_status: Option<String>,
}

/// Notification emitted when a hold is released, addressed to the shipment
/// owner. Delivery is out of scope for the engine; failures downstream are
/// logged and never fail the releasing write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldReleasedNotice {
    pub shipment_id: String,
    pub hold_id: String,
    pub reason_code: String,
    /// Shipment owner to address; None when the shipment has no owner.
    pub owner_id: Option<String>,
    pub released_by_id: String,
    pub tenant: TenantScope,
    pub timestamp: Timestamp,
}
