//! Hold gating predicates and hold seeding

use serde::Serialize;
use shared::error::ErrorCode;
use shared::ids::{self, IdPrefix};
use shared::types::Timestamp;

use crate::db::models::{HoldReason, HoldSeverity, HoldSource, ShipmentHold, ShipmentStatus};
use crate::services::hold::HoldShipmentRequest;

/// The three gates computed from a shipment's active holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HoldGates {
    pub blocks_dispatch: bool,
    pub blocks_delivery: bool,
    pub blocks_billing: bool,
}

impl HoldGates {
    /// Compute the gates from the shipment's holds, counting only active ones.
    pub fn from_holds(holds: &[ShipmentHold]) -> Self {
        let mut gates = Self::default();
        for hold in holds.iter().filter(|h| h.is_active()) {
            gates.blocks_dispatch |= hold.blocks_dispatch;
            gates.blocks_delivery |= hold.blocks_delivery;
            gates.blocks_billing |= hold.blocks_billing;
        }
        gates
    }

    /// Whether an active hold forbids transitioning into `target`.
    ///
    /// Dispatch holds gate InTransit, delivery holds gate Completed, and
    /// billing holds gate ReadyToBill/Billed. Returns the error code of the
    /// violated gate.
    pub fn deny_for(&self, target: ShipmentStatus) -> Option<ErrorCode> {
        match target {
            ShipmentStatus::InTransit if self.blocks_dispatch => {
                Some(ErrorCode::DispatchBlocked)
            }
            ShipmentStatus::Completed if self.blocks_delivery => {
                Some(ErrorCode::DeliveryBlocked)
            }
            ShipmentStatus::ReadyToBill | ShipmentStatus::Billed if self.blocks_billing => {
                Some(ErrorCode::BillingBlocked)
            }
            _ => None,
        }
    }
}

/// Build a hold from its reason's defaults plus request overrides.
///
/// Explicit overrides in the request take precedence; the reason's
/// `external_map` flows verbatim into the hold's metadata.
pub fn seed_from_reason(
    reason: &HoldReason,
    req: &HoldShipmentRequest,
    now: Timestamp,
) -> ShipmentHold {
    ShipmentHold {
        id: ids::generate(IdPrefix::ShipmentHold),
        shipment_id: req.shipment_id.clone(),
        organization_id: req.tenant.organization_id.clone(),
        business_unit_id: req.tenant.business_unit_id.clone(),
        reason_code: reason.code.clone(),
        hold_type: req.hold_type.clone(),
        severity: req.severity.unwrap_or(reason.default_severity),
        source: HoldSource::User,
        blocks_dispatch: req.blocks_dispatch.unwrap_or(reason.default_blocks_dispatch),
        blocks_delivery: req.blocks_delivery.unwrap_or(reason.default_blocks_delivery),
        blocks_billing: req.blocks_billing.unwrap_or(reason.default_blocks_billing),
        visible_to_customer: req
            .visible_to_customer
            .unwrap_or(reason.default_visible_to_customer),
        started_at: now,
        released_at: None,
        released_by_id: None,
        notes: req.notes.clone(),
        metadata: reason.external_map.clone(),
        created_by_id: req.user_id.clone(),
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

/// Blocking severity requires at least one blocks flag.
pub fn validate_severity_rule(hold: &ShipmentHold) -> Result<(), ErrorCode> {
    if hold.severity == HoldSeverity::Blocking
        && !(hold.blocks_dispatch || hold.blocks_delivery || hold.blocks_billing)
    {
        return Err(ErrorCode::HoldSeverityRule);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::types::TenantScope;

    fn hold(active: bool, dispatch: bool, delivery: bool, billing: bool) -> ShipmentHold {
        ShipmentHold {
            released_at: if active { None } else { Some(100) },
            blocks_dispatch: dispatch,
            blocks_delivery: delivery,
            blocks_billing: billing,
            ..ShipmentHold::default()
        }
    }

    #[test]
    fn released_holds_do_not_gate() {
        let gates = HoldGates::from_holds(&[hold(false, true, true, true)]);
        assert_eq!(gates, HoldGates::default());
    }

    #[test]
    fn gates_union_across_active_holds() {
        let gates = HoldGates::from_holds(&[
            hold(true, true, false, false),
            hold(true, false, false, true),
        ]);
        assert!(gates.blocks_dispatch);
        assert!(!gates.blocks_delivery);
        assert!(gates.blocks_billing);
    }

    #[test]
    fn deny_for_maps_targets_to_gates() {
        let gates = HoldGates {
            blocks_dispatch: true,
            blocks_delivery: true,
            blocks_billing: true,
        };
        assert_eq!(
            gates.deny_for(ShipmentStatus::InTransit),
            Some(ErrorCode::DispatchBlocked)
        );
        assert_eq!(
            gates.deny_for(ShipmentStatus::Completed),
            Some(ErrorCode::DeliveryBlocked)
        );
        assert_eq!(
            gates.deny_for(ShipmentStatus::ReadyToBill),
            Some(ErrorCode::BillingBlocked)
        );
        assert_eq!(
            gates.deny_for(ShipmentStatus::Billed),
            Some(ErrorCode::BillingBlocked)
        );
        // partial completion is never gated
        assert_eq!(gates.deny_for(ShipmentStatus::PartiallyCompleted), None);
    }

    #[test]
    fn seed_applies_defaults_then_overrides() {
        let reason = HoldReason {
            code: "CUST_CREDIT".into(),
            label: "Customer credit hold".into(),
            default_severity: HoldSeverity::Blocking,
            default_blocks_dispatch: true,
            default_blocks_billing: true,
            external_map: serde_json::json!({"sap_code": "C-17"}),
            ..HoldReason::default()
        };
        let req = HoldShipmentRequest {
            shipment_id: "shp_x".into(),
            reason_code: "CUST_CREDIT".into(),
            hold_type: "credit".into(),
            severity: None,
            blocks_dispatch: Some(false),
            blocks_delivery: None,
            blocks_billing: None,
            visible_to_customer: None,
            notes: "pending finance review".into(),
            user_id: "wrk_1".into(),
            tenant: TenantScope::new("org_1", "bu_1"),
        };
        let hold = seed_from_reason(&reason, &req, 1_000);

        assert_eq!(hold.severity, HoldSeverity::Blocking);
        assert!(!hold.blocks_dispatch); // override wins
        assert!(hold.blocks_billing); // default survives
        assert_eq!(hold.metadata["sap_code"], "C-17");
        assert_eq!(hold.started_at, 1_000);
        assert!(hold.is_active());
    }

    #[test]
    fn blocking_severity_needs_a_flag() {
        let mut h = hold(true, false, false, false);
        h.severity = HoldSeverity::Blocking;
        assert_eq!(validate_severity_rule(&h), Err(ErrorCode::HoldSeverityRule));
        h.blocks_delivery = true;
        assert!(validate_severity_rule(&h).is_ok());
    }
}
