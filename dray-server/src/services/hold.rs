//! Hold service
//!
//! Applying a hold seeds it from its reason's defaults (request overrides
//! win), stamps `started_at`, and records the requesting user. Releasing
//! stamps the release pair and emits a `HoldReleased` notification to the
//! shipment owner; notification failures are logged, never surfaced.

use std::sync::Arc;

use async_trait::async_trait;

use shared::events::HoldReleasedNotice;
use shared::types::TenantScope;
use shared::util::now_secs;

use crate::core::error::ServiceResult;
use crate::db::models::{HoldSeverity, ShipmentHold};
use crate::db::repository::{HoldRepository, ShipmentRepository};
use crate::holds::seed_from_reason;
use crate::validation::{self, ValidationContext};
use crate::db::models::ShipmentControl;

/// Hold application request.
#[derive(Debug, Clone)]
pub struct HoldShipmentRequest {
    pub shipment_id: String,
    pub reason_code: String,
    pub hold_type: String,
    /// Overrides the reason's default severity when set
    pub severity: Option<HoldSeverity>,
    pub blocks_dispatch: Option<bool>,
    pub blocks_delivery: Option<bool>,
    pub blocks_billing: Option<bool>,
    pub visible_to_customer: Option<bool>,
    pub notes: String,
    pub user_id: String,
    pub tenant: TenantScope,
}

/// Downstream notification sink. Delivery itself lives outside the engine.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn hold_released(&self, notice: &HoldReleasedNotice) -> anyhow::Result<()>;
}

/// Default sink: structured log only.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn hold_released(&self, notice: &HoldReleasedNotice) -> anyhow::Result<()> {
        tracing::info!(
            shipment_id = %notice.shipment_id,
            hold_id = %notice.hold_id,
            owner = notice.owner_id.as_deref().unwrap_or("-"),
            "hold released"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct HoldService {
    holds: HoldRepository,
    shipments: ShipmentRepository,
    notifier: Arc<dyn Notifier>,
}

impl HoldService {
    pub fn new(
        holds: HoldRepository,
        shipments: ShipmentRepository,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            holds,
            shipments,
            notifier,
        }
    }

    /// Apply a hold to a shipment.
    pub async fn hold_shipment(&self, req: HoldShipmentRequest) -> ServiceResult<ShipmentHold> {
        let now = now_secs();

        // the shipment must exist in-tenant before anything is seeded
        let _ = self.shipments.get(&req.tenant, &req.shipment_id).await?;

        let reason = self.holds.find_reason(&req.tenant, &req.reason_code).await?;
        let hold = seed_from_reason(&reason, &req, now);

        let control = ShipmentControl::default();
        let ctx = ValidationContext::new(now, &control);
        validation::holds::pipeline().evaluate(&ctx, &hold)?;

        self.holds.insert(&hold).await?;
        tracing::info!(
            shipment_id = %hold.shipment_id,
            reason = %hold.reason_code,
            severity = ?hold.severity,
            "hold applied"
        );
        Ok(hold)
    }

    /// Release a hold and notify the shipment owner.
    pub async fn release_hold(
        &self,
        tenant: &TenantScope,
        hold_id: &str,
        user_id: &str,
    ) -> ServiceResult<ShipmentHold> {
        let now = now_secs();
        let released = self.holds.release(tenant, hold_id, user_id, now).await?;

        let owner_id = match self.shipments.get(tenant, &released.shipment_id).await {
            Ok(shipment) => shipment.owner_id,
            Err(err) => {
                tracing::warn!(error = %err, "owner lookup failed for hold notice");
                None
            }
        };
        let notice = HoldReleasedNotice {
            shipment_id: released.shipment_id.clone(),
            hold_id: released.id.clone(),
            reason_code: released.reason_code.clone(),
            owner_id,
            released_by_id: user_id.to_string(),
            tenant: tenant.clone(),
            timestamp: now,
        };
        if let Err(err) = self.notifier.hold_released(&notice).await {
            // downstream failures never fail the release
            tracing::warn!(error = %err, hold_id, "hold-released notification failed");
        }
        Ok(released)
    }
}
