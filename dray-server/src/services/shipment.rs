//! Shipment service
//!
//! The write path for the aggregate: permission checks live in the
//! handlers; this layer runs validation, charge/state recomputation, the
//! repository transaction, and the post-commit triggers.

use std::sync::Arc;

use shared::error::ErrorCode;
use shared::events::{ShipmentEvent, ShipmentEventKind};
use shared::types::TenantScope;
use shared::util::now_secs;

use crate::core::error::{ServiceError, ServiceResult};
use crate::db::models::{Shipment, ShipmentStatus};
use crate::db::repository::shipment::{
    BolDuplicate, DelayedShipment, DuplicateRequest, build_duplicates,
};
use crate::db::repository::{
    ControlRepository, HoldRepository, ProNumberSequence, ShipmentRepository,
};
use crate::holds::HoldGates;
use crate::jobs::ShipmentTriggers;
use crate::pricing::ChargeCalculator;
use crate::statemachine::{self, shipment as shipment_machine, Attempt, ShipmentEvent as MachineEvent};
use crate::validation::{self, ValidationContext};

#[derive(Clone)]
pub struct ShipmentService {
    repo: ShipmentRepository,
    controls: ControlRepository,
    sequence: ProNumberSequence,
    holds: HoldRepository,
    calculator: Arc<ChargeCalculator>,
    triggers: ShipmentTriggers,
}

impl ShipmentService {
    pub fn new(
        repo: ShipmentRepository,
        controls: ControlRepository,
        sequence: ProNumberSequence,
        holds: HoldRepository,
        calculator: Arc<ChargeCalculator>,
        triggers: ShipmentTriggers,
    ) -> Self {
        Self {
            repo,
            controls,
            sequence,
            holds,
            calculator,
            triggers,
        }
    }

    pub async fn get(&self, tenant: &TenantScope, id: &str) -> ServiceResult<Shipment> {
        Ok(self.repo.get(tenant, id).await?)
    }

    /// Create a shipment: validate, assign a pro-number, rate, derive
    /// initial state, persist, fire triggers.
    pub async fn create(&self, mut shipment: Shipment, user_id: &str) -> ServiceResult<Shipment> {
        let now = now_secs();
        let tenant = TenantScope::new(&shipment.organization_id, &shipment.business_unit_id);

        shipment.status = ShipmentStatus::New;
        shipment.version = 0;

        let control = self.controls.get(&tenant).await?;
        let duplicates = self
            .repo
            .check_for_duplicate_bols(&tenant, &shipment.bol, None)
            .await?;
        let ctx = ValidationContext::new(now, &control).with_bol_duplicates(&duplicates);
        validation::shipment::pipeline().evaluate(&ctx, &shipment)?;

        shipment.pro_number = self.sequence.next(&tenant).await?;
        self.calculator.calculate(&mut shipment, user_id).await;
        // fresh shipments carry no holds yet
        statemachine::recompute_with_parallel_stops(&mut shipment, &HoldGates::default(), now)
            .await
            .map_err(ServiceError::Validation)?;

        let created = self.repo.create(shipment, now).await?;
        self.triggers
            .notify(&self.event(&created, ShipmentEventKind::Created, user_id, None))
            .await;
        Ok(created)
    }

    /// Update the aggregate. The repository transaction recomputes charges
    /// and state; this layer validates first and fires triggers after.
    pub async fn update(&self, incoming: Shipment, user_id: &str) -> ServiceResult<Shipment> {
        let now = now_secs();
        let tenant = TenantScope::new(&incoming.organization_id, &incoming.business_unit_id);

        let previous = self.repo.get(&tenant, &incoming.id).await?;
        let control = self.controls.get(&tenant).await?;
        let active_holds = self.holds.active_for_shipment(&tenant, &incoming.id).await?;
        let gates = HoldGates::from_holds(&active_holds);
        let duplicates: Vec<BolDuplicate> = self
            .repo
            .check_for_duplicate_bols(&tenant, &incoming.bol, Some(&incoming.id))
            .await?;

        let ctx = ValidationContext::new(now, &control)
            .with_gates(gates)
            .with_bol_duplicates(&duplicates);
        validation::shipment::pipeline().evaluate(&ctx, &incoming)?;

        let updated = self
            .repo
            .update(incoming, &control, &gates, &self.calculator, user_id, now)
            .await?;

        if updated.status != previous.status {
            let kind = if updated.status == ShipmentStatus::Completed {
                ShipmentEventKind::Completed
            } else {
                ShipmentEventKind::StatusChanged
            };
            self.triggers
                .notify(&self.event(&updated, kind, user_id, Some(previous.status)))
                .await;
        }
        Ok(updated)
    }

    /// Cancel with cascade; terminal shipments refuse.
    pub async fn cancel(
        &self,
        tenant: &TenantScope,
        id: &str,
        version: i64,
        user_id: &str,
        reason: &str,
    ) -> ServiceResult<()> {
        let now = now_secs();
        let previous = self.repo.get(tenant, id).await?;
        self.repo
            .cancel(tenant, id, version, user_id, reason, now)
            .await?;
        let mut canceled = previous.clone();
        canceled.status = ShipmentStatus::Canceled;
        self.triggers
            .notify(&self.event(&canceled, ShipmentEventKind::Canceled, user_id, Some(previous.status)))
            .await;
        Ok(())
    }

    /// Reverse a cancellation.
    pub async fn uncancel(
        &self,
        tenant: &TenantScope,
        id: &str,
        version: i64,
        update_appointments: bool,
        user_id: &str,
    ) -> ServiceResult<()> {
        let now = now_secs();
        let previous = self.repo.get(tenant, id).await?;
        self.repo
            .uncancel(tenant, id, version, update_appointments, now)
            .await?;
        let mut restored = previous.clone();
        restored.status = ShipmentStatus::New;
        self.triggers
            .notify(&self.event(&restored, ShipmentEventKind::Uncanceled, user_id, Some(previous.status)))
            .await;
        Ok(())
    }

    /// Duplicate a shipment `count` times in one transaction.
    pub async fn bulk_duplicate(
        &self,
        req: DuplicateRequest,
        user_id: &str,
    ) -> ServiceResult<Vec<Shipment>> {
        if req.count == 0 {
            return Err(ServiceError::App(shared::error::AppError::validation(
                "duplicate count must be at least 1",
            )));
        }
        let now = now_secs();
        let original = self.repo.get(&req.tenant, &req.shipment_id).await?;
        let pro_numbers = self.sequence.next_batch(&req.tenant, req.count).await?;
        let copies = build_duplicates(&original, &pro_numbers, &req, now);
        self.repo.insert_duplicates(&copies).await?;

        for copy in &copies {
            self.triggers
                .notify(&self.event(copy, ShipmentEventKind::Created, user_id, None))
                .await;
        }
        tracing::info!(
            original = %original.id,
            count = copies.len(),
            "shipment duplicated"
        );
        Ok(copies)
    }

    /// Completed → ReadyToBill, gated on billing holds.
    pub async fn mark_ready_to_bill(
        &self,
        tenant: &TenantScope,
        id: &str,
        user_id: &str,
    ) -> ServiceResult<Shipment> {
        self.billing_transition(tenant, id, user_id, MachineEvent::ReadyToBill, true)
            .await
    }

    /// ReadyToBill → ReviewRequired.
    pub async fn mark_review_required(
        &self,
        tenant: &TenantScope,
        id: &str,
        user_id: &str,
    ) -> ServiceResult<Shipment> {
        self.billing_transition(tenant, id, user_id, MachineEvent::ReviewRequired, true)
            .await
    }

    /// ReadyToBill / ReviewRequired → Billed (terminal).
    pub async fn mark_billed(
        &self,
        tenant: &TenantScope,
        id: &str,
        user_id: &str,
    ) -> ServiceResult<Shipment> {
        self.billing_transition(tenant, id, user_id, MachineEvent::Billed, true)
            .await
    }

    async fn billing_transition(
        &self,
        tenant: &TenantScope,
        id: &str,
        user_id: &str,
        event: MachineEvent,
        ready_flag: bool,
    ) -> ServiceResult<Shipment> {
        let now = now_secs();
        let mut shipment = self.repo.get(tenant, id).await?;
        let gates = HoldGates::from_holds(&shipment.holds);

        if let Some(code) = gates.deny_for(event.target()) {
            return Err(ServiceError::App(shared::error::AppError::business_code(
                code,
                code.message(),
            )));
        }
        let next = match shipment_machine::attempt(shipment.status, event) {
            Attempt::Moved(next) => next,
            Attempt::NoOp => return Ok(shipment),
            Attempt::Denied => {
                return Err(ServiceError::App(shared::error::AppError::business_code(
                    ErrorCode::InvalidTransition,
                    format!("cannot move a {} shipment to {}", shipment.status, event.target()),
                )));
            }
        };

        self.repo
            .set_billing_status(tenant, id, shipment.version, next, ready_flag, now)
            .await?;
        let previous = shipment.status;
        shipment.status = next;
        shipment.ready_to_bill = ready_flag;
        shipment.version += 1;

        self.triggers
            .notify(&self.event(&shipment, ShipmentEventKind::StatusChanged, user_id, Some(previous)))
            .await;
        Ok(shipment)
    }

    /// Delay sweep entry point (called by the periodic worker).
    pub async fn delay_shipments(&self) -> ServiceResult<Vec<DelayedShipment>> {
        let now = now_secs();
        let delayed = self.repo.delay_shipments(now).await?;
        if !delayed.is_empty() {
            tracing::info!(count = delayed.len(), "shipments flipped to delayed");
        }
        Ok(delayed)
    }

    pub async fn check_for_duplicate_bols(
        &self,
        tenant: &TenantScope,
        bol: &str,
        exclude_id: Option<&str>,
    ) -> ServiceResult<Vec<BolDuplicate>> {
        Ok(self
            .repo
            .check_for_duplicate_bols(tenant, bol, exclude_id)
            .await?)
    }

    /// Most-recent Billed shipments on a matching lane.
    #[allow(clippy::too_many_arguments)]
    pub async fn previous_rates(
        &self,
        tenant: &TenantScope,
        origin_location_id: &str,
        destination_location_id: &str,
        service_type_id: &str,
        shipment_type_id: &str,
        customer_id: Option<&str>,
    ) -> ServiceResult<Vec<Shipment>> {
        Ok(self
            .repo
            .previous_rates(
                tenant,
                origin_location_id,
                destination_location_id,
                service_type_id,
                shipment_type_id,
                customer_id,
            )
            .await?)
    }

    fn event(
        &self,
        shipment: &Shipment,
        kind: ShipmentEventKind,
        user_id: &str,
        previous: Option<ShipmentStatus>,
    ) -> ShipmentEvent {
        ShipmentEvent {
            kind,
            shipment_id: shipment.id.clone(),
            customer_id: shipment.customer_id.clone(),
            tenant: TenantScope::new(&shipment.organization_id, &shipment.business_unit_id),
            user_id: user_id.to_string(),
            timestamp: now_secs(),
            previous_status: previous.map(|s| s.to_string()),
            new_status: Some(shipment.status.to_string()),
        }
    }
}
