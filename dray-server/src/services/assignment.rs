//! Assignment service
//!
//! Attaches tractor + driver (+ trailer) to a move. Single assignment,
//! reassignment over an existing row, and all-or-nothing bulk assignment
//! for a set of moves within one shipment. Every successful write runs the
//! coordinator on the owning shipment so the move and root pick up their
//! derived statuses (move → Assigned, shipment → Assigned/PartiallyAssigned).

use shared::ids::{self, IdPrefix};
use shared::types::TenantScope;
use shared::util::now_secs;

use crate::core::error::{ServiceError, ServiceResult};
use crate::db::models::{Assignment, AssignmentStatus, MoveStatus, ShipmentControl};
use crate::db::repository::{AssignmentRepository, ShipmentRepository};
use crate::holds::HoldGates;
use crate::statemachine;
use crate::validation::assignment::AssignmentInput;
use crate::validation::{self, ValidationContext};

#[derive(Clone)]
pub struct AssignmentService {
    assignments: AssignmentRepository,
    shipments: ShipmentRepository,
}

impl AssignmentService {
    pub fn new(assignments: AssignmentRepository, shipments: ShipmentRepository) -> Self {
        Self {
            assignments,
            shipments,
        }
    }

    /// Attach a fresh assignment to a move.
    pub async fn single_assign(
        &self,
        tenant: &TenantScope,
        mut assignment: Assignment,
    ) -> ServiceResult<Assignment> {
        let now = now_secs();
        let mv = self
            .assignments
            .find_move(tenant, &assignment.shipment_move_id)
            .await?;

        self.validate(tenant, &assignment, &mv, false).await?;

        assignment.id = ids::generate(IdPrefix::Assignment);
        assignment.organization_id = tenant.organization_id.clone();
        assignment.business_unit_id = tenant.business_unit_id.clone();
        assignment.status = AssignmentStatus::New;
        assignment.version = 0;
        assignment.created_at = now;
        assignment.updated_at = now;
        self.assignments.insert(&assignment).await?;

        self.recompute_owning_shipment(tenant, &mv.shipment_id).await?;
        Ok(assignment)
    }

    /// Replace the workers/equipment on an existing assignment.
    pub async fn reassign(
        &self,
        tenant: &TenantScope,
        mut assignment: Assignment,
    ) -> ServiceResult<Assignment> {
        let now = now_secs();
        let mv = self
            .assignments
            .find_move(tenant, &assignment.shipment_move_id)
            .await?;

        self.validate(tenant, &assignment, &mv, true).await?;

        assignment.updated_at = now;
        let updated = self.assignments.update(&assignment).await?;

        self.recompute_owning_shipment(tenant, &mv.shipment_id).await?;
        Ok(updated)
    }

    /// Atomic per-move assignment for a set of moves within one shipment:
    /// every candidate validates before anything is written.
    pub async fn bulk_assign(
        &self,
        tenant: &TenantScope,
        assignments: Vec<Assignment>,
    ) -> ServiceResult<Vec<Assignment>> {
        let now = now_secs();
        let mut shipment_id: Option<String> = None;
        let mut prepared = Vec::with_capacity(assignments.len());

        // validate all-or-nothing before the first write
        for mut assignment in assignments {
            let mv = self
                .assignments
                .find_move(tenant, &assignment.shipment_move_id)
                .await?;
            match &shipment_id {
                None => shipment_id = Some(mv.shipment_id.clone()),
                Some(existing) if *existing != mv.shipment_id => {
                    return Err(ServiceError::App(shared::error::AppError::validation(
                        "bulk assignment spans more than one shipment",
                    )));
                }
                Some(_) => {}
            }
            self.validate(tenant, &assignment, &mv, false).await?;

            assignment.id = ids::generate(IdPrefix::Assignment);
            assignment.organization_id = tenant.organization_id.clone();
            assignment.business_unit_id = tenant.business_unit_id.clone();
            assignment.status = AssignmentStatus::New;
            assignment.version = 0;
            assignment.created_at = now;
            assignment.updated_at = now;
            prepared.push(assignment);
        }

        for assignment in &prepared {
            self.assignments.insert(assignment).await?;
        }
        if let Some(id) = shipment_id {
            self.recompute_owning_shipment(tenant, &id).await?;
        }
        Ok(prepared)
    }

    async fn validate(
        &self,
        tenant: &TenantScope,
        assignment: &Assignment,
        mv: &crate::db::models::ShipmentMove,
        reassignment: bool,
    ) -> ServiceResult<()> {
        let now = now_secs();
        let shipment = self.shipments.get(tenant, &mv.shipment_id).await?;
        let gates = HoldGates::from_holds(&shipment.holds);

        let input = AssignmentInput {
            assignment: assignment.clone(),
            move_status: mv.status,
            has_other_active_assignment: mv
                .active_assignment()
                .is_some_and(|existing| !reassignment || existing.id != assignment.id),
        };
        let control = ShipmentControl::default();
        let ctx = ValidationContext::new(now, &control).with_gates(gates);
        validation::assignment::pipeline()
            .evaluate(&ctx, &input)
            .map_err(ServiceError::Validation)
    }

    /// Run the coordinator over the owning shipment and persist whatever
    /// statuses it derived (target move and root).
    async fn recompute_owning_shipment(
        &self,
        tenant: &TenantScope,
        shipment_id: &str,
    ) -> ServiceResult<()> {
        let now = now_secs();
        let mut shipment = self.shipments.get(tenant, shipment_id).await?;
        let gates = HoldGates::from_holds(&shipment.holds);

        let moves_before: Vec<(String, MoveStatus)> = shipment
            .moves
            .iter()
            .map(|m| (m.id.clone(), m.status))
            .collect();
        let root_before = shipment.status;
        let root_version = shipment.version;

        statemachine::recompute(&mut shipment, &gates, now).map_err(ServiceError::Validation)?;

        for (mv, (id, before)) in shipment.moves.iter().zip(&moves_before) {
            if mv.status != *before {
                self.assignments
                    .update_move_status(tenant, id, mv.status, now)
                    .await?;
            }
        }
        if shipment.status != root_before {
            self.shipments
                .set_derived_status(tenant, shipment_id, root_version, shipment.status, now)
                .await?;
        }
        Ok(())
    }
}
