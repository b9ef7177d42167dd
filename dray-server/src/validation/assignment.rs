//! Assignment validation rules

use crate::core::error::{MultiError, ValidationCode};
use crate::db::models::{Assignment, MoveStatus};

use super::engine::{Priority, Rule, RulePipeline, Stage, ValidationContext};
use super::text::{MAX_NAME_LEN, require_text};

/// Everything the assignment rules need: the candidate row plus facts about
/// the target move, resolved by the service beforehand.
pub struct AssignmentInput {
    pub assignment: Assignment,
    pub move_status: MoveStatus,
    /// Whether the move already carries a non-canceled assignment that is
    /// not the one being written (reassignment passes its own id through).
    pub has_other_active_assignment: bool,
}

/// Build the assignment pipeline.
pub fn pipeline() -> RulePipeline<AssignmentInput> {
    RulePipeline::new(vec![
        Rule {
            name: "required_fields",
            stage: Stage::Basic,
            priority: Priority::High,
            check: required_fields,
        },
        Rule {
            name: "move_assignable",
            stage: Stage::BusinessRules,
            priority: Priority::High,
            check: move_assignable,
        },
        Rule {
            name: "single_active_assignment",
            stage: Stage::BusinessRules,
            priority: Priority::High,
            check: single_active_assignment,
        },
        Rule {
            name: "dispatch_gate",
            stage: Stage::BusinessRules,
            priority: Priority::High,
            check: dispatch_gate,
        },
    ])
}

fn required_fields(_ctx: &ValidationContext<'_>, input: &AssignmentInput, multi: &mut MultiError) {
    let a = &input.assignment;
    require_text(&a.primary_worker_id, "primaryWorkerId", MAX_NAME_LEN, multi);
    require_text(&a.tractor_id, "tractorId", MAX_NAME_LEN, multi);
    require_text(&a.shipment_move_id, "shipmentMoveId", MAX_NAME_LEN, multi);
}

fn move_assignable(_ctx: &ValidationContext<'_>, input: &AssignmentInput, multi: &mut MultiError) {
    if !matches!(input.move_status, MoveStatus::New | MoveStatus::Assigned) {
        multi.add(
            "shipmentMoveId",
            ValidationCode::Invalid,
            format!("cannot assign to a {} move", input.move_status),
        );
    }
}

fn single_active_assignment(
    _ctx: &ValidationContext<'_>,
    input: &AssignmentInput,
    multi: &mut MultiError,
) {
    if input.has_other_active_assignment {
        multi.add(
            "shipmentMoveId",
            ValidationCode::AlreadyExists,
            "move already has an active assignment",
        );
    }
}

fn dispatch_gate(ctx: &ValidationContext<'_>, _input: &AssignmentInput, multi: &mut MultiError) {
    if ctx.gates.blocks_dispatch {
        multi.add(
            "shipmentMoveId",
            ValidationCode::Invalid,
            "shipment is blocked from dispatch by an active hold",
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ShipmentControl;
    use crate::holds::HoldGates;

    fn input(move_status: MoveStatus) -> AssignmentInput {
        AssignmentInput {
            assignment: Assignment {
                shipment_move_id: "smv_1".into(),
                primary_worker_id: "wrk_1".into(),
                tractor_id: "trk_1".into(),
                ..Assignment::default()
            },
            move_status,
            has_other_active_assignment: false,
        }
    }

    #[test]
    fn assignable_states_pass() {
        let control = ShipmentControl::default();
        let ctx = ValidationContext::new(0, &control);
        pipeline().evaluate(&ctx, &input(MoveStatus::New)).unwrap();
        pipeline().evaluate(&ctx, &input(MoveStatus::Assigned)).unwrap();
    }

    #[test]
    fn completed_move_rejects_assignment() {
        let control = ShipmentControl::default();
        let ctx = ValidationContext::new(0, &control);
        let err = pipeline()
            .evaluate(&ctx, &input(MoveStatus::Completed))
            .unwrap_err();
        assert!(err.errors[0].message.contains("COMPLETED"));
    }

    #[test]
    fn dispatch_hold_blocks_assignment() {
        let control = ShipmentControl::default();
        let ctx = ValidationContext::new(0, &control).with_gates(HoldGates {
            blocks_dispatch: true,
            ..HoldGates::default()
        });
        let err = pipeline().evaluate(&ctx, &input(MoveStatus::New)).unwrap_err();
        assert!(err.errors[0].message.contains("blocked from dispatch"));
    }

    #[test]
    fn second_active_assignment_rejected() {
        let control = ShipmentControl::default();
        let ctx = ValidationContext::new(0, &control);
        let mut i = input(MoveStatus::Assigned);
        i.has_other_active_assignment = true;
        let err = pipeline().evaluate(&ctx, &i).unwrap_err();
        assert_eq!(err.errors[0].code, ValidationCode::AlreadyExists);
    }

    #[test]
    fn missing_worker_and_tractor_flagged() {
        let control = ShipmentControl::default();
        let ctx = ValidationContext::new(0, &control);
        let mut i = input(MoveStatus::New);
        i.assignment.primary_worker_id = String::new();
        i.assignment.tractor_id = String::new();
        let err = pipeline().evaluate(&ctx, &i).unwrap_err();
        assert_eq!(err.len(), 2);
    }
}
