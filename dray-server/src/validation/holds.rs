//! Hold validation rules

use crate::core::error::{MultiError, ValidationCode};
use crate::db::models::ShipmentHold;
use crate::holds::registry::validate_severity_rule;

use super::engine::{Priority, Rule, RulePipeline, Stage, ValidationContext};
use super::text::{MAX_NAME_LEN, MAX_NOTE_LEN, cap_text, require_text};

/// Build the hold pipeline.
pub fn pipeline() -> RulePipeline<ShipmentHold> {
    RulePipeline::new(vec![
        Rule {
            name: "required_fields",
            stage: Stage::Basic,
            priority: Priority::High,
            check: required_fields,
        },
        Rule {
            name: "release_ordering",
            stage: Stage::DataIntegrity,
            priority: Priority::High,
            check: release_ordering,
        },
        Rule {
            name: "severity_rule",
            stage: Stage::BusinessRules,
            priority: Priority::High,
            check: severity_rule,
        },
    ])
}

fn required_fields(_ctx: &ValidationContext<'_>, hold: &ShipmentHold, multi: &mut MultiError) {
    require_text(&hold.shipment_id, "shipmentId", MAX_NAME_LEN, multi);
    require_text(&hold.reason_code, "reasonCode", MAX_NAME_LEN, multi);
    cap_text(&hold.notes, "notes", MAX_NOTE_LEN, multi);
}

fn release_ordering(_ctx: &ValidationContext<'_>, hold: &ShipmentHold, multi: &mut MultiError) {
    if let Some(released) = hold.released_at
        && released < hold.started_at
    {
        multi.add(
            "releasedAt",
            ValidationCode::Invalid,
            "release precedes the hold start",
        );
    }
}

fn severity_rule(_ctx: &ValidationContext<'_>, hold: &ShipmentHold, multi: &mut MultiError) {
    if validate_severity_rule(hold).is_err() {
        multi.add(
            "severity",
            ValidationCode::Invalid,
            "blocking severity requires at least one blocks flag",
        );
    }
}
