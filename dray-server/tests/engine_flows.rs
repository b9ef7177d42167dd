//! End-to-end engine flows over the in-memory aggregate: charge
//! calculation, bottom-up state derivation, and hold gating working
//! together the way the write path composes them.

use std::sync::Arc;

use rust_decimal::Decimal;

use dray_server::db::models::{
    AdditionalCharge, AdditionalChargeMethod, Assignment, MoveStatus, RatingMethod, Shipment,
    ShipmentHold, ShipmentMove, ShipmentStatus, Stop, StopStatus, StopType,
};
use dray_server::holds::HoldGates;
use dray_server::pricing::{ChargeCalculator, NoFormulaOracle};
use dray_server::statemachine::recompute;

const NOW: i64 = 50_000_000;

fn d(s: &str) -> Decimal {
    Decimal::from_str_exact(s).unwrap()
}

fn stop(seq: i32, stop_type: StopType, planned: (i64, i64)) -> Stop {
    Stop {
        sequence: seq,
        stop_type,
        planned_arrival: planned.0,
        planned_departure: planned.1,
        ..Stop::default()
    }
}

fn linehaul_move(seq: i32) -> ShipmentMove {
    ShipmentMove {
        sequence: seq,
        stops: vec![
            stop(0, StopType::Pickup, (NOW + 100, NOW + 200)),
            stop(1, StopType::Delivery, (NOW + 300, NOW + 400)),
        ],
        ..ShipmentMove::default()
    }
}

fn per_mile_shipment() -> Shipment {
    Shipment {
        customer_id: "cust_1".into(),
        service_type_id: "st_1".into(),
        shipment_type_id: "sht_1".into(),
        rating_method: RatingMethod::PerMile,
        rating_unit: 500,
        freight_charge_amount: Some(d("2")),
        moves: vec![linehaul_move(0)],
        ..Shipment::default()
    }
}

#[tokio::test]
async fn per_mile_with_percentage_accessorial_totals() {
    let calc = ChargeCalculator::new(Arc::new(NoFormulaOracle));
    let mut shipment = per_mile_shipment();
    shipment.additional_charges = vec![AdditionalCharge {
        method: AdditionalChargeMethod::Percentage,
        amount: d("10"),
        unit: 7, // ignored for percentage charges
        ..AdditionalCharge::default()
    }];

    calc.calculate(&mut shipment, "wrk_1").await;

    assert_eq!(shipment.other_charge_amount, Some(d("100.0000")));
    assert_eq!(shipment.total_charge_amount, Some(d("1100.0000")));
}

#[tokio::test]
async fn lifecycle_walks_bottom_up_with_charges() {
    let calc = ChargeCalculator::new(Arc::new(NoFormulaOracle));
    let mut shipment = per_mile_shipment();

    // assignment attaches → move Assigned, shipment Assigned
    shipment.moves[0].assignment = Some(Assignment::default());
    calc.calculate(&mut shipment, "wrk_1").await;
    recompute(&mut shipment, &HoldGates::default(), NOW).unwrap();
    assert_eq!(shipment.moves[0].status, MoveStatus::Assigned);
    assert_eq!(shipment.status, ShipmentStatus::Assigned);

    // origin stop departs → everything in transit, ship date derived
    shipment.moves[0].stops[0].actual_arrival = Some(NOW + 110);
    shipment.moves[0].stops[0].actual_departure = Some(NOW + 150);
    recompute(&mut shipment, &HoldGates::default(), NOW).unwrap();
    assert_eq!(shipment.moves[0].stops[0].status, StopStatus::Completed);
    assert_eq!(shipment.status, ShipmentStatus::InTransit);
    assert_eq!(shipment.actual_ship_date, Some(NOW + 150));

    // destination completes → move + shipment complete, delivery date set
    shipment.moves[0].stops[1].actual_arrival = Some(NOW + 310);
    shipment.moves[0].stops[1].actual_departure = Some(NOW + 390);
    recompute(&mut shipment, &HoldGates::default(), NOW).unwrap();
    assert_eq!(shipment.moves[0].status, MoveStatus::Completed);
    assert_eq!(shipment.status, ShipmentStatus::Completed);
    assert_eq!(shipment.actual_delivery_date, Some(NOW + 310));

    // charges were untouched by the state walk
    assert_eq!(shipment.total_charge_amount, Some(d("1000.0000")));
}

#[test]
fn delivery_hold_blocks_completion_until_release() {
    let mut shipment = per_mile_shipment();
    let mut hold = ShipmentHold {
        blocks_delivery: true,
        started_at: NOW - 100,
        ..ShipmentHold::default()
    };
    shipment.holds = vec![hold.clone()];
    for st in &mut shipment.moves[0].stops {
        st.actual_arrival = Some(NOW + 10);
        st.actual_departure = Some(NOW + 20);
    }

    // active hold: stops and move complete, shipment cannot
    let gates = HoldGates::from_holds(&shipment.holds);
    let err = recompute(&mut shipment, &gates, NOW).unwrap_err();
    assert_eq!(err.errors[0].field, "status");
    assert_eq!(shipment.moves[0].status, MoveStatus::Completed);
    assert_ne!(shipment.status, ShipmentStatus::Completed);

    // released hold: the same derivation goes through
    hold.released_at = Some(NOW);
    shipment.holds = vec![hold];
    let gates = HoldGates::from_holds(&shipment.holds);
    recompute(&mut shipment, &gates, NOW).unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Completed);
}

#[test]
fn terminal_shipment_ignores_fresh_facts() {
    let mut shipment = per_mile_shipment();
    shipment.status = ShipmentStatus::Canceled;
    shipment.moves[0].status = MoveStatus::Canceled;
    for st in &mut shipment.moves[0].stops {
        st.status = StopStatus::Canceled;
        st.actual_arrival = Some(NOW);
        st.actual_departure = Some(NOW + 50);
    }

    let before = format!("{shipment:?}");
    recompute(&mut shipment, &HoldGates::default(), NOW).unwrap();
    assert_eq!(format!("{shipment:?}"), before);
}

#[test]
fn multi_move_partial_then_full_completion() {
    let mut shipment = per_mile_shipment();
    shipment.moves.push(linehaul_move(1));

    // first move completes fully
    for st in &mut shipment.moves[0].stops {
        st.actual_arrival = Some(NOW + 10);
        st.actual_departure = Some(NOW + 20);
    }
    recompute(&mut shipment, &HoldGates::default(), NOW).unwrap();
    assert_eq!(shipment.status, ShipmentStatus::PartiallyCompleted);

    // second move completes → shipment completes
    for st in &mut shipment.moves[1].stops {
        st.actual_arrival = Some(NOW + 30);
        st.actual_departure = Some(NOW + 40);
    }
    recompute(&mut shipment, &HoldGates::default(), NOW).unwrap();
    assert_eq!(shipment.status, ShipmentStatus::Completed);

    // replaying the coordinator is a fixed point
    let settled = format!("{shipment:?}");
    recompute(&mut shipment, &HoldGates::default(), NOW).unwrap();
    assert_eq!(format!("{shipment:?}"), settled);
}
