//! Base charge calculation
//!
//! The base charge switches on the shipment's rating method; additional
//! charges (accessorial.rs) are layered on top. Before charging, the
//! shipment's commodity totals are recomputed so weight- and piece-based
//! methods rate against current lines.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use shared::money::{non_negative, or_zero};

use crate::db::models::{RatingMethod, Shipment};

use super::accessorial;
use super::formula::FormulaOracle;

/// Charge calculator with a pluggable formula oracle.
pub struct ChargeCalculator {
    oracle: Arc<dyn FormulaOracle>,
}

impl ChargeCalculator {
    pub fn new(oracle: Arc<dyn FormulaOracle>) -> Self {
        Self { oracle }
    }

    /// Recompute commodity totals, the base charge, the additional-charge
    /// total, and the grand total, writing the charge fields in place.
    ///
    /// Never fails: oracle errors and degenerate inputs rate as zero with a
    /// warning.
    pub async fn calculate(&self, shipment: &mut Shipment, principal_id: &str) {
        recompute_commodity_totals(shipment);

        let base = self.base_charge(shipment, principal_id).await;
        let additional = accessorial::total(&shipment.additional_charges, base);

        shipment.other_charge_amount = Some(additional);
        shipment.total_charge_amount = Some(non_negative(base + additional));
    }

    /// Base charge per the rating-method table.
    async fn base_charge(&self, shipment: &Shipment, principal_id: &str) -> Decimal {
        let unit = Decimal::from(shipment.rating_unit);
        let freight = or_zero(shipment.freight_charge_amount);

        let base = match shipment.rating_method {
            RatingMethod::FlatRate => freight,
            RatingMethod::PerMile | RatingMethod::Other => unit * freight,
            RatingMethod::PerStop => unit * Decimal::from(shipment.total_stops() as u64),
            RatingMethod::PerPound => match shipment.weight {
                Some(w) if w > 0 => unit * Decimal::from(w),
                _ => Decimal::ZERO,
            },
            RatingMethod::PerPallet => match shipment.pieces {
                Some(p) if p > 0 => unit * Decimal::from(p),
                _ => Decimal::ZERO,
            },
            RatingMethod::PerLinearFoot => self.per_linear_foot(shipment),
            RatingMethod::FormulaTemplate => self.formula(shipment, principal_id).await,
        };
        non_negative(base)
    }

    fn per_linear_foot(&self, shipment: &Shipment) -> Decimal {
        if shipment.rating_unit == 0 {
            tracing::warn!(
                shipment_id = %shipment.id,
                "per-linear-foot rating with zero rating unit; rating as zero"
            );
            return Decimal::ZERO;
        }
        let total_feet: Decimal = shipment
            .commodities
            .iter()
            .map(|c| Decimal::from(c.pieces) * c.linear_feet_per_unit.unwrap_or(Decimal::ZERO))
            .sum();
        total_feet / Decimal::from(shipment.rating_unit)
    }

    async fn formula(&self, shipment: &Shipment, principal_id: &str) -> Decimal {
        let Some(template_id) = shipment.formula_template_id.as_deref() else {
            tracing::warn!(
                shipment_id = %shipment.id,
                "formula-rated shipment has no formula template; rating as zero"
            );
            return Decimal::ZERO;
        };
        match self
            .oracle
            .evaluate(template_id, shipment, principal_id)
            .await
        {
            Ok(amount) => amount,
            Err(err) => {
                tracing::warn!(
                    shipment_id = %shipment.id,
                    template_id,
                    error = %err,
                    "formula evaluation failed; rating as zero"
                );
                Decimal::ZERO
            }
        }
    }
}

/// Recompute `pieces` and `weight` from the commodity lines.
///
/// `pieces = Σ pieces`, `weight = Σ pieces × unit weight`; both cleared to
/// null when the shipment has no commodities.
pub fn recompute_commodity_totals(shipment: &mut Shipment) {
    if shipment.commodities.is_empty() {
        shipment.pieces = None;
        shipment.weight = None;
        return;
    }
    let pieces: i64 = shipment.commodities.iter().map(|c| c.pieces).sum();
    let weight: Decimal = shipment
        .commodities
        .iter()
        .map(|c| Decimal::from(c.pieces) * c.weight)
        .sum();
    shipment.pieces = Some(pieces);
    // stored as an integer column; round to the nearest pound
    shipment.weight = Some(weight.round().to_i64().unwrap_or(i64::MAX));
}
