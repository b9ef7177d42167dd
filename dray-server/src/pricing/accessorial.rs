//! Additional (accessorial) charge totaling

use rust_decimal::Decimal;
use shared::money::non_negative;

use crate::db::models::{AdditionalCharge, AdditionalChargeMethod};

/// Amount contributed by a single additional charge.
///
/// - `Flat`: `amount × max(unit, 1)`
/// - `Distance`: `amount × unit`
/// - `Percentage`: `(amount / 100) × base`
pub fn amount_for(charge: &AdditionalCharge, base: Decimal) -> Decimal {
    match charge.method {
        AdditionalChargeMethod::Flat => {
            charge.amount * Decimal::from(charge.unit.max(1))
        }
        AdditionalChargeMethod::Distance => charge.amount * Decimal::from(charge.unit),
        AdditionalChargeMethod::Percentage => charge.amount / Decimal::ONE_HUNDRED * base,
    }
}

/// Total of all additional charges against the given base charge.
pub fn total(charges: &[AdditionalCharge], base: Decimal) -> Decimal {
    let sum: Decimal = charges.iter().map(|c| amount_for(c, base)).sum();
    non_negative(sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn charge(method: AdditionalChargeMethod, amount: &str, unit: i16) -> AdditionalCharge {
        AdditionalCharge {
            method,
            amount: d(amount),
            unit,
            ..AdditionalCharge::default()
        }
    }

    #[test]
    fn flat_defaults_unit_to_one() {
        let c = charge(AdditionalChargeMethod::Flat, "50", 0);
        assert_eq!(amount_for(&c, Decimal::ZERO), d("50"));
        let c = charge(AdditionalChargeMethod::Flat, "50", 3);
        assert_eq!(amount_for(&c, Decimal::ZERO), d("150"));
    }

    #[test]
    fn distance_multiplies_unit() {
        let c = charge(AdditionalChargeMethod::Distance, "1.5", 200);
        assert_eq!(amount_for(&c, Decimal::ZERO), d("300.0"));
    }

    #[test]
    fn percentage_applies_to_base() {
        // 10% of a 1000 base, unit ignored
        let c = charge(AdditionalChargeMethod::Percentage, "10", 7);
        assert_eq!(amount_for(&c, d("1000")), d("100"));
    }

    #[test]
    fn total_sums_mixed_methods() {
        let charges = vec![
            charge(AdditionalChargeMethod::Flat, "25", 2),
            charge(AdditionalChargeMethod::Percentage, "10", 1),
        ];
        assert_eq!(total(&charges, d("1000")), d("150.0000"));
    }

    #[test]
    fn empty_charges_total_zero() {
        assert_eq!(total(&[], d("1000")), Decimal::ZERO);
    }
}
