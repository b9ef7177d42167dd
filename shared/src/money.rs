//! Money helpers using rust_decimal for precision
//!
//! All monetary amounts are `Decimal` end-to-end (stored as NUMERIC(19,4));
//! binary floating point is never used for money. Calculations round to
//! 4 decimal places, half away from zero.

use rust_decimal::prelude::*;

/// Monetary precision (matches NUMERIC(19,4) storage)
pub const MONEY_DP: u32 = 4;

/// Round a monetary value to storage precision.
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Clamp a monetary value to be non-negative, then round.
#[inline]
pub fn non_negative(value: Decimal) -> Decimal {
    round_money(value.max(Decimal::ZERO))
}

/// Treat `None` as zero for nullable monetary columns.
#[inline]
pub fn or_zero(value: Option<Decimal>) -> Decimal {
    value.unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_money(d("1.00005")), d("1.0001"));
        assert_eq!(round_money(d("-1.00005")), d("-1.0001"));
    }

    #[test]
    fn non_negative_floors_at_zero() {
        assert_eq!(non_negative(d("-3.5")), Decimal::ZERO);
        assert_eq!(non_negative(d("3.5")), d("3.5000"));
    }

    #[test]
    fn or_zero_handles_null() {
        assert_eq!(or_zero(None), Decimal::ZERO);
        assert_eq!(or_zero(Some(d("2"))), d("2"));
    }
}
