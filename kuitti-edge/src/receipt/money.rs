//! Money arithmetic using rust_decimal
//!
//! Receipt amounts are stored as `f64` (they travel as JSON), but every sum
//! is computed in `Decimal` and rounded once.

use rust_decimal::prelude::*;

/// 2 decimal places, half away from zero
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Convert f64 to Decimal; NaN and infinities become zero
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// Equal within 0.01
pub fn money_eq(a: f64, b: f64) -> bool {
    within_tolerance(to_decimal(a), to_decimal(b))
}

/// Strictly closer than 0.01
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < MONEY_TOLERANCE
}

/// Finnish receipt format: `12,50 €`
pub fn format_eur(value: f64) -> String {
    let rounded =
        to_decimal(value).round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2} €", rounded).replace('.', ",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_eur() {
        assert_eq!(format_eur(12.5), "12,50 €");
        assert_eq!(format_eur(0.0), "0,00 €");
        assert_eq!(format_eur(-2.0), "-2,00 €");
        assert_eq!(format_eur(7.999), "8,00 €");
    }

    #[test]
    fn test_money_eq_tolerance() {
        assert!(money_eq(10.0, 10.009));
        assert!(!money_eq(10.0, 10.02));
        assert!(money_eq(0.1 + 0.2, 0.3));
    }

    #[test]
    fn test_to_f64_rounds_half_away_from_zero() {
        assert_eq!(to_f64(Decimal::new(1235, 3)), 1.24);
        assert_eq!(to_f64(Decimal::new(-1235, 3)), -1.24);
        assert_eq!(to_decimal(f64::NAN), Decimal::ZERO);
    }
}
