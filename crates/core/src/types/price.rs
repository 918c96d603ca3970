//! Amount helpers using decimal arithmetic.
//!
//! Totals and subtotals travel as JSON numbers but are held as
//! [`Decimal`] so estimates like `19.99 * 3` stay exact.

use rust_decimal::{Decimal, RoundingStrategy};

/// Estimated subtotal for a line: `unit_price * quantity`.
#[must_use]
pub fn line_subtotal(unit_price: Decimal, quantity: u32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Format an amount with two decimals and an optional currency suffix.
///
/// ```
/// use cartsync_core::format_amount;
/// use rust_decimal::Decimal;
///
/// assert_eq!(format_amount(Decimal::new(5997, 2), "zł"), "59.97 zł");
/// assert_eq!(format_amount(Decimal::new(5, 0), ""), "5.00");
/// ```
#[must_use]
pub fn format_amount(amount: Decimal, currency_suffix: &str) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    if currency_suffix.is_empty() {
        format!("{rounded:.2}")
    } else {
        format!("{rounded:.2} {currency_suffix}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_subtotal() {
        assert_eq!(
            line_subtotal(Decimal::new(1999, 2), 3),
            Decimal::new(5997, 2)
        );
        assert_eq!(line_subtotal(Decimal::new(1999, 2), 0), Decimal::ZERO);
    }

    #[test]
    fn test_format_amount_rounds_half_up() {
        assert_eq!(format_amount(Decimal::new(10005, 3), ""), "10.01");
    }
}
