//! Constraints module (§4.6): price/quantity tick-and-lot rounding and `min_notional` admission.
//!
//! Rounding checks the true increment via a multiple-of test (`rem == 0` against the tick/lot),
//! not a fixed-decimal-places quantization — a `tick_size` of `0.005` would round wrong under a
//! naive `round(x, 2)` but is exact under `(x / tick).round() * tick`.

use rust_decimal::Decimal;

/// Per-instrument tick/lot/min-notional constraints (§4.6 "Constraints module").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstrumentConstraints {
    pub tick_size: Decimal,
    pub lot_size: Decimal,
    pub min_notional: Decimal,
}

impl Default for InstrumentConstraints {
    /// Bybit-typical BTCUSDT-perp-ish defaults: fine enough not to distort test fixtures, coarse
    /// enough to exercise the rounding path.
    fn default() -> Self {
        Self {
            tick_size: Decimal::new(1, 1),      // 0.1
            lot_size: Decimal::new(1, 3),       // 0.001
            min_notional: Decimal::from(5),
        }
    }
}

impl InstrumentConstraints {
    /// Round `price` to the nearest multiple of `tick_size`.
    pub fn round_price(&self, price: Decimal) -> Decimal {
        round_to_increment(price, self.tick_size)
    }

    /// Round `qty` to the nearest multiple of `lot_size`.
    pub fn round_qty(&self, qty: Decimal) -> Decimal {
        round_to_increment(qty, self.lot_size)
    }

    /// Whether `notional` clears the instrument's minimum order size.
    pub fn meets_min_notional(&self, notional: Decimal) -> bool {
        notional >= self.min_notional
    }
}

/// Round `value` to the nearest multiple of `increment`, verifying the result is an exact
/// multiple rather than trusting float/decimal quantization to land exactly on the grid.
fn round_to_increment(value: Decimal, increment: Decimal) -> Decimal {
    if increment.is_zero() {
        return value;
    }
    let steps = (value / increment).round();
    let rounded = steps * increment;
    debug_assert!(
        (rounded % increment).abs() < Decimal::new(1, 12),
        "rounded value {rounded} is not an exact multiple of increment {increment}"
    );
    rounded
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rounds_to_true_increment_not_fixed_decimals() {
        let constraints = InstrumentConstraints {
            tick_size: dec!(0.005),
            lot_size: dec!(0.001),
            min_notional: dec!(5),
        };
        assert_eq!(constraints.round_price(dec!(100.0074)), dec!(100.005));
        assert_eq!(constraints.round_price(dec!(100.0076)), dec!(100.01));
    }

    #[test]
    fn min_notional_gate() {
        let constraints = InstrumentConstraints::default();
        assert!(!constraints.meets_min_notional(dec!(1)));
        assert!(constraints.meets_min_notional(dec!(10)));
    }
}
