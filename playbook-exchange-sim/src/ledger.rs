//! Ledger invariants and margin math for the USDT-linear isolated-margin account (§3, §4.6).
//!
//! [`playbook_instrument::LedgerState`] already carries the four balances and their invariant
//! check; this module adds the margin arithmetic that keeps them in sync as positions open,
//! resize and close, and a tolerance wrapper so accumulated `Decimal` rounding noise across many
//! bars doesn't spuriously trip the exact identities.

use crate::error::SimExchangeError;
use playbook_instrument::LedgerState;
use rust_decimal::Decimal;

/// The tolerance §8's invariant checks are evaluated under: Decimal arithmetic is exact per
/// operation, but a multi-year backtest chains enough of them that a tiny absolute slack (well
/// below a cent) absorbs compounding rounding without masking a real invariant break.
pub const INVARIANT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 8);

/// `used_margin = position_notional * (1 / leverage)` (§3 Ledger state invariant).
pub fn margin_for_notional(notional: Decimal, leverage: Decimal) -> Decimal {
    notional / leverage
}

/// Recompute the ledger's derived fields and assert its invariants hold (§3, §8), within
/// [`INVARIANT_TOLERANCE`].
pub fn recompute_and_check(ledger: &mut LedgerState) -> Result<(), SimExchangeError> {
    ledger.recompute();
    ledger
        .check_invariants(INVARIANT_TOLERANCE)
        .map_err(SimExchangeError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn margin_scales_inversely_with_leverage() {
        assert_eq!(margin_for_notional(dec!(10_000), dec!(10)), dec!(1_000));
        assert_eq!(margin_for_notional(dec!(10_000), dec!(1)), dec!(10_000));
    }

    #[test]
    fn recompute_and_check_accepts_a_consistent_ledger() {
        let mut ledger = LedgerState {
            cash_balance: dec!(1000),
            unrealized_pnl: dec!(50),
            used_margin: dec!(200),
            ..Default::default()
        };
        recompute_and_check(&mut ledger).unwrap();
        assert_eq!(ledger.equity, dec!(1050));
    }
}
