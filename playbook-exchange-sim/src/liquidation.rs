//! Liquidation module (§4.6): bankruptcy price under Bybit's isolated-margin formula (including
//! the taker fee-to-close) and the mark-update liquidation check.
//!
//! §9 Open Question resolution: the source double-deducts the liquidation fee on one path; this
//! implementation deducts it exactly once, at the moment the position is force-closed at the
//! bankruptcy price.

use playbook_instrument::Side;
use rust_decimal::Decimal;

/// The price at which a position's isolated margin is fully exhausted: `equity_0 +
/// unrealized_pnl(P) - maintenance_margin(P) - taker_fee_to_close(P) == 0`, solved for `P`.
///
/// * Long: `entry * (1 - 1/leverage) / (1 - mmr - taker_fee)`
/// * Short: `entry * (1 + 1/leverage) / (1 + mmr + taker_fee)`
pub fn bankruptcy_price(
    entry_price: Decimal,
    side: Side,
    leverage: Decimal,
    maintenance_margin_rate: Decimal,
    taker_fee_rate: Decimal,
) -> Decimal {
    let one = Decimal::ONE;
    match side {
        Side::Long => {
            let numerator = entry_price * (one - one / leverage);
            let denominator = one - maintenance_margin_rate - taker_fee_rate;
            numerator / denominator
        }
        Side::Short => {
            let numerator = entry_price * (one + one / leverage);
            let denominator = one + maintenance_margin_rate + taker_fee_rate;
            numerator / denominator
        }
    }
}

/// Maintenance margin owed on a position at the given mark price.
pub fn maintenance_margin(notional_at_mark: Decimal, maintenance_margin_rate: Decimal) -> Decimal {
    notional_at_mark * maintenance_margin_rate
}

/// Whether a position is liquidatable at the current mark: `equity - maintenance_margin <= 0`
/// (§4.6 "Liquidation module").
pub fn is_liquidatable(equity: Decimal, maintenance_margin: Decimal) -> bool {
    equity - maintenance_margin <= Decimal::ZERO
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn matches_scenario_4_bankruptcy_price() {
        // §8 scenario 4: equity 1000, leverage 10, long 10,000 notional at 100, MMR 0.5%.
        let price = bankruptcy_price(dec!(100), Side::Long, dec!(10), dec!(0.005), dec!(0.0006));
        assert!(
            (price - dec!(90.51)).abs() < dec!(0.05),
            "expected ~90.5x, got {price}"
        );
    }

    #[test]
    fn liquidatable_when_maintenance_margin_exceeds_equity() {
        assert!(is_liquidatable(dec!(10), dec!(10)));
        assert!(is_liquidatable(dec!(5), dec!(10)));
        assert!(!is_liquidatable(dec!(11), dec!(10)));
    }
}
