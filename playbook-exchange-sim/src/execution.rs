//! Execution module (§4.6): slippage, a liquidity cap, a linear impact model, and maker/taker
//! fee application. Limit TP exits pay maker fees and receive no market-order slippage; every
//! other fill (entries, SL, liquidation, signal exits, force-close) is a market order.

use playbook_instrument::{AccountConfig, Side};
use rust_decimal::Decimal;

/// Basis-point offset applied against the trader on market fills (§4.6 "Execution module").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlippageModel {
    pub bps: Decimal,
}

impl SlippageModel {
    pub fn none() -> Self {
        Self { bps: Decimal::ZERO }
    }

    /// Offset `price` against the trader: longs buy/cover higher, shorts sell/cover lower.
    /// `is_closing` flips the direction since closing a long is a sell (pushed down) and closing
    /// a short is a buy (pushed up).
    pub fn apply(&self, price: Decimal, side: Side, is_closing: bool) -> Decimal {
        let buy_pressure = match (side, is_closing) {
            (Side::Long, false) | (Side::Short, true) => true,
            (Side::Short, false) | (Side::Long, true) => false,
        };
        let offset = price * self.bps / Decimal::from(10_000);
        if buy_pressure {
            price + offset
        } else {
            price - offset
        }
    }
}

/// Caps a single fill's notional to a configured percentage of the bar's traded volume (§4.6
/// "liquidity cap: max % of bar volume per fill").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LiquidityCap {
    pub max_pct_of_bar_volume: Decimal,
}

impl LiquidityCap {
    pub fn unbounded() -> Self {
        Self {
            max_pct_of_bar_volume: Decimal::MAX,
        }
    }

    /// Cap `requested_notional` to `max_pct_of_bar_volume * bar_volume_notional`, leaving the
    /// remainder for the caller to decide how to handle (reject, partial-fill, or retry next
    /// bar — the simulated exchange here always partial-fills down to the cap).
    pub fn cap(&self, requested_notional: Decimal, bar_volume_notional: Decimal) -> Decimal {
        let ceiling = bar_volume_notional * self.max_pct_of_bar_volume;
        requested_notional.min(ceiling)
    }
}

/// Linear market-impact model: a fill consuming `fraction` of the liquidity cap's ceiling moves
/// the fill price by `fraction * impact_bps` basis points in the trader's disfavor, on top of
/// slippage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpactModel {
    pub impact_bps: Decimal,
}

impl ImpactModel {
    pub fn none() -> Self {
        Self {
            impact_bps: Decimal::ZERO,
        }
    }

    pub fn apply(&self, price: Decimal, side: Side, is_closing: bool, fill_fraction: Decimal) -> Decimal {
        let slippage = SlippageModel {
            bps: self.impact_bps * fill_fraction,
        };
        slippage.apply(price, side, is_closing)
    }
}

/// Which fee rate a fill pays: `Taker` for market fills (entries, SL, liquidation, signal/force
/// exits), `Maker` for resting limit fills (TP).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeKind {
    Maker,
    Taker,
}

pub fn fee_for(account: &AccountConfig, kind: FeeKind, notional: Decimal) -> Decimal {
    let rate = match kind {
        FeeKind::Maker => account.fee_model.maker,
        FeeKind::Taker => account.fee_model.taker,
    };
    notional * rate
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn slippage_pushes_long_entries_up_and_short_entries_down() {
        let model = SlippageModel { bps: dec!(10) };
        assert_eq!(model.apply(dec!(100), Side::Long, false), dec!(100.1));
        assert_eq!(model.apply(dec!(100), Side::Short, false), dec!(99.9));
    }

    #[test]
    fn liquidity_cap_limits_fill_to_volume_ceiling() {
        let cap = LiquidityCap {
            max_pct_of_bar_volume: dec!(0.1),
        };
        assert_eq!(cap.cap(dec!(500), dec!(1000)), dec!(100));
        assert_eq!(cap.cap(dec!(50), dec!(1000)), dec!(50));
    }
}
