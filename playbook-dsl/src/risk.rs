//! Position sizing and SL/TP price resolution (§4.4 "risk model"): turns a fired [`ActionKind`]
//! into a sized [`Signal`], reading whatever feature/structure the Play's stop rule names off the
//! evaluation [`Snapshot`].

use playbook_instrument::snapshot::Snapshot;
use playbook_instrument::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A stop-loss/take-profit price rule, resolved against the current [`Snapshot`] at signal time.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopRule {
    /// A fixed percentage distance from the entry price.
    FixedPct { pct: f64 },
    /// A multiple of an ATR-family feature's current value.
    AtrMultiple { atr_feature_id: SmolStr, multiple: f64 },
    /// A named structure field (e.g. a swing low, a zone boundary) read as an absolute price.
    StructureLevel { struct_key: SmolStr, field: SmolStr },
}

impl StopRule {
    /// Resolve this rule to an absolute price on the losing side of `entry_price` for `side`.
    /// Returns `None` if the rule's source feature/structure is missing or not ready.
    pub fn resolve(&self, entry_price: f64, side: Side, snapshot: &Snapshot) -> Option<f64> {
        match self {
            StopRule::FixedPct { pct } => {
                let delta = entry_price * pct;
                Some(match side {
                    Side::Long => entry_price - delta,
                    Side::Short => entry_price + delta,
                })
            }
            StopRule::AtrMultiple { atr_feature_id, multiple } => {
                let atr = snapshot
                    .indicator(atr_feature_id)
                    .filter(|b| b.is_ready)
                    .and_then(|b| b.field("value"))
                    .and_then(|h| h.current.as_ref())
                    .and_then(|v| v.as_f64())?;
                let delta = atr * multiple;
                Some(match side {
                    Side::Long => entry_price - delta,
                    Side::Short => entry_price + delta,
                })
            }
            StopRule::StructureLevel { struct_key, field } => snapshot
                .structure(struct_key)
                .filter(|b| b.is_ready)
                .and_then(|b| b.field(field))
                .and_then(|h| h.current.as_ref())
                .and_then(|v| v.as_f64()),
        }
    }
}

/// How a Signal's `size_usdt` is computed (§4.4 "risk model").
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SizingRule {
    /// A constant notional regardless of equity or stop distance.
    FixedUsdt { amount: Decimal },
    /// A fixed percentage of current equity.
    PercentEquity { pct: Decimal },
    /// `risk_budget = equity * pct`; position notional scales inversely with the stop's
    /// percentage distance from entry so the stop, if hit, loses exactly `risk_budget`.
    RiskPercent { pct: Decimal },
}

/// A Play's full risk model: sizing plus optional SL/TP rules (§3 Signal, §4.4).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RiskModel {
    pub sizing: SizingRule,
    #[serde(default)]
    pub stop_loss: Option<StopRule>,
    #[serde(default)]
    pub take_profit: Option<StopRule>,
    /// Max-drawdown circuit breaker, stored as a percent (e.g. `25.0` = 25%, §6 "Percent fields").
    /// When set, the engine force-closes all positions and halts once
    /// `equity < initial_equity * (1 - max_drawdown_pct / 100)` (§4.5 point 4). `None` disables
    /// the gate.
    #[serde(default)]
    pub max_drawdown_pct: Option<Decimal>,
}

impl RiskModel {
    /// Size a position's notional in USDT given current equity, the entry price and a resolved
    /// stop price (required for `risk_percent`, ignored otherwise).
    pub fn size_usdt(&self, equity_usdt: Decimal, entry_price: f64, stop_price: Option<f64>) -> Decimal {
        match &self.sizing {
            SizingRule::FixedUsdt { amount } => *amount,
            SizingRule::PercentEquity { pct } => equity_usdt * *pct / Decimal::from(100),
            SizingRule::RiskPercent { pct } => {
                let risk_budget = equity_usdt * *pct / Decimal::from(100);
                match stop_price {
                    Some(stop) if entry_price > 0.0 && (entry_price - stop).abs() > f64::EPSILON => {
                        let stop_distance_pct = (entry_price - stop).abs() / entry_price;
                        match Decimal::try_from(stop_distance_pct) {
                            Ok(d) if !d.is_zero() => risk_budget / d,
                            _ => risk_budget,
                        }
                    }
                    _ => risk_budget,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fixed_usdt_ignores_equity() {
        let model = RiskModel {
            sizing: SizingRule::FixedUsdt { amount: dec!(250) },
            stop_loss: None,
            take_profit: None,
            max_drawdown_pct: None,
        };
        assert_eq!(model.size_usdt(dec!(10000), 100.0, None), dec!(250));
    }

    #[test]
    fn percent_equity_scales_with_equity() {
        let model = RiskModel {
            sizing: SizingRule::PercentEquity { pct: dec!(10) },
            stop_loss: None,
            take_profit: None,
            max_drawdown_pct: None,
        };
        assert_eq!(model.size_usdt(dec!(1000), 100.0, None), dec!(100));
    }

    #[test]
    fn risk_percent_scales_inversely_with_stop_distance() {
        let model = RiskModel {
            sizing: SizingRule::RiskPercent { pct: dec!(1) },
            stop_loss: None,
            take_profit: None,
            max_drawdown_pct: None,
        };
        // 1% risk budget on 10_000 equity = 100 USDT; a 2% stop distance means the notional must
        // be 50x the risk budget for a stop hit to lose exactly 100 USDT.
        let size = model.size_usdt(dec!(10000), 100.0, Some(98.0));
        assert_eq!(size, dec!(5000));
    }

    #[test]
    fn fixed_pct_stop_rule_resolves_below_entry_for_longs() {
        use playbook_instrument::Candle;
        use std::collections::HashMap;

        let candle = Candle::new(0, 60_000, 100.0, 101.0, 99.0, 100.5, 10.0, 1).unwrap();
        let snapshot = Snapshot {
            minute_candle: candle,
            exec_candle: candle,
            ts_open: 0,
            ts_close: 60_000,
            exec_index: 0,
            last_price: 100.5,
            mark_price: 100.4,
            indicators: HashMap::new(),
            structures: HashMap::new(),
        };
        let rule = StopRule::FixedPct { pct: 0.02 };
        let stop = rule.resolve(100.0, Side::Long, &snapshot).unwrap();
        assert_eq!(stop, 98.0);
    }
}
