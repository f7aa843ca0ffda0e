use crate::side::Side;
use rust_decimal::Decimal;
use serde::Serialize;
use smol_str::SmolStr;

/// An open position on the (simulated or live) exchange (§3 Position).
///
/// Invariant: `size_usdt >= min_trade_notional` and `size_usdt <= max_leverage * free_margin`,
/// enforced by the exchange's constraints module at order admission time, not here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub symbol: SmolStr,
    pub side: Side,
    pub size_usdt: Decimal,
    pub entry_price: Decimal,
    pub avg_entry_ts: i64,
    pub unrealized_pnl: Decimal,
    pub mark_price: Decimal,
    pub leverage: Decimal,
    pub sl_order_id: Option<SmolStr>,
    pub tp_order_id: Option<SmolStr>,
}

impl Position {
    /// Notional at current mark price, matching `size_usdt` when entry and mark agree; positions
    /// are sized in USDT notional directly so this is a passthrough unless callers want the
    /// contract-quantity form.
    pub fn notional(&self) -> Decimal {
        self.size_usdt
    }

    /// Recompute `unrealized_pnl` from a new mark price and update `mark_price` in place.
    pub fn mark_to_market(&mut self, mark_price: Decimal) {
        let price_delta = match self.side {
            Side::Long => mark_price - self.entry_price,
            Side::Short => self.entry_price - mark_price,
        };
        if self.entry_price.is_zero() {
            self.unrealized_pnl = Decimal::ZERO;
        } else {
            self.unrealized_pnl = self.size_usdt * price_delta / self.entry_price;
        }
        self.mark_price = mark_price;
    }
}
