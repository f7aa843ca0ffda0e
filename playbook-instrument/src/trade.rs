use crate::side::Side;
use rust_decimal::Decimal;
use serde::Serialize;

/// Why a [`Trade`] closed (§3 Trade, §8 exit-reason scenarios).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Sl,
    Tp,
    Signal,
    Liquidation,
    ForceClose,
    EndOfData,
}

/// An immutable record of one completed round trip (§3 Trade).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub entry_ts: i64,
    pub entry_price: Decimal,
    pub exit_ts: i64,
    pub exit_price: Decimal,
    pub side: Side,
    pub size_usdt: Decimal,
    pub realized_pnl: Decimal,
    pub fees: Decimal,
    pub funding: Decimal,
    pub mae_pct: Decimal,
    pub mfe_pct: Decimal,
    pub exit_reason: ExitReason,
}

impl Trade {
    /// Net PnL after fees and funding — the quantity §8's invariant sums across closed trades.
    pub fn net_pnl(&self) -> Decimal {
        self.realized_pnl - self.fees + self.funding
    }
}
