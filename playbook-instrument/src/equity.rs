use rust_decimal::Decimal;
use serde::Serialize;

/// One exec-bar sample of the equity curve (§3 EquityPoint).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub ts: i64,
    pub equity: Decimal,
    pub cash: Decimal,
    pub unrealized: Decimal,
    pub used_margin: Decimal,
}
