use crate::side::Side;
use rust_decimal::Decimal;
use serde::Serialize;
use smol_str::SmolStr;

/// A sized, directional trading decision handed from the risk model to the exchange (§3 Signal).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub side: Side,
    pub size_usdt: Decimal,
    pub sl_price: Option<f64>,
    pub tp_price: Option<f64>,
    pub reason: SmolStr,
    pub source_block_id: SmolStr,
}
