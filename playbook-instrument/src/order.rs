use crate::side::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Order type (§3 Order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
    StopLimit,
}

/// An exchange-bound instruction produced by sizing a [`Signal`](crate::signal::Signal) (§3 Order).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: SmolStr,
    pub symbol: SmolStr,
    pub side: Side,
    pub size_usdt: Decimal,
    pub order_type: OrderType,
    pub reduce_only: bool,
    pub tp_price: Option<f64>,
    pub sl_price: Option<f64>,
    pub ts: i64,
}
