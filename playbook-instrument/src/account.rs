use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Maker/taker fee rates, expressed as fractions (e.g. `0.0006` = 6 bps), not percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct FeeModel {
    pub maker: Decimal,
    pub taker: Decimal,
}

/// Account-level configuration carried by a Play: starting capital, max leverage and fee rates
/// (§3 Play, §6 `account{starting_equity_usdt, max_leverage, fee_model}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccountConfig {
    pub starting_equity_usdt: Decimal,
    pub max_leverage: Decimal,
    pub fee_model: FeeModel,
}
