//! Pricing module (§4.6): `mark_price`, `last_price`, `mid`, `spread`, and the deterministic
//! intrabar path used for order triggering.

use playbook_instrument::Candle;

/// Where `mark_price` is sourced from. Default per spec §4.6 is the close of the last 1m bar;
/// `Mid` is carried for venues/configs that quote a separate index/mark feed (not exercised by
/// any surveyed Play, kept because the config surface names it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarkPriceSource {
    #[default]
    LastClose,
    Mid,
}

/// A quote snapshot derived from one closed 1m candle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub last_price: f64,
    pub mark_price: f64,
    pub mid: f64,
    pub spread: f64,
}

/// Derive this bar's quote. Without a live order book the simulated exchange has no independent
/// bid/ask, so `mid == last_price` and `spread == 0.0`; `mark_price` follows the configured
/// source (§4.6).
pub fn quote_from_candle(candle: &Candle, source: MarkPriceSource) -> Quote {
    let last_price = candle.close;
    let mark_price = match source {
        MarkPriceSource::LastClose => candle.close,
        MarkPriceSource::Mid => candle.hlc3(),
    };
    Quote {
        last_price,
        mark_price,
        mid: last_price,
        spread: 0.0,
    }
}

/// The deterministic intrabar price path this bar visits, for SL/TP trigger checks (§4.6):
/// bullish bars visit `open -> low -> high -> close`, bearish `open -> high -> low -> close`.
pub fn intrabar_path(candle: &Candle) -> [f64; 4] {
    candle.intrabar_path()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_price_defaults_to_last_close() {
        let candle = Candle::new(0, 60_000, 100.0, 101.0, 99.0, 100.5, 10.0, 1).unwrap();
        let quote = quote_from_candle(&candle, MarkPriceSource::LastClose);
        assert_eq!(quote.mark_price, 100.5);
        assert_eq!(quote.last_price, 100.5);
        assert_eq!(quote.spread, 0.0);
    }
}
