use crate::error::InstrumentError;
use serde::{Deserialize, Serialize};

/// A closed OHLCV candle in UTC epoch milliseconds.
///
/// Candles are never mutated after construction; the historical store (backtest) or closed-bar
/// detector (live) is responsible for producing a finished [`Candle`] only once its interval has
/// elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Candle {
    pub ts_open: i64,
    pub ts_close: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Construct a [`Candle`], validating the invariants from the data model (§3):
    /// `ts_close = ts_open + tf_minutes*60_000`, `high >= low`, `high >= open, close`,
    /// `low <= open, close`, `volume >= 0`.
    pub fn new(
        ts_open: i64,
        ts_close: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        tf_minutes: u32,
    ) -> Result<Self, InstrumentError> {
        let candle = Self {
            ts_open,
            ts_close,
            open,
            high,
            low,
            close,
            volume,
        };
        candle.validate(tf_minutes)?;
        Ok(candle)
    }

    /// Re-check this candle's invariants against a given timeframe width.
    pub fn validate(&self, tf_minutes: u32) -> Result<(), InstrumentError> {
        let expected_close = self.ts_open + i64::from(tf_minutes) * 60_000;
        if self.ts_close != expected_close {
            return Err(InstrumentError::InvalidCandle(format!(
                "ts_close {} != ts_open {} + tf_minutes*60_000 ({})",
                self.ts_close, self.ts_open, expected_close
            )));
        }
        if self.high < self.low {
            return Err(InstrumentError::InvalidCandle(format!(
                "high {} < low {}",
                self.high, self.low
            )));
        }
        if self.high < self.open || self.high < self.close {
            return Err(InstrumentError::InvalidCandle(format!(
                "high {} below open/close ({}, {})",
                self.high, self.open, self.close
            )));
        }
        if self.low > self.open || self.low > self.close {
            return Err(InstrumentError::InvalidCandle(format!(
                "low {} above open/close ({}, {})",
                self.low, self.open, self.close
            )));
        }
        if self.volume < 0.0 {
            return Err(InstrumentError::InvalidCandle(format!(
                "negative volume {}",
                self.volume
            )));
        }
        if !self.open.is_finite()
            || !self.high.is_finite()
            || !self.low.is_finite()
            || !self.close.is_finite()
            || !self.volume.is_finite()
        {
            return Err(InstrumentError::InvalidCandle(
                "non-finite OHLCV field".into(),
            ));
        }
        Ok(())
    }

    /// True iff `close >= open` — the bullish/bearish split that drives the simulated exchange's
    /// intrabar path (§4.6).
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    /// `(high + low + close) / 3`.
    pub fn hlc3(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// `(open + high + low + close) / 4`.
    pub fn ohlc4(&self) -> f64 {
        (self.open + self.high + self.low + self.close) / 4.0
    }

    /// The deterministic intrabar price path used for order triggering (§4.6): bullish bars visit
    /// `open -> low -> high -> close`, bearish bars visit `open -> high -> low -> close`.
    pub fn intrabar_path(&self) -> [f64; 4] {
        if self.is_bullish() {
            [self.open, self.low, self.high, self.close]
        } else {
            [self.open, self.high, self.low, self.close]
        }
    }

    /// Read a named price source (§4.2 `input_source`) off this candle.
    pub fn input(&self, source: InputSource) -> f64 {
        match source {
            InputSource::Close => self.close,
            InputSource::Open => self.open,
            InputSource::High => self.high,
            InputSource::Low => self.low,
            InputSource::Volume => self.volume,
            InputSource::Hlc3 => self.hlc3(),
            InputSource::Ohlc4 => self.ohlc4(),
        }
    }
}

/// Price/volume source an indicator reads its input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Close,
    Open,
    High,
    Low,
    Volume,
    Hlc3,
    Ohlc4,
}

impl Default for InputSource {
    fn default() -> Self {
        InputSource::Close
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_close_boundary() {
        let err = Candle::new(0, 120_000, 1.0, 1.0, 1.0, 1.0, 1.0, 1).unwrap_err();
        assert!(matches!(err, InstrumentError::InvalidCandle(_)));
    }

    #[test]
    fn rejects_high_below_close() {
        let err = Candle::new(0, 60_000, 1.0, 1.0, 0.5, 2.0, 1.0, 1).unwrap_err();
        assert!(matches!(err, InstrumentError::InvalidCandle(_)));
    }

    #[test]
    fn accepts_well_formed_candle() {
        let c = Candle::new(0, 60_000, 100.0, 105.0, 95.0, 102.0, 10.0, 1).unwrap();
        assert!(c.is_bullish());
        assert_eq!(c.intrabar_path(), [100.0, 95.0, 105.0, 102.0]);
    }

    #[test]
    fn bearish_intrabar_path_visits_high_before_low() {
        let c = Candle::new(0, 60_000, 100.0, 106.0, 94.0, 99.0, 10.0, 1).unwrap();
        assert!(!c.is_bullish());
        assert_eq!(c.intrabar_path(), [100.0, 106.0, 94.0, 99.0]);
    }
}
