//! MACD (§4.2): fast/slow EMA spread plus a signal-line EMA of the spread.

use crate::core::{Indicator, IndicatorOutput};
use crate::trend::Ema;
use playbook_instrument::Candle;

/// `{macd, signal, histogram}`. `is_ready` iff the slow EMA and the signal EMA (seeded from the
/// macd line once the slow EMA is ready) are both ready.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    pub fn new(fast_length: usize, slow_length: usize, signal_length: usize) -> Self {
        assert!(
            fast_length < slow_length,
            "MACD fast length must be shorter than slow length"
        );
        Self {
            fast: Ema::new(fast_length),
            slow: Ema::new(slow_length),
            signal: Ema::new(signal_length),
        }
    }
}

impl Indicator for Macd {
    fn update(&mut self, candle: &Candle, input: f64) {
        self.fast.update(candle, input);
        self.slow.update(candle, input);
        if self.slow.is_ready() {
            let macd_line = self.fast.raw_value().unwrap_or(f64::NAN) - self.slow.raw_value().unwrap();
            self.signal.update(candle, macd_line);
        }
    }

    fn value(&self) -> IndicatorOutput {
        if !self.slow.is_ready() {
            return IndicatorOutput::Multi(vec![
                ("macd", f64::NAN),
                ("signal", f64::NAN),
                ("histogram", f64::NAN),
            ]);
        }
        let macd_line = self.fast.raw_value().unwrap() - self.slow.raw_value().unwrap();
        let signal = self.signal.raw_value().unwrap_or(f64::NAN);
        IndicatorOutput::Multi(vec![
            ("macd", macd_line),
            ("signal", signal),
            ("histogram", macd_line - signal),
        ])
    }

    fn is_ready(&self) -> bool {
        self.slow.is_ready() && self.signal.is_ready()
    }

    fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
        self.signal.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64, close: f64) -> Candle {
        Candle::new(ts, ts + 60_000, close, close, close, close, 1.0, 1).unwrap()
    }

    #[test]
    fn macd_not_ready_until_signal_line_seeds() {
        let mut macd = Macd::new(2, 3, 2);
        for i in 0..3 {
            macd.update(&candle(i * 60_000, 10.0 + i as f64), 10.0 + i as f64);
        }
        assert!(!macd.is_ready());
        macd.update(&candle(3 * 60_000, 13.0), 13.0);
        assert!(macd.is_ready());
    }

    #[test]
    fn macd_histogram_is_macd_minus_signal() {
        let mut macd = Macd::new(2, 3, 2);
        for i in 0..6 {
            macd.update(&candle(i * 60_000, 10.0 + i as f64), 10.0 + i as f64);
        }
        let out = macd.value();
        let diff = out.field("macd").unwrap() - out.field("signal").unwrap();
        assert!((out.field("histogram").unwrap() - diff).abs() < 1e-9);
    }
}
