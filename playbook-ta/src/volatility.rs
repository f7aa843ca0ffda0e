//! Volatility/channel indicator family (§4.2): ATR, Bollinger Bands, Keltner Channel, SuperTrend,
//! Donchian.

use crate::core::{Indicator, IndicatorOutput};
use crate::primitives::{DequeMode, MonotonicDeque, RingBuffer};
use playbook_instrument::Candle;
use std::collections::VecDeque;

/// True range of a candle against the previous close; the first bar's TR is simply its range.
fn true_range(candle: &Candle, prev_close: Option<f64>) -> f64 {
    match prev_close {
        None => candle.high - candle.low,
        Some(prev_close) => (candle.high - candle.low)
            .max((candle.high - prev_close).abs())
            .max((candle.low - prev_close).abs()),
    }
}

/// Wilder's average true range. Seeds from the SMA of the first `length` true ranges;
/// `is_ready` iff `count >= length`.
#[derive(Debug, Clone)]
pub struct Atr {
    length: usize,
    prev_close: Option<f64>,
    seed_sum: f64,
    seed_count: usize,
    value: Option<f64>,
    count: usize,
}

impl Atr {
    pub fn new(length: usize) -> Self {
        assert!(length > 0);
        Self {
            length,
            prev_close: None,
            seed_sum: 0.0,
            seed_count: 0,
            value: None,
            count: 0,
        }
    }

    pub fn raw_value(&self) -> Option<f64> {
        self.value
    }
}

impl Indicator for Atr {
    fn update(&mut self, candle: &Candle, _input: f64) {
        let tr = true_range(candle, self.prev_close);
        self.prev_close = Some(candle.close);
        self.count += 1;

        match self.value {
            None => {
                self.seed_sum += tr;
                self.seed_count += 1;
                if self.seed_count == self.length {
                    self.value = Some(self.seed_sum / self.length as f64);
                }
            }
            Some(prev) => {
                self.value = Some((prev * (self.length - 1) as f64 + tr) / self.length as f64);
            }
        }
    }

    fn value(&self) -> IndicatorOutput {
        IndicatorOutput::Scalar(self.value.unwrap_or(f64::NAN))
    }

    fn is_ready(&self) -> bool {
        self.count >= self.length
    }

    fn reset(&mut self) {
        self.prev_close = None;
        self.seed_sum = 0.0;
        self.seed_count = 0;
        self.value = None;
        self.count = 0;
    }
}

/// Bollinger Bands: SMA middle, sample-variance (`ddof=1`) bands. Catastrophic-cancellation
/// guard: negative variance clamps to zero rather than producing NaN bands.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    length: usize,
    k: f64,
    window: RingBuffer<f64>,
}

impl BollingerBands {
    pub fn new(length: usize, k: f64) -> Self {
        assert!(length >= 2, "Bollinger Bands need length >= 2 for ddof=1");
        Self {
            length,
            k,
            window: RingBuffer::new(length),
        }
    }
}

impl Indicator for BollingerBands {
    fn update(&mut self, _candle: &Candle, input: f64) {
        self.window.push(input);
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Multi(vec![
                ("lower", f64::NAN),
                ("middle", f64::NAN),
                ("upper", f64::NAN),
                ("bandwidth", f64::NAN),
                ("percent_b", f64::NAN),
            ]);
        }
        let data = self.window.to_array();
        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let variance = data.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let variance = variance.max(0.0);
        let std_dev = variance.sqrt();
        let upper = mean + self.k * std_dev;
        let lower = mean - self.k * std_dev;
        let bandwidth = if mean != 0.0 { (upper - lower) / mean } else { 0.0 };
        let last = *data.last().unwrap();
        let percent_b = if upper != lower {
            (last - lower) / (upper - lower)
        } else {
            0.5
        };
        IndicatorOutput::Multi(vec![
            ("lower", lower),
            ("middle", mean),
            ("upper", upper),
            ("bandwidth", bandwidth),
            ("percent_b", percent_b),
        ])
    }

    fn is_ready(&self) -> bool {
        self.window.count() >= self.length
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

/// Keltner Channel: EMA middle line, ATR-width bands.
#[derive(Debug, Clone)]
pub struct KeltnerChannel {
    ema: crate::trend::Ema,
    atr: Atr,
    multiplier: f64,
}

impl KeltnerChannel {
    pub fn new(length: usize, atr_length: usize, multiplier: f64) -> Self {
        Self {
            ema: crate::trend::Ema::new(length),
            atr: Atr::new(atr_length),
            multiplier,
        }
    }
}

impl Indicator for KeltnerChannel {
    fn update(&mut self, candle: &Candle, input: f64) {
        self.ema.update(candle, input);
        self.atr.update(candle, input);
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Multi(vec![
                ("lower", f64::NAN),
                ("middle", f64::NAN),
                ("upper", f64::NAN),
            ]);
        }
        let middle = self.ema.value().scalar();
        let width = self.multiplier * self.atr.raw_value().unwrap_or(f64::NAN);
        IndicatorOutput::Multi(vec![
            ("lower", middle - width),
            ("middle", middle),
            ("upper", middle + width),
        ])
    }

    fn is_ready(&self) -> bool {
        self.ema.is_ready() && self.atr.is_ready()
    }

    fn reset(&mut self) {
        self.ema.reset();
        self.atr.reset();
    }
}

/// Donchian channel: rolling high/low over `length` bars via [`MonotonicDeque`].
#[derive(Debug, Clone)]
pub struct Donchian {
    length: usize,
    highs: MonotonicDeque,
    lows: MonotonicDeque,
    index: u64,
    count: usize,
}

impl Donchian {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            highs: MonotonicDeque::new(length, DequeMode::Max),
            lows: MonotonicDeque::new(length, DequeMode::Min),
            index: 0,
            count: 0,
        }
    }
}

impl Indicator for Donchian {
    fn update(&mut self, candle: &Candle, _input: f64) {
        self.highs.push(self.index, candle.high);
        self.lows.push(self.index, candle.low);
        self.index += 1;
        self.count += 1;
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Multi(vec![
                ("upper", f64::NAN),
                ("lower", f64::NAN),
                ("middle", f64::NAN),
            ]);
        }
        let upper = self.highs.front().unwrap();
        let lower = self.lows.front().unwrap();
        IndicatorOutput::Multi(vec![
            ("upper", upper),
            ("lower", lower),
            ("middle", (upper + lower) / 2.0),
        ])
    }

    fn is_ready(&self) -> bool {
        self.count >= self.length
    }

    fn reset(&mut self) {
        self.highs.clear();
        self.lows.clear();
        self.index = 0;
        self.count = 0;
    }
}

/// SuperTrend: ATR-banded trend-following overlay. Outputs `{value, direction}` where
/// `direction` is `1` (bullish, price above the trailing band) or `-1` (bearish).
#[derive(Debug, Clone)]
pub struct SuperTrend {
    atr: Atr,
    multiplier: f64,
    upper_band: Option<f64>,
    lower_band: Option<f64>,
    direction: i8,
    value: Option<f64>,
}

impl SuperTrend {
    pub fn new(atr_length: usize, multiplier: f64) -> Self {
        Self {
            atr: Atr::new(atr_length),
            multiplier,
            upper_band: None,
            lower_band: None,
            direction: 1,
            value: None,
        }
    }
}

impl Indicator for SuperTrend {
    fn update(&mut self, candle: &Candle, input: f64) {
        self.atr.update(candle, input);
        let Some(atr) = self.atr.raw_value() else {
            return;
        };
        let hl2 = (candle.high + candle.low) / 2.0;
        let basic_upper = hl2 + self.multiplier * atr;
        let basic_lower = hl2 - self.multiplier * atr;

        let final_upper = match self.upper_band {
            Some(prev_upper) if candle.close <= prev_upper => basic_upper.min(prev_upper),
            _ => basic_upper,
        };
        let final_lower = match self.lower_band {
            Some(prev_lower) if candle.close >= prev_lower => basic_lower.max(prev_lower),
            _ => basic_lower,
        };

        self.direction = match (self.direction, self.value) {
            (dir, Some(prev_value)) => {
                if dir == -1 && candle.close > prev_value {
                    1
                } else if dir == 1 && candle.close < prev_value {
                    -1
                } else {
                    dir
                }
            }
            (dir, None) => dir,
        };

        self.value = Some(if self.direction == 1 {
            final_lower
        } else {
            final_upper
        });
        self.upper_band = Some(final_upper);
        self.lower_band = Some(final_lower);
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Multi(vec![("value", f64::NAN), ("direction", f64::NAN)]);
        }
        IndicatorOutput::Multi(vec![
            ("value", self.value.unwrap_or(f64::NAN)),
            ("direction", self.direction as f64),
        ])
    }

    fn is_ready(&self) -> bool {
        self.atr.is_ready()
    }

    fn reset(&mut self) {
        self.atr.reset();
        self.upper_band = None;
        self.lower_band = None;
        self.direction = 1;
        self.value = None;
    }
}

/// Shared accumulator used by [`crate::trend_strength::Dm`] and [`crate::trend_strength::Adx`]:
/// Wilder-smoothed directional movement against a Wilder-smoothed true range.
#[derive(Debug, Clone)]
pub(crate) struct WilderSmoother {
    length: usize,
    seed: VecDeque<f64>,
    seed_sum: f64,
    value: Option<f64>,
}

impl WilderSmoother {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            seed: VecDeque::with_capacity(length),
            seed_sum: 0.0,
            value: None,
        }
    }

    pub fn update(&mut self, x: f64) {
        match self.value {
            None => {
                self.seed.push_back(x);
                self.seed_sum += x;
                if self.seed.len() == self.length {
                    self.value = Some(self.seed_sum / self.length as f64);
                }
            }
            Some(prev) => {
                self.value = Some((prev * (self.length - 1) as f64 + x) / self.length as f64);
            }
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn reset(&mut self) {
        self.seed.clear();
        self.seed_sum = 0.0;
        self.value = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle::new(ts, ts + 60_000, o, h, l, c, 1.0, 1).unwrap()
    }

    #[test]
    fn atr_seeds_then_wilder_smooths() {
        let mut atr = Atr::new(2);
        atr.update(&candle(0, 10.0, 12.0, 9.0, 11.0), 0.0);
        assert!(!atr.is_ready());
        atr.update(&candle(60_000, 11.0, 13.0, 10.0, 12.0), 0.0);
        assert!(atr.is_ready());
        // TR1 = 3 (12-9), TR2 = max(3, |13-11|, |10-11|) = 3
        assert_eq!(atr.raw_value(), Some(3.0));
    }

    #[test]
    fn bollinger_negative_variance_clamps_to_zero() {
        let mut bb = BollingerBands::new(2, 2.0);
        bb.update(&candle(0, 1.0, 1.0, 1.0, 1.0), 1.0);
        bb.update(&candle(60_000, 1.0, 1.0, 1.0, 1.0), 1.0);
        let out = bb.value();
        assert_eq!(out.field("middle"), Some(1.0));
        assert_eq!(out.field("upper"), Some(1.0));
        assert_eq!(out.field("lower"), Some(1.0));
    }

    #[test]
    fn donchian_tracks_rolling_extremes() {
        let mut dc = Donchian::new(2);
        dc.update(&candle(0, 1.0, 5.0, 1.0, 3.0), 0.0);
        dc.update(&candle(60_000, 1.0, 4.0, 0.5, 2.0), 0.0);
        let out = dc.value();
        assert_eq!(out.field("upper"), Some(5.0));
        assert_eq!(out.field("lower"), Some(0.5));
    }
}
