//! Trend-smoother indicator family (§4.2): EMA, SMA, WMA, DEMA, TEMA, TRIMA, ZLMA, ALMA, KAMA,
//! LINREG.

use crate::core::{Indicator, IndicatorOutput};
use crate::primitives::RingBuffer;
use playbook_instrument::Candle;
use std::collections::VecDeque;

/// Simple moving average. `is_ready` iff `count >= length`.
#[derive(Debug, Clone)]
pub struct Sma {
    length: usize,
    window: VecDeque<f64>,
    sum: f64,
}

impl Sma {
    pub fn new(length: usize) -> Self {
        assert!(length > 0);
        Self {
            length,
            window: VecDeque::with_capacity(length),
            sum: 0.0,
        }
    }
}

impl Indicator for Sma {
    fn update(&mut self, _candle: &Candle, input: f64) {
        self.window.push_back(input);
        self.sum += input;
        if self.window.len() > self.length {
            self.sum -= self.window.pop_front().unwrap();
        }
    }

    fn value(&self) -> IndicatorOutput {
        if self.window.is_empty() {
            IndicatorOutput::Scalar(f64::NAN)
        } else {
            IndicatorOutput::Scalar(self.sum / self.window.len() as f64)
        }
    }

    fn is_ready(&self) -> bool {
        self.window.len() >= self.length
    }

    fn reset(&mut self) {
        self.window.clear();
        self.sum = 0.0;
    }
}

/// Exponential moving average. Seeds from the SMA of the first `length` bars; `is_ready` iff
/// `count >= length`.
#[derive(Debug, Clone)]
pub struct Ema {
    length: usize,
    alpha: f64,
    seed: Sma,
    value: Option<f64>,
    count: usize,
}

impl Ema {
    pub fn new(length: usize) -> Self {
        assert!(length > 0);
        Self {
            length,
            alpha: 2.0 / (length as f64 + 1.0),
            seed: Sma::new(length),
            value: None,
            count: 0,
        }
    }

    /// Read the current value regardless of readiness (used by chained indicators like DEMA/TEMA
    /// that must keep feeding a downstream EMA once this one seeds, even before both are ready).
    pub fn raw_value(&self) -> Option<f64> {
        self.value
    }
}

impl Indicator for Ema {
    fn update(&mut self, candle: &Candle, input: f64) {
        self.count += 1;
        match self.value {
            None => {
                self.seed.update(candle, input);
                if self.seed.is_ready() {
                    self.value = Some(self.seed.value().scalar());
                }
            }
            Some(prev) => {
                self.value = Some((input - prev) * self.alpha + prev);
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
        self.seed.reset();
        self.value = None;
        self.count = 0;
    }
}

/// Weighted moving average: weights `1..=length`, heaviest on the newest bar. O(window) by
/// nature (§4.2).
#[derive(Debug, Clone)]
pub struct Wma {
    length: usize,
    window: RingBuffer<f64>,
}

impl Wma {
    pub fn new(length: usize) -> Self {
        assert!(length > 0);
        Self {
            length,
            window: RingBuffer::new(length),
        }
    }
}

impl Indicator for Wma {
    fn update(&mut self, _candle: &Candle, input: f64) {
        self.window.push(input);
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Scalar(f64::NAN);
        }
        let data = self.window.to_array();
        let n = data.len();
        let denom = (n * (n + 1) / 2) as f64;
        let numer: f64 = data
            .iter()
            .enumerate()
            .map(|(i, v)| v * (i + 1) as f64)
            .sum();
        IndicatorOutput::Scalar(numer / denom)
    }

    fn is_ready(&self) -> bool {
        self.window.count() >= self.length
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

/// Double EMA: `2*EMA1 - EMA2(EMA1)`. `EMA2` only starts consuming once `EMA1` is ready, so
/// `is_ready` lags `EMA1`'s own readiness by `length - 1` bars, matching common reference
/// behaviour.
#[derive(Debug, Clone)]
pub struct Dema {
    ema1: Ema,
    ema2: Ema,
}

impl Dema {
    pub fn new(length: usize) -> Self {
        Self {
            ema1: Ema::new(length),
            ema2: Ema::new(length),
        }
    }
}

impl Indicator for Dema {
    fn update(&mut self, candle: &Candle, input: f64) {
        self.ema1.update(candle, input);
        if let Some(e1) = self.ema1.raw_value() {
            self.ema2.update(candle, e1);
        }
    }

    fn value(&self) -> IndicatorOutput {
        match (self.ema1.raw_value(), self.ema2.raw_value()) {
            (Some(e1), Some(e2)) => IndicatorOutput::Scalar(2.0 * e1 - e2),
            _ => IndicatorOutput::Scalar(f64::NAN),
        }
    }

    fn is_ready(&self) -> bool {
        self.ema2.is_ready()
    }

    fn reset(&mut self) {
        self.ema1.reset();
        self.ema2.reset();
    }
}

/// Triple EMA: `3*EMA1 - 3*EMA2 + EMA3`, chained the same way as [`Dema`].
#[derive(Debug, Clone)]
pub struct Tema {
    ema1: Ema,
    ema2: Ema,
    ema3: Ema,
}

impl Tema {
    pub fn new(length: usize) -> Self {
        Self {
            ema1: Ema::new(length),
            ema2: Ema::new(length),
            ema3: Ema::new(length),
        }
    }
}

impl Indicator for Tema {
    fn update(&mut self, candle: &Candle, input: f64) {
        self.ema1.update(candle, input);
        if let Some(e1) = self.ema1.raw_value() {
            self.ema2.update(candle, e1);
        }
        if let Some(e2) = self.ema2.raw_value() {
            self.ema3.update(candle, e2);
        }
    }

    fn value(&self) -> IndicatorOutput {
        match (
            self.ema1.raw_value(),
            self.ema2.raw_value(),
            self.ema3.raw_value(),
        ) {
            (Some(e1), Some(e2), Some(e3)) => {
                IndicatorOutput::Scalar(3.0 * e1 - 3.0 * e2 + e3)
            }
            _ => IndicatorOutput::Scalar(f64::NAN),
        }
    }

    fn is_ready(&self) -> bool {
        self.ema3.is_ready()
    }

    fn reset(&mut self) {
        self.ema1.reset();
        self.ema2.reset();
        self.ema3.reset();
    }
}

/// Triangular moving average: an SMA of an SMA, with the inner window halved so the overall
/// weighting is triangular. O(window) by nature (§4.2).
#[derive(Debug, Clone)]
pub struct Trima {
    inner: Sma,
    outer: Sma,
}

impl Trima {
    pub fn new(length: usize) -> Self {
        assert!(length > 0);
        let inner_len = length / 2 + 1;
        Self {
            inner: Sma::new(inner_len),
            outer: Sma::new(length - inner_len + 1),
        }
    }
}

impl Indicator for Trima {
    fn update(&mut self, candle: &Candle, input: f64) {
        self.inner.update(candle, input);
        if self.inner.is_ready() {
            self.outer.update(candle, self.inner.value().scalar());
        }
    }

    fn value(&self) -> IndicatorOutput {
        if self.outer.is_ready() {
            self.outer.value()
        } else {
            IndicatorOutput::Scalar(f64::NAN)
        }
    }

    fn is_ready(&self) -> bool {
        self.outer.is_ready()
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.outer.reset();
    }
}

/// Zero-lag EMA: de-lags the input via `2*price - price[lag]` (`lag = (length-1)/2`) before
/// feeding a standard EMA.
#[derive(Debug, Clone)]
pub struct Zlma {
    lag: usize,
    history: RingBuffer<f64>,
    ema: Ema,
}

impl Zlma {
    pub fn new(length: usize) -> Self {
        let lag = (length.saturating_sub(1)) / 2;
        Self {
            lag,
            history: RingBuffer::new(lag + 1),
            ema: Ema::new(length),
        }
    }
}

impl Indicator for Zlma {
    fn update(&mut self, candle: &Candle, input: f64) {
        self.history.push(input);
        let lagged = if self.history.count() > self.lag {
            *self
                .history
                .get(self.history.count() - 1 - self.lag)
                .unwrap()
        } else {
            input
        };
        let de_lagged = 2.0 * input - lagged;
        self.ema.update(candle, de_lagged);
    }

    fn value(&self) -> IndicatorOutput {
        self.ema.value()
    }

    fn is_ready(&self) -> bool {
        self.ema.is_ready()
    }

    fn reset(&mut self) {
        self.history.clear();
        self.ema.reset();
    }
}

/// Arnaud Legoux moving average: a Gaussian-weighted window average, offering a tunable
/// lag/smoothness tradeoff via `sigma` and `offset`.
#[derive(Debug, Clone)]
pub struct Alma {
    length: usize,
    window: RingBuffer<f64>,
    weights: Vec<f64>,
}

impl Alma {
    pub fn new(length: usize, sigma: f64, offset: f64) -> Self {
        assert!(length > 0);
        let m = offset * (length as f64 - 1.0);
        let s = length as f64 / sigma;
        let weights: Vec<f64> = (0..length)
            .map(|i| (-((i as f64 - m).powi(2)) / (2.0 * s * s)).exp())
            .collect();
        Self {
            length,
            window: RingBuffer::new(length),
            weights,
        }
    }
}

impl Indicator for Alma {
    fn update(&mut self, _candle: &Candle, input: f64) {
        self.window.push(input);
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Scalar(f64::NAN);
        }
        let data = self.window.to_array();
        let weight_sum: f64 = self.weights.iter().sum();
        let numer: f64 = data.iter().zip(self.weights.iter()).map(|(v, w)| v * w).sum();
        IndicatorOutput::Scalar(numer / weight_sum)
    }

    fn is_ready(&self) -> bool {
        self.window.count() >= self.length
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

/// Kaufman adaptive moving average: an EMA whose smoothing constant scales with the market's
/// recent efficiency ratio (net move over `length` bars / sum of bar-to-bar moves).
#[derive(Debug, Clone)]
pub struct Kama {
    length: usize,
    fast_sc: f64,
    slow_sc: f64,
    prices: RingBuffer<f64>,
    diffs: VecDeque<f64>,
    abs_diff_sum: f64,
    value: Option<f64>,
    count: usize,
}

impl Kama {
    pub fn new(length: usize, fast_length: usize, slow_length: usize) -> Self {
        Self {
            length,
            fast_sc: 2.0 / (fast_length as f64 + 1.0),
            slow_sc: 2.0 / (slow_length as f64 + 1.0),
            prices: RingBuffer::new(length + 1),
            diffs: VecDeque::with_capacity(length),
            abs_diff_sum: 0.0,
            value: None,
            count: 0,
        }
    }
}

impl Indicator for Kama {
    fn update(&mut self, _candle: &Candle, input: f64) {
        self.count += 1;
        if let Some(&prev) = self.prices.last() {
            let diff = (input - prev).abs();
            self.diffs.push_back(diff);
            self.abs_diff_sum += diff;
            if self.diffs.len() > self.length {
                self.abs_diff_sum -= self.diffs.pop_front().unwrap();
            }
        }
        self.prices.push(input);

        if self.prices.count() <= self.length {
            if self.value.is_none() && self.prices.count() == self.length {
                self.value = Some(input);
            }
            return;
        }

        let oldest = *self.prices.get(self.prices.count() - 1 - self.length).unwrap();
        let change = (input - oldest).abs();
        let er = if self.abs_diff_sum > 0.0 {
            change / self.abs_diff_sum
        } else {
            0.0
        };
        let sc = (er * (self.fast_sc - self.slow_sc) + self.slow_sc).powi(2);
        let prev = self.value.unwrap_or(input);
        self.value = Some(prev + sc * (input - prev));
    }

    fn value(&self) -> IndicatorOutput {
        IndicatorOutput::Scalar(self.value.unwrap_or(f64::NAN))
    }

    fn is_ready(&self) -> bool {
        self.count > self.length
    }

    fn reset(&mut self) {
        self.prices.clear();
        self.diffs.clear();
        self.abs_diff_sum = 0.0;
        self.value = None;
        self.count = 0;
    }
}

/// Linear regression forecast: the endpoint of the least-squares line fit over the trailing
/// `length` bars. O(window) by nature (§4.2).
#[derive(Debug, Clone)]
pub struct LinReg {
    length: usize,
    window: RingBuffer<f64>,
}

impl LinReg {
    pub fn new(length: usize) -> Self {
        assert!(length > 0);
        Self {
            length,
            window: RingBuffer::new(length),
        }
    }
}

impl Indicator for LinReg {
    fn update(&mut self, _candle: &Candle, input: f64) {
        self.window.push(input);
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Scalar(f64::NAN);
        }
        let data = self.window.to_array();
        let n = data.len() as f64;
        let sum_x: f64 = (0..data.len()).map(|i| i as f64).sum();
        let sum_y: f64 = data.iter().sum();
        let sum_xy: f64 = data.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
        let sum_xx: f64 = (0..data.len()).map(|i| (i as f64).powi(2)).sum();
        let denom = n * sum_xx - sum_x * sum_x;
        if denom == 0.0 {
            return IndicatorOutput::Scalar(*data.last().unwrap());
        }
        let slope = (n * sum_xy - sum_x * sum_y) / denom;
        let intercept = (sum_y - slope * sum_x) / n;
        IndicatorOutput::Scalar(intercept + slope * (n - 1.0))
    }

    fn is_ready(&self) -> bool {
        self.window.count() >= self.length
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playbook_instrument::Candle;

    fn candle_at(i: usize, close: f64) -> Candle {
        Candle::new(
            i as i64 * 60_000,
            i as i64 * 60_000 + 60_000,
            close,
            close,
            close,
            close,
            1.0,
            1,
        )
        .unwrap()
    }

    #[test]
    fn sma_matches_hand_computation() {
        let mut sma = Sma::new(3);
        for (i, v) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            sma.update(&candle_at(i, v), v);
        }
        assert!(sma.is_ready());
        assert_eq!(sma.value().scalar(), 3.0); // (2+3+4)/3
    }

    #[test]
    fn ema_seeds_from_sma_of_first_length_bars() {
        let mut ema = Ema::new(2);
        assert!(!ema.is_ready());
        ema.update(&candle_at(0, 1.0), 1.0);
        assert!(!ema.is_ready());
        ema.update(&candle_at(1, 2.0), 2.0);
        assert!(ema.is_ready());
        assert_eq!(ema.value().scalar(), 1.5); // SMA(1,2)
        ema.update(&candle_at(2, 4.0), 4.0);
        // alpha = 2/3: 1.5 + 2/3*(4-1.5) = 3.1666...
        assert!((ema.value().scalar() - 3.1666666666666665).abs() < 1e-9);
    }

    #[test]
    fn wma_weights_newest_bar_heaviest() {
        let mut wma = Wma::new(2);
        wma.update(&candle_at(0, 1.0), 1.0);
        wma.update(&candle_at(1, 3.0), 3.0);
        // (1*1 + 3*2)/3 = 7/3
        assert!((wma.value().scalar() - 7.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn dema_ready_lags_ema1_readiness() {
        let mut dema = Dema::new(2);
        for (i, v) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
            dema.update(&candle_at(i, v), v);
        }
        assert!(dema.is_ready());
    }

    #[test]
    fn linreg_on_perfect_line_predicts_next_point() {
        let mut lr = LinReg::new(3);
        for (i, v) in [1.0, 2.0, 3.0].into_iter().enumerate() {
            lr.update(&candle_at(i, v), v);
        }
        assert!((lr.value().scalar() - 3.0).abs() < 1e-9);
    }
}
