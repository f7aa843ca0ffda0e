//! Momentum/oscillator indicator family (§4.2): CCI, Williams %R, Stochastic, StochRSI, CMO, MFI,
//! UO, ROC, MOM, TRIX, TSI, PPO, Fisher Transform, Squeeze Momentum.

use crate::core::{Indicator, IndicatorOutput};
use crate::primitives::{DequeMode, MonotonicDeque, RingBuffer};
use crate::trend::Ema;
use crate::volatility::{BollingerBands, KeltnerChannel};
use playbook_instrument::Candle;
use std::collections::VecDeque;

/// Commodity Channel Index: `(typical - sma) / (0.015 * mean_abs_deviation)`.
///
/// `value()` is `O(window)` by nature: the mean absolute deviation has to be recomputed against
/// the current window's mean on every read rather than maintained incrementally.
#[derive(Debug, Clone)]
pub struct Cci {
    length: usize,
    window: RingBuffer<f64>,
}

impl Cci {
    pub fn new(length: usize) -> Self {
        assert!(length > 0);
        Self {
            length,
            window: RingBuffer::new(length),
        }
    }
}

impl Indicator for Cci {
    fn update(&mut self, _candle: &Candle, input: f64) {
        self.window.push(input);
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Scalar(f64::NAN);
        }
        let data = self.window.to_array();
        let mean = data.iter().sum::<f64>() / data.len() as f64;
        let mad = data.iter().map(|v| (v - mean).abs()).sum::<f64>() / data.len() as f64;
        let last = *data.last().unwrap();
        if mad == 0.0 {
            return IndicatorOutput::Scalar(0.0);
        }
        IndicatorOutput::Scalar((last - mean) / (0.015 * mad))
    }

    fn is_ready(&self) -> bool {
        self.window.count() >= self.length
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

/// Williams %R: `-100 * (highest_high - close) / (highest_high - lowest_low)`.
#[derive(Debug, Clone)]
pub struct WilliamsR {
    length: usize,
    highs: MonotonicDeque,
    lows: MonotonicDeque,
    last_close: f64,
    index: u64,
    count: usize,
}

impl WilliamsR {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            highs: MonotonicDeque::new(length, DequeMode::Max),
            lows: MonotonicDeque::new(length, DequeMode::Min),
            last_close: f64::NAN,
            index: 0,
            count: 0,
        }
    }
}

impl Indicator for WilliamsR {
    fn update(&mut self, candle: &Candle, _input: f64) {
        self.highs.push(self.index, candle.high);
        self.lows.push(self.index, candle.low);
        self.last_close = candle.close;
        self.index += 1;
        self.count += 1;
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Scalar(f64::NAN);
        }
        let hh = self.highs.front().unwrap();
        let ll = self.lows.front().unwrap();
        if hh == ll {
            return IndicatorOutput::Scalar(-50.0);
        }
        IndicatorOutput::Scalar(-100.0 * (hh - self.last_close) / (hh - ll))
    }

    fn is_ready(&self) -> bool {
        self.count >= self.length
    }

    fn reset(&mut self) {
        self.highs.clear();
        self.lows.clear();
        self.last_close = f64::NAN;
        self.index = 0;
        self.count = 0;
    }
}

/// Stochastic oscillator: `{k, d}`, `%K` over `length` bars, `%D` a `d_length`-bar SMA of `%K`.
#[derive(Debug, Clone)]
pub struct Stochastic {
    length: usize,
    highs: MonotonicDeque,
    lows: MonotonicDeque,
    d: RingBuffer<f64>,
    last_close: f64,
    index: u64,
    count: usize,
}

impl Stochastic {
    pub fn new(length: usize, d_length: usize) -> Self {
        Self {
            length,
            highs: MonotonicDeque::new(length, DequeMode::Max),
            lows: MonotonicDeque::new(length, DequeMode::Min),
            d: RingBuffer::new(d_length),
            last_close: f64::NAN,
            index: 0,
            count: 0,
        }
    }

    fn raw_k(&self) -> Option<f64> {
        if self.count < self.length {
            return None;
        }
        let hh = self.highs.front().unwrap();
        let ll = self.lows.front().unwrap();
        Some(if hh == ll {
            50.0
        } else {
            100.0 * (self.last_close - ll) / (hh - ll)
        })
    }
}

impl Indicator for Stochastic {
    fn update(&mut self, candle: &Candle, _input: f64) {
        self.highs.push(self.index, candle.high);
        self.lows.push(self.index, candle.low);
        self.last_close = candle.close;
        self.index += 1;
        self.count += 1;
        if let Some(k) = self.raw_k() {
            self.d.push(k);
        }
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Multi(vec![("k", f64::NAN), ("d", f64::NAN)]);
        }
        let k = self.raw_k().unwrap();
        let d = self.d.to_array().iter().sum::<f64>() / self.d.count() as f64;
        IndicatorOutput::Multi(vec![("k", k), ("d", d)])
    }

    fn is_ready(&self) -> bool {
        self.raw_k().is_some() && self.d.is_full()
    }

    fn reset(&mut self) {
        self.highs.clear();
        self.lows.clear();
        self.d.clear();
        self.last_close = f64::NAN;
        self.index = 0;
        self.count = 0;
    }
}

/// Relative strength index: Wilder-smoothed average gain/loss ratio.
#[derive(Debug, Clone)]
pub struct Rsi {
    length: usize,
    prev_input: Option<f64>,
    avg_gain: crate::volatility::WilderSmoother,
    avg_loss: crate::volatility::WilderSmoother,
}

impl Rsi {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            prev_input: None,
            avg_gain: crate::volatility::WilderSmoother::new(length),
            avg_loss: crate::volatility::WilderSmoother::new(length),
        }
    }
}

impl Indicator for Rsi {
    fn update(&mut self, _candle: &Candle, input: f64) {
        if let Some(prev) = self.prev_input {
            let change = input - prev;
            self.avg_gain.update(change.max(0.0));
            self.avg_loss.update((-change).max(0.0));
        }
        self.prev_input = Some(input);
    }

    fn value(&self) -> IndicatorOutput {
        match (self.avg_gain.value(), self.avg_loss.value()) {
            (Some(gain), Some(loss)) => {
                if loss == 0.0 {
                    IndicatorOutput::Scalar(if gain == 0.0 { 50.0 } else { 100.0 })
                } else {
                    let rs = gain / loss;
                    IndicatorOutput::Scalar(100.0 - 100.0 / (1.0 + rs))
                }
            }
            _ => IndicatorOutput::Scalar(50.0),
        }
    }

    fn is_ready(&self) -> bool {
        self.avg_gain.value().is_some()
    }

    fn reset(&mut self) {
        self.prev_input = None;
        self.avg_gain.reset();
        self.avg_loss.reset();
        let _ = self.length;
    }
}

/// Stochastic RSI: a Stochastic oscillator applied to RSI's own output instead of price.
#[derive(Debug, Clone)]
pub struct StochRsi {
    rsi: Rsi,
    window: MonotonicDeque,
    low_window: MonotonicDeque,
    d: RingBuffer<f64>,
    length: usize,
    index: u64,
    rsi_count: usize,
}

impl StochRsi {
    pub fn new(rsi_length: usize, stoch_length: usize, d_length: usize) -> Self {
        Self {
            rsi: Rsi::new(rsi_length),
            window: MonotonicDeque::new(stoch_length, DequeMode::Max),
            low_window: MonotonicDeque::new(stoch_length, DequeMode::Min),
            d: RingBuffer::new(d_length),
            length: stoch_length,
            index: 0,
            rsi_count: 0,
        }
    }
}

impl Indicator for StochRsi {
    fn update(&mut self, candle: &Candle, input: f64) {
        self.rsi.update(candle, input);
        if self.rsi.is_ready() {
            let rsi_value = self.rsi.value().scalar();
            self.window.push(self.index, rsi_value);
            self.low_window.push(self.index, rsi_value);
            self.index += 1;
            self.rsi_count += 1;
            if self.rsi_count >= self.length {
                let hh = self.window.front().unwrap();
                let ll = self.low_window.front().unwrap();
                let k = if hh == ll {
                    50.0
                } else {
                    100.0 * (rsi_value - ll) / (hh - ll)
                };
                self.d.push(k);
            }
        }
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Multi(vec![("k", f64::NAN), ("d", f64::NAN)]);
        }
        let k = *self.d.last().unwrap();
        let d = self.d.to_array().iter().sum::<f64>() / self.d.count() as f64;
        IndicatorOutput::Multi(vec![("k", k), ("d", d)])
    }

    fn is_ready(&self) -> bool {
        self.d.is_full()
    }

    fn reset(&mut self) {
        self.rsi.reset();
        self.window.clear();
        self.low_window.clear();
        self.d.clear();
        self.index = 0;
        self.rsi_count = 0;
    }
}

/// Chande Momentum Oscillator: `100 * (sum_gain - sum_loss) / (sum_gain + sum_loss)` over a
/// rolling window.
#[derive(Debug, Clone)]
pub struct Cmo {
    length: usize,
    prev_input: Option<f64>,
    gains: VecDeque<f64>,
    losses: VecDeque<f64>,
    sum_gain: f64,
    sum_loss: f64,
}

impl Cmo {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            prev_input: None,
            gains: VecDeque::with_capacity(length),
            losses: VecDeque::with_capacity(length),
            sum_gain: 0.0,
            sum_loss: 0.0,
        }
    }
}

impl Indicator for Cmo {
    fn update(&mut self, _candle: &Candle, input: f64) {
        let Some(prev) = self.prev_input else {
            self.prev_input = Some(input);
            return;
        };
        let change = input - prev;
        self.prev_input = Some(input);
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        self.gains.push_back(gain);
        self.losses.push_back(loss);
        self.sum_gain += gain;
        self.sum_loss += loss;
        if self.gains.len() > self.length {
            self.sum_gain -= self.gains.pop_front().unwrap();
            self.sum_loss -= self.losses.pop_front().unwrap();
        }
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Scalar(f64::NAN);
        }
        let total = self.sum_gain + self.sum_loss;
        if total == 0.0 {
            return IndicatorOutput::Scalar(0.0);
        }
        IndicatorOutput::Scalar(100.0 * (self.sum_gain - self.sum_loss) / total)
    }

    fn is_ready(&self) -> bool {
        self.gains.len() >= self.length
    }

    fn reset(&mut self) {
        self.prev_input = None;
        self.gains.clear();
        self.losses.clear();
        self.sum_gain = 0.0;
        self.sum_loss = 0.0;
    }
}

/// Money Flow Index: volume-weighted RSI analogue over typical price.
#[derive(Debug, Clone)]
pub struct Mfi {
    length: usize,
    prev_typical: Option<f64>,
    pos_flow: VecDeque<f64>,
    neg_flow: VecDeque<f64>,
    sum_pos: f64,
    sum_neg: f64,
}

impl Mfi {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            prev_typical: None,
            pos_flow: VecDeque::with_capacity(length),
            neg_flow: VecDeque::with_capacity(length),
            sum_pos: 0.0,
            sum_neg: 0.0,
        }
    }
}

impl Indicator for Mfi {
    fn update(&mut self, candle: &Candle, _input: f64) {
        let typical = candle.hlc3();
        let raw_flow = typical * candle.volume;
        let (pos, neg) = match self.prev_typical {
            None => (0.0, 0.0),
            Some(prev) if typical > prev => (raw_flow, 0.0),
            Some(prev) if typical < prev => (0.0, raw_flow),
            Some(_) => (0.0, 0.0),
        };
        self.prev_typical = Some(typical);
        self.pos_flow.push_back(pos);
        self.neg_flow.push_back(neg);
        self.sum_pos += pos;
        self.sum_neg += neg;
        if self.pos_flow.len() > self.length {
            self.sum_pos -= self.pos_flow.pop_front().unwrap();
            self.sum_neg -= self.neg_flow.pop_front().unwrap();
        }
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Scalar(f64::NAN);
        }
        if self.sum_neg == 0.0 {
            return IndicatorOutput::Scalar(if self.sum_pos == 0.0 { 50.0 } else { 100.0 });
        }
        let money_ratio = self.sum_pos / self.sum_neg;
        IndicatorOutput::Scalar(100.0 - 100.0 / (1.0 + money_ratio))
    }

    fn is_ready(&self) -> bool {
        self.pos_flow.len() >= self.length
    }

    fn reset(&mut self) {
        self.prev_typical = None;
        self.pos_flow.clear();
        self.neg_flow.clear();
        self.sum_pos = 0.0;
        self.sum_neg = 0.0;
    }
}

/// Ultimate Oscillator: weighted blend of buying pressure over three windows (`short < medium <
/// long`).
#[derive(Debug, Clone)]
pub struct UltimateOscillator {
    short: usize,
    medium: usize,
    long: usize,
    prev_close: Option<f64>,
    bp: VecDeque<f64>,
    tr: VecDeque<f64>,
    sum_bp_short: f64,
    sum_tr_short: f64,
    sum_bp_medium: f64,
    sum_tr_medium: f64,
    sum_bp_long: f64,
    sum_tr_long: f64,
    count: usize,
}

impl UltimateOscillator {
    pub fn new(short: usize, medium: usize, long: usize) -> Self {
        assert!(short < medium && medium < long);
        Self {
            short,
            medium,
            long,
            prev_close: None,
            bp: VecDeque::with_capacity(long),
            tr: VecDeque::with_capacity(long),
            sum_bp_short: 0.0,
            sum_tr_short: 0.0,
            sum_bp_medium: 0.0,
            sum_tr_medium: 0.0,
            sum_bp_long: 0.0,
            sum_tr_long: 0.0,
            count: 0,
        }
    }
}

impl Indicator for UltimateOscillator {
    fn update(&mut self, candle: &Candle, _input: f64) {
        let prev_close = self.prev_close.unwrap_or(candle.close);
        let true_low = candle.low.min(prev_close);
        let true_high = candle.high.max(prev_close);
        let bp = candle.close - true_low;
        let tr = true_high - true_low;
        self.prev_close = Some(candle.close);
        self.count += 1;

        self.bp.push_back(bp);
        self.tr.push_back(tr);
        self.sum_bp_short += bp;
        self.sum_tr_short += tr;
        self.sum_bp_medium += bp;
        self.sum_tr_medium += tr;
        self.sum_bp_long += bp;
        self.sum_tr_long += tr;

        if self.bp.len() > self.long {
            let idx_from_end = self.bp.len() - self.long - 1;
            let _ = idx_from_end;
        }
        if self.bp.len() > self.short {
            let i = self.bp.len() - 1 - self.short;
            self.sum_bp_short -= self.bp[i];
            self.sum_tr_short -= self.tr[i];
        }
        if self.bp.len() > self.medium {
            let i = self.bp.len() - 1 - self.medium;
            self.sum_bp_medium -= self.bp[i];
            self.sum_tr_medium -= self.tr[i];
        }
        if self.bp.len() > self.long {
            let dropped_bp = self.bp.pop_front().unwrap();
            let dropped_tr = self.tr.pop_front().unwrap();
            self.sum_bp_long -= dropped_bp;
            self.sum_tr_long -= dropped_tr;
        }
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Scalar(f64::NAN);
        }
        let avg = |bp: f64, tr: f64| if tr > 0.0 { bp / tr } else { 0.0 };
        let a1 = avg(self.sum_bp_short, self.sum_tr_short);
        let a2 = avg(self.sum_bp_medium, self.sum_tr_medium);
        let a3 = avg(self.sum_bp_long, self.sum_tr_long);
        IndicatorOutput::Scalar(100.0 * (4.0 * a1 + 2.0 * a2 + a3) / 7.0)
    }

    fn is_ready(&self) -> bool {
        self.count >= self.long
    }

    fn reset(&mut self) {
        self.prev_close = None;
        self.bp.clear();
        self.tr.clear();
        self.sum_bp_short = 0.0;
        self.sum_tr_short = 0.0;
        self.sum_bp_medium = 0.0;
        self.sum_tr_medium = 0.0;
        self.sum_bp_long = 0.0;
        self.sum_tr_long = 0.0;
        self.count = 0;
    }
}

/// Rate of change: `100 * (input - input[length periods ago]) / input[length periods ago]`.
#[derive(Debug, Clone)]
pub struct Roc {
    length: usize,
    window: RingBuffer<f64>,
}

impl Roc {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            window: RingBuffer::new(length + 1),
        }
    }
}

impl Indicator for Roc {
    fn update(&mut self, _candle: &Candle, input: f64) {
        self.window.push(input);
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Scalar(f64::NAN);
        }
        let oldest = *self.window.get(0).unwrap();
        let newest = *self.window.last().unwrap();
        if oldest == 0.0 {
            return IndicatorOutput::Scalar(0.0);
        }
        IndicatorOutput::Scalar(100.0 * (newest - oldest) / oldest)
    }

    fn is_ready(&self) -> bool {
        self.window.count() > self.length
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

/// Momentum: `input - input[length periods ago]`.
#[derive(Debug, Clone)]
pub struct Mom {
    length: usize,
    window: RingBuffer<f64>,
}

impl Mom {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            window: RingBuffer::new(length + 1),
        }
    }
}

impl Indicator for Mom {
    fn update(&mut self, _candle: &Candle, input: f64) {
        self.window.push(input);
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Scalar(f64::NAN);
        }
        let oldest = *self.window.get(0).unwrap();
        let newest = *self.window.last().unwrap();
        IndicatorOutput::Scalar(newest - oldest)
    }

    fn is_ready(&self) -> bool {
        self.window.count() > self.length
    }

    fn reset(&mut self) {
        self.window.clear();
    }
}

/// TRIX: rate of change of a triple-smoothed EMA. Exposes zero-line-cross momentum with heavy
/// noise suppression.
#[derive(Debug, Clone)]
pub struct Trix {
    ema1: Ema,
    ema2: Ema,
    ema3: Ema,
    prev_ema3: Option<f64>,
    value: Option<f64>,
}

impl Trix {
    pub fn new(length: usize) -> Self {
        Self {
            ema1: Ema::new(length),
            ema2: Ema::new(length),
            ema3: Ema::new(length),
            prev_ema3: None,
            value: None,
        }
    }
}

impl Indicator for Trix {
    fn update(&mut self, candle: &Candle, input: f64) {
        self.ema1.update(candle, input);
        let Some(e1) = self.ema1.raw_value() else {
            return;
        };
        self.ema2.update(candle, e1);
        let Some(e2) = self.ema2.raw_value() else {
            return;
        };
        self.ema3.update(candle, e2);
        let Some(e3) = self.ema3.raw_value() else {
            return;
        };
        if let Some(prev) = self.prev_ema3 {
            self.value = Some(if prev != 0.0 {
                100.0 * (e3 - prev) / prev
            } else {
                0.0
            });
        }
        self.prev_ema3 = Some(e3);
    }

    fn value(&self) -> IndicatorOutput {
        IndicatorOutput::Scalar(self.value.unwrap_or(f64::NAN))
    }

    fn is_ready(&self) -> bool {
        self.value.is_some()
    }

    fn reset(&mut self) {
        self.ema1.reset();
        self.ema2.reset();
        self.ema3.reset();
        self.prev_ema3 = None;
        self.value = None;
    }
}

/// True Strength Index: double-smoothed momentum over double-smoothed absolute momentum.
#[derive(Debug, Clone)]
pub struct Tsi {
    prev_input: Option<f64>,
    momentum_ema1: Ema,
    momentum_ema2: Ema,
    abs_momentum_ema1: Ema,
    abs_momentum_ema2: Ema,
}

impl Tsi {
    pub fn new(long_length: usize, short_length: usize) -> Self {
        Self {
            prev_input: None,
            momentum_ema1: Ema::new(long_length),
            momentum_ema2: Ema::new(short_length),
            abs_momentum_ema1: Ema::new(long_length),
            abs_momentum_ema2: Ema::new(short_length),
        }
    }
}

impl Indicator for Tsi {
    fn update(&mut self, candle: &Candle, input: f64) {
        let Some(prev) = self.prev_input else {
            self.prev_input = Some(input);
            return;
        };
        self.prev_input = Some(input);
        let momentum = input - prev;
        self.momentum_ema1.update(candle, momentum);
        self.abs_momentum_ema1.update(candle, momentum.abs());
        if let Some(m1) = self.momentum_ema1.raw_value() {
            self.momentum_ema2.update(candle, m1);
        }
        if let Some(a1) = self.abs_momentum_ema1.raw_value() {
            self.abs_momentum_ema2.update(candle, a1);
        }
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Scalar(f64::NAN);
        }
        let m2 = self.momentum_ema2.raw_value().unwrap();
        let a2 = self.abs_momentum_ema2.raw_value().unwrap();
        if a2 == 0.0 {
            return IndicatorOutput::Scalar(0.0);
        }
        IndicatorOutput::Scalar(100.0 * m2 / a2)
    }

    fn is_ready(&self) -> bool {
        self.momentum_ema2.is_ready() && self.abs_momentum_ema2.is_ready()
    }

    fn reset(&mut self) {
        self.prev_input = None;
        self.momentum_ema1.reset();
        self.momentum_ema2.reset();
        self.abs_momentum_ema1.reset();
        self.abs_momentum_ema2.reset();
    }
}

/// Percentage Price Oscillator: MACD line normalized by the slow EMA, avoiding price-scale
/// dependence.
#[derive(Debug, Clone)]
pub struct Ppo {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Ppo {
    pub fn new(fast_length: usize, slow_length: usize, signal_length: usize) -> Self {
        assert!(fast_length < slow_length);
        Self {
            fast: Ema::new(fast_length),
            slow: Ema::new(slow_length),
            signal: Ema::new(signal_length),
        }
    }

    fn raw_ppo(&self) -> Option<f64> {
        let slow = self.slow.raw_value()?;
        let fast = self.fast.raw_value()?;
        if slow == 0.0 {
            return Some(0.0);
        }
        Some(100.0 * (fast - slow) / slow)
    }
}

impl Indicator for Ppo {
    fn update(&mut self, candle: &Candle, input: f64) {
        self.fast.update(candle, input);
        self.slow.update(candle, input);
        if self.slow.is_ready() {
            if let Some(ppo) = self.raw_ppo() {
                self.signal.update(candle, ppo);
            }
        }
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Multi(vec![
                ("ppo", f64::NAN),
                ("signal", f64::NAN),
                ("histogram", f64::NAN),
            ]);
        }
        let ppo = self.raw_ppo().unwrap();
        let signal = self.signal.raw_value().unwrap();
        IndicatorOutput::Multi(vec![
            ("ppo", ppo),
            ("signal", signal),
            ("histogram", ppo - signal),
        ])
    }

    fn is_ready(&self) -> bool {
        self.signal.is_ready()
    }

    fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
        self.signal.reset();
    }
}

/// Fisher Transform: Gaussian-normalizes a bounded price oscillator.
///
/// `is_ready` is `count > length`, not `count >= length` (documented quirk, §4.2): the transform
/// needs one bar beyond the raw window to have a non-degenerate previous value to smooth against.
#[derive(Debug, Clone)]
pub struct Fisher {
    length: usize,
    highs: MonotonicDeque,
    lows: MonotonicDeque,
    last_input: f64,
    prev_normalized: f64,
    value: f64,
    prev_value: f64,
    index: u64,
    count: usize,
}

impl Fisher {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            highs: MonotonicDeque::new(length, DequeMode::Max),
            lows: MonotonicDeque::new(length, DequeMode::Min),
            last_input: f64::NAN,
            prev_normalized: 0.0,
            value: 0.0,
            prev_value: 0.0,
            index: 0,
            count: 0,
        }
    }
}

impl Indicator for Fisher {
    fn update(&mut self, _candle: &Candle, input: f64) {
        self.highs.push(self.index, input);
        self.lows.push(self.index, input);
        self.last_input = input;
        self.index += 1;
        self.count += 1;

        if self.count < self.length {
            return;
        }

        let hh = self.highs.front().unwrap();
        let ll = self.lows.front().unwrap();
        let raw = if hh != ll {
            0.66 * ((input - ll) / (hh - ll) - 0.5) + 0.67 * self.prev_normalized
        } else {
            0.0
        };
        let normalized = raw.clamp(-0.999, 0.999);
        self.prev_normalized = normalized;
        self.prev_value = self.value;
        self.value = 0.5 * ((1.0 + normalized) / (1.0 - normalized)).ln() + 0.5 * self.prev_value;
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Multi(vec![("value", f64::NAN), ("signal", f64::NAN)]);
        }
        IndicatorOutput::Multi(vec![("value", self.value), ("signal", self.prev_value)])
    }

    fn is_ready(&self) -> bool {
        self.count > self.length
    }

    fn reset(&mut self) {
        self.highs.clear();
        self.lows.clear();
        self.last_input = f64::NAN;
        self.prev_normalized = 0.0;
        self.value = 0.0;
        self.prev_value = 0.0;
        self.index = 0;
        self.count = 0;
    }
}

/// Squeeze Momentum: flags when Bollinger Bands sit inside Keltner Channel ("squeeze on"), plus a
/// linear-regression momentum value of price versus its own midline.
#[derive(Debug, Clone)]
pub struct SqueezeMomentum {
    bb: BollingerBands,
    kc: KeltnerChannel,
    window: RingBuffer<f64>,
    highs: RingBuffer<f64>,
    lows: RingBuffer<f64>,
    length: usize,
}

impl SqueezeMomentum {
    pub fn new(length: usize, bb_k: f64, kc_atr_length: usize, kc_multiplier: f64) -> Self {
        Self {
            bb: BollingerBands::new(length, bb_k),
            kc: KeltnerChannel::new(length, kc_atr_length, kc_multiplier),
            window: RingBuffer::new(length),
            highs: RingBuffer::new(length),
            lows: RingBuffer::new(length),
            length,
        }
    }
}

impl Indicator for SqueezeMomentum {
    fn update(&mut self, candle: &Candle, input: f64) {
        self.bb.update(candle, input);
        self.kc.update(candle, input);
        self.window.push(input);
        self.highs.push(candle.high);
        self.lows.push(candle.low);
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Multi(vec![
                ("momentum", f64::NAN),
                ("squeeze_on", f64::NAN),
            ]);
        }
        let bb = self.bb.value();
        let kc = self.kc.value();
        let squeeze_on = bb.field("lower").unwrap() > kc.field("lower").unwrap()
            && bb.field("upper").unwrap() < kc.field("upper").unwrap();

        let highest = self.highs.to_array().into_iter().fold(f64::MIN, f64::max);
        let lowest = self.lows.to_array().into_iter().fold(f64::MAX, f64::min);
        let mid = (highest + lowest) / 2.0;
        let sma = self.window.to_array().iter().sum::<f64>() / self.length as f64;
        let avg = (mid + sma) / 2.0;
        let data: Vec<f64> = self.window.to_array().iter().map(|v| v - avg).collect();
        let n = data.len() as f64;
        let sum_x: f64 = (0..data.len()).map(|i| i as f64).sum();
        let sum_y: f64 = data.iter().sum();
        let sum_xy: f64 = data.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
        let sum_xx: f64 = (0..data.len()).map(|i| (i as f64).powi(2)).sum();
        let denom = n * sum_xx - sum_x * sum_x;
        let momentum = if denom == 0.0 {
            *data.last().unwrap()
        } else {
            let slope = (n * sum_xy - sum_x * sum_y) / denom;
            let intercept = (sum_y - slope * sum_x) / n;
            intercept + slope * (n - 1.0)
        };

        IndicatorOutput::Multi(vec![
            ("momentum", momentum),
            ("squeeze_on", if squeeze_on { 1.0 } else { 0.0 }),
        ])
    }

    fn is_ready(&self) -> bool {
        self.bb.is_ready() && self.kc.is_ready()
    }

    fn reset(&mut self) {
        self.bb.reset();
        self.kc.reset();
        self.window.clear();
        self.highs.clear();
        self.lows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64, o: f64, h: f64, l: f64, c: f64, v: f64) -> Candle {
        Candle::new(ts, ts + 60_000, o, h, l, c, v, 1).unwrap()
    }

    #[test]
    fn williams_r_at_window_high_is_zero() {
        let mut wr = WilliamsR::new(2);
        wr.update(&candle(0, 1.0, 5.0, 1.0, 3.0, 1.0), 0.0);
        wr.update(&candle(60_000, 1.0, 10.0, 2.0, 10.0, 1.0), 0.0);
        assert_eq!(wr.value().scalar(), 0.0);
    }

    #[test]
    fn roc_zero_change_is_zero() {
        let mut roc = Roc::new(2);
        for _ in 0..3 {
            roc.update(&candle(0, 1.0, 1.0, 1.0, 10.0, 1.0), 10.0);
        }
        assert_eq!(roc.value().scalar(), 0.0);
    }

    #[test]
    fn fisher_is_ready_only_one_bar_past_window() {
        let mut fisher = Fisher::new(3);
        for i in 0..3 {
            fisher.update(&candle(i * 60_000, 1.0, 1.0, 1.0, 1.0 + i as f64, 1.0), 1.0 + i as f64);
            assert!(!fisher.is_ready());
        }
        fisher.update(&candle(3 * 60_000, 1.0, 1.0, 1.0, 4.0, 1.0), 4.0);
        assert!(fisher.is_ready());
    }

    #[test]
    fn cmo_fully_up_move_is_100() {
        let mut cmo = Cmo::new(2);
        cmo.update(&candle(0, 1.0, 1.0, 1.0, 1.0, 1.0), 1.0);
        cmo.update(&candle(60_000, 1.0, 1.0, 1.0, 2.0, 1.0), 2.0);
        cmo.update(&candle(120_000, 1.0, 1.0, 1.0, 3.0, 1.0), 3.0);
        assert_eq!(cmo.value().scalar(), 100.0);
    }
}
