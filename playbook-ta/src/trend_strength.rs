//! Directional/trend-strength indicator family (§4.2): Aroon, Vortex, DM, ADX, PSAR.

use crate::core::{Indicator, IndicatorOutput};
use crate::primitives::{DequeMode, MonotonicDeque};
use crate::volatility::WilderSmoother;
use playbook_instrument::Candle;
use std::collections::VecDeque;

fn true_range(candle: &Candle, prev_close: Option<f64>) -> f64 {
    match prev_close {
        None => candle.high - candle.low,
        Some(prev_close) => (candle.high - candle.low)
            .max((candle.high - prev_close).abs())
            .max((candle.low - prev_close).abs()),
    }
}

/// Aroon: `{aroon_up, aroon_down}`, each `100 * (length - bars_since_extreme) / length`.
#[derive(Debug, Clone)]
pub struct Aroon {
    length: usize,
    highs: MonotonicDeque,
    lows: MonotonicDeque,
    index: u64,
    count: usize,
}

impl Aroon {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            highs: MonotonicDeque::new(length + 1, DequeMode::Max),
            lows: MonotonicDeque::new(length + 1, DequeMode::Min),
            index: 0,
            count: 0,
        }
    }
}

impl Indicator for Aroon {
    fn update(&mut self, candle: &Candle, _input: f64) {
        self.highs.push(self.index, candle.high);
        self.lows.push(self.index, candle.low);
        self.index += 1;
        self.count += 1;
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Multi(vec![("aroon_up", f64::NAN), ("aroon_down", f64::NAN)]);
        }
        let current = self.index - 1;
        let bars_since_high = current - self.highs.front_index().unwrap();
        let bars_since_low = current - self.lows.front_index().unwrap();
        let up = 100.0 * (self.length as f64 - bars_since_high as f64) / self.length as f64;
        let down = 100.0 * (self.length as f64 - bars_since_low as f64) / self.length as f64;
        IndicatorOutput::Multi(vec![("aroon_up", up), ("aroon_down", down)])
    }

    fn is_ready(&self) -> bool {
        self.count >= self.length + 1
    }

    fn reset(&mut self) {
        self.highs.clear();
        self.lows.clear();
        self.index = 0;
        self.count = 0;
    }
}

/// Vortex indicator: `{vi_plus, vi_minus}`, the ratio of directional movement to true range
/// summed over a rolling `length`-bar window.
#[derive(Debug, Clone)]
pub struct Vortex {
    length: usize,
    prev: Option<(f64, f64, f64)>, // (prev_high, prev_low, prev_close)
    vm_plus: VecDeque<f64>,
    vm_minus: VecDeque<f64>,
    tr: VecDeque<f64>,
    sum_vm_plus: f64,
    sum_vm_minus: f64,
    sum_tr: f64,
    count: usize,
}

impl Vortex {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            prev: None,
            vm_plus: VecDeque::with_capacity(length),
            vm_minus: VecDeque::with_capacity(length),
            tr: VecDeque::with_capacity(length),
            sum_vm_plus: 0.0,
            sum_vm_minus: 0.0,
            sum_tr: 0.0,
            count: 0,
        }
    }
}

impl Indicator for Vortex {
    fn update(&mut self, candle: &Candle, _input: f64) {
        let (vm_plus, vm_minus, tr) = match self.prev {
            None => (0.0, 0.0, candle.high - candle.low),
            Some((prev_high, prev_low, prev_close)) => (
                (candle.high - prev_low).abs(),
                (candle.low - prev_high).abs(),
                true_range(candle, Some(prev_close)),
            ),
        };
        self.prev = Some((candle.high, candle.low, candle.close));
        self.count += 1;

        self.vm_plus.push_back(vm_plus);
        self.vm_minus.push_back(vm_minus);
        self.tr.push_back(tr);
        self.sum_vm_plus += vm_plus;
        self.sum_vm_minus += vm_minus;
        self.sum_tr += tr;
        if self.vm_plus.len() > self.length {
            self.sum_vm_plus -= self.vm_plus.pop_front().unwrap();
            self.sum_vm_minus -= self.vm_minus.pop_front().unwrap();
            self.sum_tr -= self.tr.pop_front().unwrap();
        }
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() || self.sum_tr == 0.0 {
            return IndicatorOutput::Multi(vec![("vi_plus", f64::NAN), ("vi_minus", f64::NAN)]);
        }
        IndicatorOutput::Multi(vec![
            ("vi_plus", self.sum_vm_plus / self.sum_tr),
            ("vi_minus", self.sum_vm_minus / self.sum_tr),
        ])
    }

    fn is_ready(&self) -> bool {
        self.vm_plus.len() >= self.length
    }

    fn reset(&mut self) {
        self.prev = None;
        self.vm_plus.clear();
        self.vm_minus.clear();
        self.tr.clear();
        self.sum_vm_plus = 0.0;
        self.sum_vm_minus = 0.0;
        self.sum_tr = 0.0;
        self.count = 0;
    }
}

/// Directional movement: `{plus_di, minus_di}`, Wilder-smoothed `+DM`/`-DM` normalized by a
/// Wilder-smoothed true range. `ADX` chains this (§4.2).
#[derive(Debug, Clone)]
pub struct Dm {
    length: usize,
    prev: Option<(f64, f64, f64)>,
    plus_dm: WilderSmoother,
    minus_dm: WilderSmoother,
    atr: WilderSmoother,
}

impl Dm {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            prev: None,
            plus_dm: WilderSmoother::new(length),
            minus_dm: WilderSmoother::new(length),
            atr: WilderSmoother::new(length),
        }
    }

    pub(crate) fn plus_di(&self) -> Option<f64> {
        match (self.plus_dm.value(), self.atr.value()) {
            (Some(dm), Some(atr)) if atr > 0.0 => Some(100.0 * dm / atr),
            _ => None,
        }
    }

    pub(crate) fn minus_di(&self) -> Option<f64> {
        match (self.minus_dm.value(), self.atr.value()) {
            (Some(dm), Some(atr)) if atr > 0.0 => Some(100.0 * dm / atr),
            _ => None,
        }
    }

    pub(crate) fn update_raw(&mut self, candle: &Candle) {
        let (plus_dm, minus_dm, tr) = match self.prev {
            None => (0.0, 0.0, candle.high - candle.low),
            Some((prev_high, prev_low, prev_close)) => {
                let up_move = candle.high - prev_high;
                let down_move = prev_low - candle.low;
                let plus = if up_move > down_move && up_move > 0.0 {
                    up_move
                } else {
                    0.0
                };
                let minus = if down_move > up_move && down_move > 0.0 {
                    down_move
                } else {
                    0.0
                };
                (plus, minus, true_range(candle, Some(prev_close)))
            }
        };
        self.prev = Some((candle.high, candle.low, candle.close));
        self.plus_dm.update(plus_dm);
        self.minus_dm.update(minus_dm);
        self.atr.update(tr);
    }
}

impl Indicator for Dm {
    fn update(&mut self, candle: &Candle, _input: f64) {
        self.update_raw(candle);
    }

    fn value(&self) -> IndicatorOutput {
        IndicatorOutput::Multi(vec![
            ("plus_di", self.plus_di().unwrap_or(f64::NAN)),
            ("minus_di", self.minus_di().unwrap_or(f64::NAN)),
        ])
    }

    fn is_ready(&self) -> bool {
        self.plus_di().is_some() && self.minus_di().is_some()
    }

    fn reset(&mut self) {
        self.prev = None;
        self.plus_dm.reset();
        self.minus_dm.reset();
        self.atr.reset();
        // length kept; nothing else to reset.
        let _ = self.length;
    }
}

/// Average directional index: Wilder-smoothed `DX = 100*|+DI - -DI|/(+DI + -DI)`.
///
/// `is_ready` iff at least one `DX` value has been computed (§4.2); the warmup budget callers
/// should reserve is `2 * length` bars, since `DM`'s own `+DI`/`-DI` need `length` bars before the
/// first `DX` exists.
#[derive(Debug, Clone)]
pub struct Adx {
    dm: Dm,
    dx_smoother: WilderSmoother,
    first_dx_seen: bool,
}

impl Adx {
    pub fn new(length: usize) -> Self {
        Self {
            dm: Dm::new(length),
            dx_smoother: WilderSmoother::new(length),
            first_dx_seen: false,
        }
    }
}

impl Indicator for Adx {
    fn update(&mut self, candle: &Candle, input: f64) {
        self.dm.update(candle, input);
        if let (Some(plus_di), Some(minus_di)) = (self.dm.plus_di(), self.dm.minus_di()) {
            let sum = plus_di + minus_di;
            let dx = if sum > 0.0 {
                100.0 * (plus_di - minus_di).abs() / sum
            } else {
                0.0
            };
            self.dx_smoother.update(dx);
            self.first_dx_seen = true;
        }
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Scalar(f64::NAN);
        }
        IndicatorOutput::Scalar(self.dx_smoother.value().unwrap_or(f64::NAN))
    }

    fn is_ready(&self) -> bool {
        self.first_dx_seen
    }

    fn reset(&mut self) {
        self.dm.reset();
        self.dx_smoother.reset();
        self.first_dx_seen = false;
    }
}

/// Parabolic SAR: trend-following stop-and-reverse level. Outputs `{value, direction}`.
#[derive(Debug, Clone)]
pub struct Psar {
    af_step: f64,
    af_max: f64,
    af: f64,
    direction: i8,
    sar: Option<f64>,
    extreme: f64,
    prev_candle: Option<Candle>,
    bars_seen: usize,
}

impl Psar {
    pub fn new(af_step: f64, af_max: f64) -> Self {
        Self {
            af_step,
            af_max,
            af: af_step,
            direction: 1,
            sar: None,
            extreme: f64::NAN,
            prev_candle: None,
            bars_seen: 0,
        }
    }
}

impl Indicator for Psar {
    fn update(&mut self, candle: &Candle, _input: f64) {
        self.bars_seen += 1;
        let Some(prev) = self.prev_candle else {
            self.prev_candle = Some(*candle);
            self.sar = Some(candle.low);
            self.extreme = candle.high;
            self.direction = 1;
            self.af = self.af_step;
            return;
        };

        let mut sar = self.sar.unwrap_or(prev.low);
        sar += self.af * (self.extreme - sar);

        if self.direction == 1 {
            sar = sar.min(prev.low).min(candle.low);
            if candle.low < sar {
                self.direction = -1;
                sar = self.extreme;
                self.extreme = candle.low;
                self.af = self.af_step;
            } else if candle.high > self.extreme {
                self.extreme = candle.high;
                self.af = (self.af + self.af_step).min(self.af_max);
            }
        } else {
            sar = sar.max(prev.high).max(candle.high);
            if candle.high > sar {
                self.direction = 1;
                sar = self.extreme;
                self.extreme = candle.high;
                self.af = self.af_step;
            } else if candle.low < self.extreme {
                self.extreme = candle.low;
                self.af = (self.af + self.af_step).min(self.af_max);
            }
        }

        self.sar = Some(sar);
        self.prev_candle = Some(*candle);
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Multi(vec![("value", f64::NAN), ("direction", f64::NAN)]);
        }
        IndicatorOutput::Multi(vec![
            ("value", self.sar.unwrap_or(f64::NAN)),
            ("direction", self.direction as f64),
        ])
    }

    fn is_ready(&self) -> bool {
        self.bars_seen >= 2
    }

    fn reset(&mut self) {
        self.af = self.af_step;
        self.direction = 1;
        self.sar = None;
        self.extreme = f64::NAN;
        self.prev_candle = None;
        self.bars_seen = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle::new(ts, ts + 60_000, o, h, l, c, 1.0, 1).unwrap()
    }

    #[test]
    fn aroon_at_extreme_high_reports_100() {
        let mut aroon = Aroon::new(2);
        aroon.update(&candle(0, 1.0, 1.0, 1.0, 1.0), 0.0);
        aroon.update(&candle(60_000, 1.0, 2.0, 1.0, 1.0), 0.0);
        aroon.update(&candle(120_000, 1.0, 3.0, 1.0, 1.0), 0.0);
        let out = aroon.value();
        assert_eq!(out.field("aroon_up"), Some(100.0));
    }

    #[test]
    fn adx_ready_after_first_dx() {
        let mut adx = Adx::new(2);
        for i in 0..4 {
            adx.update(&candle(i * 60_000, 1.0, 10.0 + i as f64, 5.0, 8.0), 0.0);
        }
        assert!(adx.is_ready());
    }
}
