//! Volume-based indicator family (§4.2): OBV, CMF, VWAP (session-anchored), Anchored VWAP
//! (externally reset).

use crate::core::{Indicator, IndicatorOutput};
use playbook_instrument::Candle;
use std::collections::VecDeque;

/// On-Balance Volume: running sum of signed volume, `+volume` on an up close, `-volume` on a down
/// close, unchanged on a flat close.
#[derive(Debug, Clone)]
pub struct Obv {
    prev_close: Option<f64>,
    value: f64,
    count: usize,
}

impl Obv {
    pub fn new() -> Self {
        Self {
            prev_close: None,
            value: 0.0,
            count: 0,
        }
    }
}

impl Default for Obv {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Obv {
    fn update(&mut self, candle: &Candle, _input: f64) {
        self.count += 1;
        if let Some(prev) = self.prev_close {
            if candle.close > prev {
                self.value += candle.volume;
            } else if candle.close < prev {
                self.value -= candle.volume;
            }
        }
        self.prev_close = Some(candle.close);
    }

    fn value(&self) -> IndicatorOutput {
        IndicatorOutput::Scalar(self.value)
    }

    fn is_ready(&self) -> bool {
        self.count >= 1
    }

    fn reset(&mut self) {
        self.prev_close = None;
        self.value = 0.0;
        self.count = 0;
    }
}

/// Chaikin Money Flow: rolling `length`-bar ratio of money-flow-volume to total volume.
#[derive(Debug, Clone)]
pub struct Cmf {
    length: usize,
    mfv: VecDeque<f64>,
    vol: VecDeque<f64>,
    sum_mfv: f64,
    sum_vol: f64,
}

impl Cmf {
    pub fn new(length: usize) -> Self {
        Self {
            length,
            mfv: VecDeque::with_capacity(length),
            vol: VecDeque::with_capacity(length),
            sum_mfv: 0.0,
            sum_vol: 0.0,
        }
    }
}

impl Indicator for Cmf {
    fn update(&mut self, candle: &Candle, _input: f64) {
        let range = candle.high - candle.low;
        let mfm = if range > 0.0 {
            ((candle.close - candle.low) - (candle.high - candle.close)) / range
        } else {
            0.0
        };
        let mfv = mfm * candle.volume;
        self.mfv.push_back(mfv);
        self.vol.push_back(candle.volume);
        self.sum_mfv += mfv;
        self.sum_vol += candle.volume;
        if self.mfv.len() > self.length {
            self.sum_mfv -= self.mfv.pop_front().unwrap();
            self.sum_vol -= self.vol.pop_front().unwrap();
        }
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() || self.sum_vol == 0.0 {
            return IndicatorOutput::Scalar(f64::NAN);
        }
        IndicatorOutput::Scalar(self.sum_mfv / self.sum_vol)
    }

    fn is_ready(&self) -> bool {
        self.mfv.len() >= self.length
    }

    fn reset(&mut self) {
        self.mfv.clear();
        self.vol.clear();
        self.sum_mfv = 0.0;
        self.sum_vol = 0.0;
    }
}

/// Session-anchored VWAP: resets its cumulative price*volume / volume sums at a UTC day boundary
/// crossing, derived from each candle's `ts_open`.
#[derive(Debug, Clone)]
pub struct Vwap {
    session_ms: i64,
    anchor_day: Option<i64>,
    cum_pv: f64,
    cum_vol: f64,
}

impl Vwap {
    pub fn new() -> Self {
        Self {
            session_ms: 86_400_000,
            anchor_day: None,
            cum_pv: 0.0,
            cum_vol: 0.0,
        }
    }
}

impl Default for Vwap {
    fn default() -> Self {
        Self::new()
    }
}

impl Indicator for Vwap {
    fn update(&mut self, candle: &Candle, _input: f64) {
        let day = candle.ts_open.div_euclid(self.session_ms);
        if self.anchor_day != Some(day) {
            self.anchor_day = Some(day);
            self.cum_pv = 0.0;
            self.cum_vol = 0.0;
        }
        let typical = candle.hlc3();
        self.cum_pv += typical * candle.volume;
        self.cum_vol += candle.volume;
    }

    fn value(&self) -> IndicatorOutput {
        if !self.is_ready() {
            return IndicatorOutput::Scalar(f64::NAN);
        }
        IndicatorOutput::Scalar(self.cum_pv / self.cum_vol)
    }

    fn is_ready(&self) -> bool {
        self.cum_vol > 0.0
    }

    fn reset(&mut self) {
        self.anchor_day = None;
        self.cum_pv = 0.0;
        self.cum_vol = 0.0;
    }
}

/// VWAP anchored to an externally signalled point (e.g. a swing pivot), rather than a fixed
/// session boundary. Callers bump `anchor_version` whenever the anchor point changes; a version
/// bump clears the running sums on the next `update`.
#[derive(Debug, Clone)]
pub struct AnchoredVwap {
    seen_version: Option<u64>,
    cum_pv: f64,
    cum_vol: f64,
}

impl AnchoredVwap {
    pub fn new() -> Self {
        Self {
            seen_version: None,
            cum_pv: 0.0,
            cum_vol: 0.0,
        }
    }

    pub fn update_with_anchor(&mut self, candle: &Candle, anchor_version: u64) {
        if self.seen_version != Some(anchor_version) {
            self.seen_version = Some(anchor_version);
            self.cum_pv = 0.0;
            self.cum_vol = 0.0;
        }
        let typical = candle.hlc3();
        self.cum_pv += typical * candle.volume;
        self.cum_vol += candle.volume;
    }

    pub fn current(&self) -> Option<f64> {
        (self.cum_vol > 0.0).then_some(self.cum_pv / self.cum_vol)
    }
}

impl Default for AnchoredVwap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle_vol(ts: i64, o: f64, h: f64, l: f64, c: f64, v: f64) -> Candle {
        Candle::new(ts, ts + 60_000, o, h, l, c, v, 1).unwrap()
    }

    #[test]
    fn obv_accumulates_signed_volume() {
        let mut obv = Obv::new();
        obv.update(&candle_vol(0, 1.0, 1.0, 1.0, 10.0, 5.0), 0.0);
        obv.update(&candle_vol(60_000, 1.0, 1.0, 1.0, 12.0, 3.0), 0.0);
        obv.update(&candle_vol(120_000, 1.0, 1.0, 1.0, 11.0, 2.0), 0.0);
        assert_eq!(obv.value().scalar(), 1.0); // 0 + 3 - 2
    }

    #[test]
    fn vwap_resets_on_day_boundary() {
        let mut vwap = Vwap::new();
        vwap.update(&candle_vol(0, 1.0, 1.0, 1.0, 1.0, 10.0), 0.0);
        let day_two_ts = 86_400_000;
        vwap.update(&candle_vol(day_two_ts, 2.0, 2.0, 2.0, 2.0, 10.0), 0.0);
        assert_eq!(vwap.value().scalar(), 2.0);
    }

    #[test]
    fn anchored_vwap_resets_on_version_bump() {
        let mut avwap = AnchoredVwap::new();
        avwap.update_with_anchor(&candle_vol(0, 1.0, 1.0, 1.0, 1.0, 10.0), 1);
        avwap.update_with_anchor(&candle_vol(60_000, 5.0, 5.0, 5.0, 5.0, 10.0), 2);
        assert_eq!(avwap.current(), Some(5.0));
    }
}
