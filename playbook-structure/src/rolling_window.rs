//! Rolling window: `min` or `max` of the last `size` closed bars, via the shared
//! [`playbook_ta::MonotonicDeque`] primitive (§4.3).

use crate::core::{Detector, DetectorContext};
use playbook_instrument::snapshot::FieldValue;
use playbook_instrument::Candle;
use playbook_ta::{DequeMode, MonotonicDeque};

#[derive(Debug)]
pub struct RollingWindow {
    deque: MonotonicDeque,
    size: usize,
    count: u64,
    input: fn(&Candle) -> f64,
}

impl RollingWindow {
    pub fn new(size: usize, mode: DequeMode, input: fn(&Candle) -> f64) -> Self {
        Self {
            deque: MonotonicDeque::new(size, mode),
            size,
            count: 0,
            input,
        }
    }

    pub fn high(size: usize, mode: DequeMode) -> Self {
        Self::new(size, mode, |c| c.high)
    }

    pub fn low(size: usize, mode: DequeMode) -> Self {
        Self::new(size, mode, |c| c.low)
    }
}

impl Detector for RollingWindow {
    fn update(&mut self, bar_idx: u64, candle: &Candle, _ctx: &DetectorContext<'_>) {
        self.deque.push(bar_idx, (self.input)(candle));
        self.count += 1;
    }

    fn get(&self, field: &str) -> Option<FieldValue> {
        match field {
            "value" => self.deque.front().map(FieldValue::from),
            _ => None,
        }
    }

    fn is_ready(&self) -> bool {
        self.count >= self.size as u64
    }

    fn reset(&mut self) {
        self.deque.clear();
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn candle(ts: i64, h: f64, l: f64) -> Candle {
        Candle::new(ts, ts + 60_000, h, h, l, h, 1.0, 1).unwrap()
    }

    #[test]
    fn tracks_rolling_max_of_highs() {
        let mut rw = RollingWindow::high(3, DequeMode::Max);
        let indicators = HashMap::new();
        let ctx = DetectorContext { deps: HashMap::new(), indicators: &indicators };
        for (i, h) in [1.0, 5.0, 2.0, 1.0].into_iter().enumerate() {
            rw.update(i as u64, &candle(i as i64, h, h - 1.0), &ctx);
        }
        assert!(rw.is_ready());
        // window_size=3 over indices [1,2,3] (index 0 evicted): highs 5, 2, 1 -> max 5.
        assert_eq!(rw.get("value"), Some(FieldValue::Number(5.0)));
    }
}
