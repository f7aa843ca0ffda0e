//! Swing: fractal pivot detector with paired H-L/L-H event emission (§4.3).

use crate::core::{Detector, DetectorContext};
use playbook_instrument::snapshot::FieldValue;
use playbook_instrument::Candle;
use smol_str::SmolStr;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PairDirection {
    Bullish,
    Bearish,
    None,
}

impl PairDirection {
    fn as_str(self) -> &'static str {
        match self {
            PairDirection::Bullish => "bullish",
            PairDirection::Bearish => "bearish",
            PairDirection::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingPivot {
    polarity: Polarity,
    price: f64,
    idx: u64,
}

/// Fractal swing-pivot detector. A bar is a swing high/low iff it is strictly greater/less than
/// every other bar in a `left + 1 + right`-wide window (ties disqualify, per spec). Confirmed
/// pivots feed a small FSM that tracks the last pending pivot of each polarity and emits paired
/// H-L/L-H events under strict alternation; a new pivot of the same polarity as the pending one
/// replaces it rather than starting a new pair.
#[derive(Debug)]
pub struct Swing {
    left: usize,
    right: usize,
    min_atr_move: Option<f64>,
    major_threshold: Option<f64>,
    atr_indicator_id: Option<SmolStr>,
    window: VecDeque<(u64, Candle)>,
    pending: Option<PendingPivot>,
    last_confirmed_high: Option<f64>,
    last_confirmed_low: Option<f64>,
    high_level: Option<f64>,
    low_level: Option<f64>,
    high_idx: Option<u64>,
    low_idx: Option<u64>,
    pair_direction: PairDirection,
    pair_version: u64,
    last_seen_idx: Option<u64>,
}

impl Swing {
    pub fn new(
        left: usize,
        right: usize,
        min_atr_move: Option<f64>,
        major_threshold: Option<f64>,
        atr_indicator_id: Option<SmolStr>,
    ) -> Self {
        assert!(left > 0 && right > 0, "Swing windows must be > 0");
        Self {
            left,
            right,
            min_atr_move,
            major_threshold,
            atr_indicator_id,
            window: VecDeque::with_capacity(left + right + 1),
            pending: None,
            last_confirmed_high: None,
            last_confirmed_low: None,
            high_level: None,
            low_level: None,
            high_idx: None,
            low_idx: None,
            pair_direction: PairDirection::None,
            pair_version: 0,
            last_seen_idx: None,
        }
    }

    fn window_size(&self) -> usize {
        self.left + self.right + 1
    }

    fn passes_significance(&self, candidate_price: f64, reference: Option<f64>, atr: Option<f64>) -> bool {
        let Some(reference) = reference else {
            return true;
        };
        let move_size = (candidate_price - reference).abs();
        if let Some(min_atr_move) = self.min_atr_move {
            if let Some(atr) = atr {
                if move_size < min_atr_move * atr {
                    return false;
                }
            }
        }
        if let Some(major_threshold) = self.major_threshold {
            if move_size < major_threshold {
                return false;
            }
        }
        true
    }

    fn accept_pivot(&mut self, polarity: Polarity, price: f64, idx: u64) {
        match self.pending {
            None => self.pending = Some(PendingPivot { polarity, price, idx }),
            Some(p) if p.polarity == polarity => {
                self.pending = Some(PendingPivot { polarity, price, idx });
            }
            Some(p) => {
                match p.polarity {
                    Polarity::Low => {
                        self.low_level = Some(p.price);
                        self.low_idx = Some(p.idx);
                        self.high_level = Some(price);
                        self.high_idx = Some(idx);
                        self.pair_direction = PairDirection::Bullish;
                    }
                    Polarity::High => {
                        self.high_level = Some(p.price);
                        self.high_idx = Some(p.idx);
                        self.low_level = Some(price);
                        self.low_idx = Some(idx);
                        self.pair_direction = PairDirection::Bearish;
                    }
                }
                self.pair_version += 1;
                self.pending = Some(PendingPivot { polarity, price, idx });
            }
        }
        match polarity {
            Polarity::High => self.last_confirmed_high = Some(price),
            Polarity::Low => self.last_confirmed_low = Some(price),
        }
    }
}

impl Detector for Swing {
    fn update(&mut self, bar_idx: u64, candle: &Candle, ctx: &DetectorContext<'_>) {
        if let Some(last) = self.last_seen_idx {
            assert!(
                bar_idx > last,
                "Swing requires strictly increasing bar_idx: saw {bar_idx}, last {last}"
            );
        }
        self.last_seen_idx = Some(bar_idx);

        self.window.push_back((bar_idx, *candle));
        if self.window.len() > self.window_size() {
            self.window.pop_front();
        }
        if self.window.len() < self.window_size() {
            return;
        }

        let atr = self.atr_indicator_id.as_ref().and_then(|id| {
            ctx.indicator_field(id.as_str(), "value")
                .and_then(|v| v.as_f64())
        });

        let (center_idx, center) = self.window[self.left];
        let is_high = self
            .window
            .iter()
            .enumerate()
            .all(|(i, (_, c))| i == self.left || c.high < center.high);
        let is_low = self
            .window
            .iter()
            .enumerate()
            .all(|(i, (_, c))| i == self.left || c.low > center.low);

        if is_high && self.passes_significance(center.high, self.last_confirmed_low, atr) {
            self.accept_pivot(Polarity::High, center.high, center_idx);
        } else if is_low && self.passes_significance(center.low, self.last_confirmed_high, atr) {
            self.accept_pivot(Polarity::Low, center.low, center_idx);
        }
    }

    fn get(&self, field: &str) -> Option<FieldValue> {
        match field {
            "high_level" => self.high_level.map(FieldValue::from),
            "low_level" => self.low_level.map(FieldValue::from),
            "high_idx" => self.high_idx.map(|v| FieldValue::from(v as f64)),
            "low_idx" => self.low_idx.map(|v| FieldValue::from(v as f64)),
            "pair_direction" => Some(FieldValue::from(self.pair_direction.as_str())),
            "pair_version" => Some(FieldValue::from(self.pair_version as f64)),
            _ => None,
        }
    }

    fn is_ready(&self) -> bool {
        self.high_level.is_some() && self.low_level.is_some()
    }

    fn reset(&mut self) {
        self.window.clear();
        self.pending = None;
        self.last_confirmed_high = None;
        self.last_confirmed_low = None;
        self.high_level = None;
        self.low_level = None;
        self.high_idx = None;
        self.low_idx = None;
        self.pair_direction = PairDirection::None;
        self.pair_version = 0;
        self.last_seen_idx = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn candle(ts: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle::new(ts, ts + 60_000, o, h, l, c, 1.0, 1).unwrap()
    }

    fn empty_ctx() -> DetectorContext<'static> {
        DetectorContext {
            deps: HashMap::new(),
            indicators: Box::leak(Box::new(HashMap::new())),
        }
    }

    #[test]
    fn detects_and_pairs_a_fractal_high_then_low() {
        let mut swing = Swing::new(1, 1, None, None, None);
        let ctx = empty_ctx();
        let closes = [
            (1.0, 1.0, 1.0),
            (1.0, 5.0, 1.0), // fractal high at idx 1
            (1.0, 1.0, 1.0),
            (1.0, 1.0, -5.0), // fractal low at idx 3
            (1.0, 1.0, 1.0),
        ];
        for (i, (o, h, l)) in closes.into_iter().enumerate() {
            swing.update(i as u64, &candle(i as i64 * 60_000, o, h, l, o), &ctx);
        }
        assert!(swing.is_ready());
        assert_eq!(swing.get("high_level"), Some(FieldValue::Number(5.0)));
        assert_eq!(swing.get("low_level"), Some(FieldValue::Number(-5.0)));
        assert_eq!(
            swing.get("pair_direction"),
            Some(FieldValue::Symbol("bearish".into()))
        );
    }

    #[test]
    #[should_panic]
    fn rejects_non_increasing_bar_idx() {
        let mut swing = Swing::new(1, 1, None, None, None);
        let ctx = empty_ctx();
        swing.update(5, &candle(0, 1.0, 1.0, 1.0, 1.0), &ctx);
        swing.update(5, &candle(60_000, 1.0, 1.0, 1.0, 1.0), &ctx);
    }
}
