//! Trend: consumes [`crate::swing::Swing`], classifies the wave sequence as up/down/ranging
//! (§4.3).

use crate::core::{Detector, DetectorContext};
use playbook_instrument::snapshot::FieldValue;
use playbook_instrument::Candle;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Polarity {
    High,
    Low,
}

#[derive(Debug, Clone, Copy)]
struct WavePoint {
    polarity: Polarity,
    price: f64,
}

/// Classifies the last few confirmed swing points into a directional bias: an up-trend needs a
/// higher high and a higher low versus the prior same-polarity points; a down-trend needs a
/// lower high and a lower low; anything else is ranging. `strength` counts how many of the two
/// confirming criteria hold (`0..=2`); `bars_in_trend` counts bars since the direction last
/// changed.
#[derive(Debug)]
pub struct Trend {
    history: VecDeque<WavePoint>,
    swing_dep: &'static str,
    last_seen_pair_version: Option<f64>,
    direction: i8,
    strength: f64,
    bars_in_trend: u64,
    ready: bool,
}

impl Trend {
    pub fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(4),
            swing_dep: "swing",
            last_seen_pair_version: None,
            direction: 0,
            strength: 0.0,
            bars_in_trend: 0,
            ready: false,
        }
    }

    fn classify(&mut self) {
        let pts: Vec<&WavePoint> = self.history.iter().collect();
        if pts.len() < 4 {
            return;
        }
        // Most recent two highs and two lows among the last 4 alternating points.
        let highs: Vec<f64> = pts.iter().filter(|p| p.polarity == Polarity::High).map(|p| p.price).collect();
        let lows: Vec<f64> = pts.iter().filter(|p| p.polarity == Polarity::Low).map(|p| p.price).collect();
        if highs.len() < 2 || lows.len() < 2 {
            return;
        }
        let higher_high = highs[highs.len() - 1] > highs[highs.len() - 2];
        let higher_low = lows[lows.len() - 1] > lows[lows.len() - 2];
        let lower_high = highs[highs.len() - 1] < highs[highs.len() - 2];
        let lower_low = lows[lows.len() - 1] < lows[lows.len() - 2];

        let new_direction;
        let new_strength;
        if higher_high && higher_low {
            new_direction = 1;
            new_strength = 2.0;
        } else if lower_high && lower_low {
            new_direction = -1;
            new_strength = 2.0;
        } else if higher_high || higher_low {
            new_direction = 1;
            new_strength = 1.0;
        } else if lower_high || lower_low {
            new_direction = -1;
            new_strength = 1.0;
        } else {
            new_direction = 0;
            new_strength = 0.0;
        }

        if new_direction != self.direction {
            self.bars_in_trend = 0;
        }
        self.direction = new_direction;
        self.strength = new_strength;
        self.ready = true;
    }
}

impl Default for Trend {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for Trend {
    fn update(&mut self, _bar_idx: u64, _candle: &Candle, ctx: &DetectorContext<'_>) {
        self.bars_in_trend += 1;

        let Some(swing) = ctx.dep(self.swing_dep) else {
            return;
        };
        let Some(FieldValue::Number(pair_version)) = swing.get("pair_version") else {
            return;
        };
        if self.last_seen_pair_version == Some(pair_version) {
            return;
        }
        self.last_seen_pair_version = Some(pair_version);

        let Some(FieldValue::Symbol(direction)) = swing.get("pair_direction") else {
            return;
        };
        let (polarity, price) = if direction.as_str() == "bullish" {
            match swing.get("high_level") {
                Some(FieldValue::Number(v)) => (Polarity::High, v),
                _ => return,
            }
        } else {
            match swing.get("low_level") {
                Some(FieldValue::Number(v)) => (Polarity::Low, v),
                _ => return,
            }
        };

        if self.history.len() == 4 {
            self.history.pop_front();
        }
        self.history.push_back(WavePoint { polarity, price });
        self.classify();
    }

    fn get(&self, field: &str) -> Option<FieldValue> {
        match field {
            "direction" => Some(FieldValue::from(self.direction as f64)),
            "strength" => Some(FieldValue::from(self.strength)),
            "bars_in_trend" => Some(FieldValue::from(self.bars_in_trend as f64)),
            _ => None,
        }
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn reset(&mut self) {
        self.history.clear();
        self.last_seen_pair_version = None;
        self.direction = 0;
        self.strength = 0.0;
        self.bars_in_trend = 0;
        self.ready = false;
    }
}
