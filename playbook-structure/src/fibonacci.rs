//! Fibonacci: consumes [`crate::swing::Swing`] and optionally [`crate::trend::Trend`] (§4.3).

use crate::core::{Detector, DetectorContext};
use indexmap::IndexMap;
use playbook_instrument::snapshot::FieldValue;
use playbook_instrument::Candle;
use smol_str::SmolStr;

/// When levels recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FibMode {
    /// Recompute every time the swing source completes a new pair.
    Paired,
    /// Recompute on a new pair only while a trend dependency reports a non-zero direction;
    /// levels freeze (keep their last value) while the trend is ranging.
    TrendAnchored,
}

/// Canonical level-key formatting: 3 decimal places, trailing zeros and a trailing `.` stripped
/// (`level_0.618`, `level_1`, `level_2`), matching how the DSL normalizes `fib.level[0.618]`.
pub fn level_key(ratio: f64) -> SmolStr {
    let formatted = format!("{ratio:.3}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    SmolStr::new(format!("level_{trimmed}"))
}

/// Retracement (and, via ratios outside `[0, 1]`, extension) level calculator:
/// `level = high - ratio * (high - low)`.
#[derive(Debug)]
pub struct Fibonacci {
    ratios: Vec<f64>,
    mode: FibMode,
    swing_dep: &'static str,
    trend_dep: &'static str,
    last_seen_pair_version: Option<f64>,
    levels: IndexMap<SmolStr, f64>,
}

impl Fibonacci {
    pub fn new(ratios: Vec<f64>, mode: FibMode) -> Self {
        Self {
            ratios,
            mode,
            swing_dep: "swing",
            trend_dep: "trend",
            last_seen_pair_version: None,
            levels: IndexMap::new(),
        }
    }

    fn recompute(&mut self, high: f64, low: f64) {
        self.levels.clear();
        for &ratio in &self.ratios {
            self.levels.insert(level_key(ratio), high - ratio * (high - low));
        }
    }
}

impl Detector for Fibonacci {
    fn update(&mut self, _bar_idx: u64, _candle: &Candle, ctx: &DetectorContext<'_>) {
        let Some(swing) = ctx.dep(self.swing_dep) else {
            return;
        };
        let Some(FieldValue::Number(pair_version)) = swing.get("pair_version") else {
            return;
        };
        if self.last_seen_pair_version == Some(pair_version) {
            return;
        }

        if self.mode == FibMode::TrendAnchored {
            let ranging = ctx
                .dep(self.trend_dep)
                .and_then(|trend| trend.get("direction"))
                .and_then(|v| v.as_f64())
                .map(|d| d == 0.0)
                .unwrap_or(true);
            if ranging {
                return;
            }
        }

        self.last_seen_pair_version = Some(pair_version);
        let (Some(FieldValue::Number(high)), Some(FieldValue::Number(low))) =
            (swing.get("high_level"), swing.get("low_level"))
        else {
            return;
        };
        self.recompute(high, low);
    }

    fn get(&self, field: &str) -> Option<FieldValue> {
        self.levels.get(field).copied().map(FieldValue::from)
    }

    fn is_ready(&self) -> bool {
        !self.levels.is_empty()
    }

    fn reset(&mut self) {
        self.last_seen_pair_version = None;
        self.levels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_key_strips_trailing_zeros() {
        assert_eq!(level_key(0.618).as_str(), "level_0.618");
        assert_eq!(level_key(1.0).as_str(), "level_1");
        assert_eq!(level_key(2.0).as_str(), "level_2");
    }

    #[test]
    fn recompute_yields_expected_retracement() {
        let mut fib = Fibonacci::new(vec![0.618], FibMode::Paired);
        fib.recompute(200.0, 100.0);
        assert_eq!(fib.get("level_0.618"), Some(FieldValue::Number(200.0 - 0.618 * 100.0)));
    }
}
