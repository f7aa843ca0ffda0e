//! Zone: consumes [`crate::swing::Swing`] and an ATR indicator value, producing a single
//! demand/supply band around the latest swing level (§4.3).

use crate::core::{Detector, DetectorContext};
use playbook_instrument::snapshot::FieldValue;
use playbook_instrument::Candle;
use smol_str::SmolStr;

/// Lifecycle of a single [`Zone`]: `None` before any swing has been seen, `Active` while price
/// has not yet closed through the band, `Broken` once it has — permanent until a new swing
/// replaces the zone entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneState {
    None,
    Active,
    Broken,
}

impl ZoneState {
    fn as_str(self) -> &'static str {
        match self {
            ZoneState::None => "NONE",
            ZoneState::Active => "ACTIVE",
            ZoneState::Broken => "BROKEN",
        }
    }
}

/// Demand/supply band anchored to the most recent confirmed swing pivot, widened by a multiple
/// of ATR. If the ATR indicator is missing, the zone degenerates to zero width rather than
/// erroring — a warn-once happens at first activation (the caller's logging layer owns emitting
/// it; this type only tracks whether it has already degenerated once via `warned_missing_atr`).
#[derive(Debug)]
pub struct Zone {
    k: f64,
    atr_indicator_id: SmolStr,
    swing_dep: &'static str,
    use_high: bool,
    last_seen_pair_version: Option<f64>,
    upper: Option<f64>,
    lower: Option<f64>,
    state: ZoneState,
    pub warned_missing_atr: bool,
}

impl Zone {
    pub fn new(k: f64, atr_indicator_id: SmolStr, use_high: bool) -> Self {
        Self {
            k,
            atr_indicator_id,
            swing_dep: "swing",
            use_high,
            last_seen_pair_version: None,
            upper: None,
            lower: None,
            state: ZoneState::None,
            warned_missing_atr: false,
        }
    }
}

impl Detector for Zone {
    fn update(&mut self, _bar_idx: u64, candle: &Candle, ctx: &DetectorContext<'_>) {
        let Some(swing) = ctx.dep(self.swing_dep) else {
            return;
        };
        let Some(FieldValue::Number(pair_version)) = swing.get("pair_version") else {
            return;
        };

        if self.last_seen_pair_version != Some(pair_version) {
            self.last_seen_pair_version = Some(pair_version);
            let level = if self.use_high {
                swing.get("high_level")
            } else {
                swing.get("low_level")
            };
            if let Some(FieldValue::Number(level)) = level {
                let atr = ctx.indicator_field(self.atr_indicator_id.as_str(), "value").and_then(|v| v.as_f64());
                let width = match atr {
                    Some(atr) => self.k * atr,
                    None => {
                        self.warned_missing_atr = true;
                        0.0
                    }
                };
                self.upper = Some(level + width);
                self.lower = Some(level - width);
                self.state = ZoneState::Active;
            }
        }

        if self.state == ZoneState::Active {
            if let (Some(upper), Some(lower)) = (self.upper, self.lower) {
                let broken = if self.use_high {
                    candle.close > upper
                } else {
                    candle.close < lower
                };
                if broken {
                    self.state = ZoneState::Broken;
                }
            }
        }
    }

    fn get(&self, field: &str) -> Option<FieldValue> {
        match field {
            "upper" => self.upper.map(FieldValue::from),
            "lower" => self.lower.map(FieldValue::from),
            "state" => Some(FieldValue::from(self.state.as_str())),
            _ => None,
        }
    }

    fn is_ready(&self) -> bool {
        self.state != ZoneState::None
    }

    fn reset(&mut self) {
        self.last_seen_pair_version = None;
        self.upper = None;
        self.lower = None;
        self.state = ZoneState::None;
        self.warned_missing_atr = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swing::Swing;
    use std::collections::HashMap;

    fn candle(ts: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle::new(ts, ts + 60_000, o, h, l, c, 1.0, 1).unwrap()
    }

    #[test]
    fn degenerates_to_zero_width_without_atr() {
        let mut swing = Swing::new(1, 1, None, None, None);
        let mut zone = Zone::new(2.0, SmolStr::new("atr_missing"), true);
        let indicators = HashMap::new();
        let pts = [
            (1.0, 1.0, 1.0),
            (1.0, 5.0, 1.0), // fractal high
            (1.0, 1.0, 1.0),
        ];
        for (i, (o, h, l)) in pts.into_iter().enumerate() {
            let c = candle(i as i64 * 60_000, o, h, l, o);
            let ctx = DetectorContext { deps: HashMap::new(), indicators: &indicators };
            swing.update(i as u64, &c, &ctx);
            let mut deps: HashMap<&str, &dyn Detector> = HashMap::new();
            deps.insert("swing", &swing);
            let zone_ctx = DetectorContext { deps, indicators: &indicators };
            zone.update(i as u64, &c, &zone_ctx);
        }
        assert!(zone.warned_missing_atr);
        assert_eq!(zone.get("upper"), zone.get("lower"));
    }

    #[test]
    fn breaks_permanently_once_price_closes_through() {
        let mut zone = Zone::new(1.0, SmolStr::new("atr"), true);
        zone.upper = Some(10.0);
        zone.lower = Some(8.0);
        zone.state = ZoneState::Active;
        let indicators = HashMap::new();
        let ctx = DetectorContext { deps: HashMap::new(), indicators: &indicators };
        zone.update(0, &candle(0, 9.0, 11.0, 9.0, 11.0), &ctx);
        assert_eq!(zone.state, ZoneState::Broken);
    }
}
