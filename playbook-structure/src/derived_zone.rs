//! Derived zone (K-slots): regenerates up to `max_active` zones from a pair-versioned source
//! (typically [`crate::swing::Swing`]) whenever the source's version advances (§4.3).

use crate::core::{Detector, DetectorContext};
use playbook_instrument::snapshot::FieldValue;
use playbook_instrument::Candle;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Active,
    Touched,
    Broken,
}

impl SlotState {
    fn as_str(self) -> &'static str {
        match self {
            SlotState::Active => "ACTIVE",
            SlotState::Touched => "TOUCHED",
            SlotState::Broken => "BROKEN",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    upper: f64,
    lower: f64,
    state: SlotState,
    hash: u64,
    created_bar_idx: u64,
}

/// One regenerating slot of the derived-zone pool. `mode` selects which of the pair's two levels
/// the slot straddles (`High` anchors at `high_level`, `Low` at `low_level`); `tolerance_pct`
/// widens the break/touch test by a fraction of the zone's own width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneMode {
    High,
    Low,
}

#[derive(Debug)]
pub struct DerivedZone {
    max_active: usize,
    tolerance_pct: f64,
    mode: ZoneMode,
    source_dep: &'static str,
    last_seen_source_version: Option<f64>,
    slots: Vec<Slot>,
}

impl DerivedZone {
    pub fn new(max_active: usize, tolerance_pct: f64, mode: ZoneMode) -> Self {
        assert!(max_active > 0, "DerivedZone max_active must be > 0");
        Self {
            max_active,
            tolerance_pct,
            mode,
            source_dep: "swing",
            last_seen_source_version: None,
            slots: Vec::new(),
        }
    }

    fn slot_hash(source_version: f64, high_idx: u64, low_idx: u64, level: f64, mode: ZoneMode) -> u64 {
        let mut hasher = DefaultHasher::new();
        source_version.to_bits().hash(&mut hasher);
        high_idx.hash(&mut hasher);
        low_idx.hash(&mut hasher);
        level.to_bits().hash(&mut hasher);
        (mode == ZoneMode::High).hash(&mut hasher);
        hasher.finish()
    }
}

impl Detector for DerivedZone {
    fn update(&mut self, bar_idx: u64, candle: &Candle, ctx: &DetectorContext<'_>) {
        let Some(source) = ctx.dep(self.source_dep) else {
            return;
        };
        let Some(FieldValue::Number(source_version)) = source.get("pair_version") else {
            return;
        };

        if self.last_seen_source_version != Some(source_version) {
            self.last_seen_source_version = Some(source_version);

            let level = match self.mode {
                ZoneMode::High => source.get("high_level"),
                ZoneMode::Low => source.get("low_level"),
            };
            let high_idx = source.get("high_idx").and_then(|v| v.as_f64()).unwrap_or(0.0) as u64;
            let low_idx = source.get("low_idx").and_then(|v| v.as_f64()).unwrap_or(0.0) as u64;

            if let Some(FieldValue::Number(level)) = level {
                let width = level.abs() * self.tolerance_pct;
                let (upper, lower) = match self.mode {
                    ZoneMode::High => (level + width, level - width),
                    ZoneMode::Low => (level + width, level - width),
                };
                let hash = Self::slot_hash(source_version, high_idx, low_idx, level, self.mode);

                let mut regenerated = vec![Slot {
                    upper,
                    lower,
                    state: SlotState::Active,
                    hash,
                    created_bar_idx: bar_idx,
                }];
                regenerated.extend(self.slots.drain(..).take(self.max_active.saturating_sub(1)));
                self.slots = regenerated;
            }
        }

        for slot in self.slots.iter_mut() {
            if slot.created_bar_idx == bar_idx {
                continue; // break detection skips the creation bar.
            }
            if slot.state == SlotState::Broken {
                continue;
            }
            let touched = candle.low <= slot.upper && candle.high >= slot.lower;
            let broken = candle.close > slot.upper || candle.close < slot.lower;
            if broken {
                slot.state = SlotState::Broken;
            } else if touched {
                slot.state = SlotState::Touched;
            }
        }
    }

    fn get(&self, field: &str) -> Option<FieldValue> {
        let (slot_idx, sub_field) = field.split_once('.').unwrap_or((field, ""));
        let idx: usize = slot_idx.strip_prefix("zone_")?.parse().ok()?;
        let slot = self.slots.get(idx)?;
        match sub_field {
            "upper" => Some(FieldValue::from(slot.upper)),
            "lower" => Some(FieldValue::from(slot.lower)),
            "state" => Some(FieldValue::from(slot.state.as_str())),
            "hash" => Some(FieldValue::from(slot.hash as f64)),
            _ => None,
        }
    }

    fn is_ready(&self) -> bool {
        !self.slots.is_empty()
    }

    fn reset(&mut self) {
        self.last_seen_source_version = None;
        self.slots.clear();
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
    fn regenerates_most_recent_first_and_caps_at_max_active() {
        let mut swing = Swing::new(1, 1, None, None, None);
        let mut dz = DerivedZone::new(2, 0.01, ZoneMode::High);
        let indicators = HashMap::new();

        let pts = [
            (1.0, 1.0, 1.0),
            (1.0, 1.0, -5.0), // low pivot
            (1.0, 1.0, 1.0),
            (1.0, 10.0, 1.0), // high pivot -> first pair
            (1.0, 1.0, 1.0),
            (1.0, 1.0, -8.0), // low pivot
            (1.0, 1.0, 1.0),
            (1.0, 12.0, 1.0), // high pivot -> second pair
            (1.0, 1.0, 1.0),
        ];
        for (i, (o, h, l)) in pts.into_iter().enumerate() {
            let c = candle(i as i64 * 60_000, o, h, l, o);
            let ctx = DetectorContext { deps: HashMap::new(), indicators: &indicators };
            swing.update(i as u64, &c, &ctx);
            let mut deps: HashMap<&str, &dyn Detector> = HashMap::new();
            deps.insert("swing", &swing);
            let dz_ctx = DetectorContext { deps, indicators: &indicators };
            dz.update(i as u64, &c, &dz_ctx);
        }
        assert!(dz.is_ready());
        assert!(dz.slots.len() <= 2);
        // Most recent pair's high (12.0) should be slot 0.
        let FieldValue::Number(upper0) = dz.get("zone_0.upper").unwrap() else { panic!() };
        assert!(upper0 > 12.0);
    }

    #[test]
    fn break_detection_skips_creation_bar() {
        let mut dz = DerivedZone::new(1, 0.0, ZoneMode::High);
        dz.slots.push(Slot {
            upper: 10.0,
            lower: 10.0,
            state: SlotState::Active,
            hash: 0,
            created_bar_idx: 5,
        });
        let indicators = HashMap::new();
        let ctx = DetectorContext { deps: HashMap::new(), indicators: &indicators };
        dz.update(5, &candle(0, 20.0, 20.0, 20.0, 20.0), &ctx);
        assert_eq!(dz.slots[0].state, SlotState::Active);
    }
}
