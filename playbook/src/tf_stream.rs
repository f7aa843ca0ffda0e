//! Per-TF-role streaming cache (§4.2, §4.3): owns one role's registered indicators and structure
//! detectors, feeds them closed bars in dependency order, and keeps the current `ValueBundle`s the
//! snapshot builder reads every 1m tick.

use crate::error::{ConfigError, InvariantError};
use indexmap::IndexMap;
use playbook_instrument::snapshot::{FieldHistory, FieldValue, ValueBundle};
use playbook_instrument::{Candle, FeatureDecl, StructureDecl, TfRole, Timeframe};
use playbook_structure::{Detector, DetectorContext, RegisteredStructure};
use playbook_ta::RegisteredIndicator;
use smol_str::SmolStr;
use std::collections::HashMap;

/// One TF role's registered features/structures plus their current values, advanced one closed
/// bar at a time. Indicators update before structures within a bar since a `Zone` reads an ATR
/// feature's value through [`DetectorContext::indicator_field`].
pub struct TfStream {
    pub role: TfRole,
    pub timeframe: Timeframe,
    indicators: IndexMap<SmolStr, (playbook_instrument::InputSource, RegisteredIndicator)>,
    structures: Vec<RegisteredStructure>,
    bar_counter: usize,
    last_ts_close: Option<i64>,
    current_indicator_values: HashMap<SmolStr, ValueBundle>,
    current_structure_values: HashMap<SmolStr, ValueBundle>,
}

impl std::fmt::Debug for TfStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfStream")
            .field("role", &self.role)
            .field("timeframe", &self.timeframe)
            .field("bar_counter", &self.bar_counter)
            .field("last_ts_close", &self.last_ts_close)
            .finish()
    }
}

impl TfStream {
    pub fn build(
        role: TfRole,
        timeframe: Timeframe,
        features: &IndexMap<SmolStr, FeatureDecl>,
        structures: &IndexMap<SmolStr, StructureDecl>,
    ) -> Result<Self, ConfigError> {
        let mut indicators = IndexMap::new();
        for decl in features.values().filter(|d| d.tf_role == role) {
            let registered = playbook_ta::build_indicator(decl)?;
            indicators.insert(decl.id.clone(), (decl.input, registered));
        }

        let decls: Vec<StructureDecl> = structures.values().filter(|d| d.tf_role == role).cloned().collect();
        let built = playbook_structure::build_structures(&decls)?;

        Ok(Self {
            role,
            timeframe,
            indicators,
            structures: built,
            bar_counter: 0,
            last_ts_close: None,
            current_indicator_values: HashMap::new(),
            current_structure_values: HashMap::new(),
        })
    }

    pub fn bar_counter(&self) -> usize {
        self.bar_counter
    }

    pub fn indicator_values(&self) -> &HashMap<SmolStr, ValueBundle> {
        &self.current_indicator_values
    }

    pub fn structure_values(&self) -> &HashMap<SmolStr, ValueBundle> {
        &self.current_structure_values
    }

    /// Absorb one more closed bar for this role: update every indicator, then every structure in
    /// dependency order, rebuilding a fresh [`DetectorContext`] per detector from its
    /// already-updated peers.
    pub fn update(&mut self, candle: &Candle) -> Result<(), InvariantError> {
        if let Some(last) = self.last_ts_close {
            if candle.ts_close <= last {
                return Err(InvariantError::NonMonotonicTimestamp {
                    role: self.role.to_string(),
                    ts: candle.ts_close,
                    last_ts: last,
                });
            }
        }
        self.last_ts_close = Some(candle.ts_close);
        self.bar_counter += 1;
        let bar_idx = self.bar_counter as u64;

        let mut new_indicator_values = HashMap::with_capacity(self.indicators.len());
        for (id, (input_source, registered)) in self.indicators.iter_mut() {
            let input = candle.input(*input_source);
            registered.indicator.update(candle, input);
            let output = registered.indicator.value();
            let previous_bundle = self.current_indicator_values.get(id);

            let mut fields = IndexMap::with_capacity(registered.output_keys.len());
            for key in registered.output_keys {
                let value = output.field(key).map(FieldValue::Number);
                let previous = previous_bundle.and_then(|b| b.field(key)).and_then(|h| h.current.clone());
                fields.insert(SmolStr::new(*key), FieldHistory { current: value, previous });
            }
            new_indicator_values.insert(id.clone(), ValueBundle { fields, is_ready: registered.indicator.is_ready() });
        }
        self.current_indicator_values = new_indicator_values;

        let mut new_structure_values: HashMap<SmolStr, ValueBundle> = HashMap::with_capacity(self.structures.len());
        for i in 0..self.structures.len() {
            let (before, at_and_after) = self.structures.split_at_mut(i);
            let registered = &mut at_and_after[0];

            let mut deps: HashMap<&str, &dyn Detector> = HashMap::with_capacity(registered.deps.len());
            for (dep_name, dep_key) in &registered.deps {
                if let Some(dep) = before.iter().find(|r| &r.key == dep_key) {
                    deps.insert(dep_name.as_str(), dep.detector.as_ref());
                }
            }
            let ctx = DetectorContext { deps, indicators: &self.current_indicator_values };
            registered.detector.update(bar_idx, candle, &ctx);

            let previous_bundle = self.current_structure_values.get(&registered.key);
            let mut fields = IndexMap::with_capacity(registered.output_keys.len());
            for key in &registered.output_keys {
                let value = registered.detector.get(key);
                let previous = previous_bundle.and_then(|b| b.field(key)).and_then(|h| h.current.clone());
                fields.insert(key.clone(), FieldHistory { current: value, previous });
            }
            new_structure_values.insert(registered.key.clone(), ValueBundle { fields, is_ready: registered.detector.is_ready() });
        }
        self.current_structure_values = new_structure_values;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playbook_instrument::ParamValue;

    fn candle(ts_open: i64, close: f64) -> Candle {
        Candle::new(ts_open, ts_open + 60_000, close, close + 1.0, close - 1.0, close, 10.0, 1).unwrap()
    }

    #[test]
    fn rejects_non_monotonic_bars() {
        let mut features = IndexMap::new();
        features.insert(
            SmolStr::new("ema_fast"),
            FeatureDecl {
                id: SmolStr::new("ema_fast"),
                indicator: SmolStr::new("ema"),
                params: {
                    let mut p = IndexMap::new();
                    p.insert(SmolStr::new("length"), ParamValue::Int(5));
                    p
                },
                tf_role: TfRole::LowTf,
                input: Default::default(),
            },
        );
        let mut stream = TfStream::build(TfRole::LowTf, Timeframe::M1, &features, &IndexMap::new()).unwrap();
        stream.update(&candle(0, 100.0)).unwrap();
        assert!(stream.update(&candle(0, 101.0)).is_err());
    }

    #[test]
    fn indicator_becomes_ready_after_its_warmup() {
        let mut features = IndexMap::new();
        features.insert(
            SmolStr::new("ema_fast"),
            FeatureDecl {
                id: SmolStr::new("ema_fast"),
                indicator: SmolStr::new("ema"),
                params: {
                    let mut p = IndexMap::new();
                    p.insert(SmolStr::new("length"), ParamValue::Int(3));
                    p
                },
                tf_role: TfRole::LowTf,
                input: Default::default(),
            },
        );
        let mut stream = TfStream::build(TfRole::LowTf, Timeframe::M1, &features, &IndexMap::new()).unwrap();
        for i in 0..3 {
            stream.update(&candle(i * 60_000, 100.0 + i as f64)).unwrap();
        }
        assert!(stream.indicator_values()["ema_fast"].is_ready);
    }
}
