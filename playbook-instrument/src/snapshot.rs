use crate::candle::{Candle, InputSource};
use indexmap::IndexMap;
use smol_str::SmolStr;
use std::collections::HashMap;

/// A single output field's current and previous-bar value.
///
/// Both indicators and structures expose their outputs this way so the DSL's `cross_above`/
/// `cross_below` operators and windowed conditions can treat every operand uniformly (§4.4).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldHistory {
    pub current: Option<FieldValue>,
    pub previous: Option<FieldValue>,
}

/// A single indicator or structure output value.
///
/// Numeric fields dominate (prices, levels, oscillator values); `Symbol` carries enum-literal
/// outputs (`pair_direction`, `state`, ...) and `Bool` carries per-bar event flags.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Symbol(SmolStr),
    Bool(bool),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            FieldValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            FieldValue::Symbol(_) => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            FieldValue::Symbol(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// True iff the numeric payload is finite; symbols/bools are always considered finite.
    pub fn is_finite(&self) -> bool {
        match self {
            FieldValue::Number(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Symbol(SmolStr::new(v))
    }
}

/// The full set of named outputs a single indicator or structure instance produced for a bar,
/// keyed by output key (`"upper"`, `"bias"`, `"level_0.618"`, ...), together with whether the
/// instance is past warmup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValueBundle {
    pub fields: IndexMap<SmolStr, FieldHistory>,
    pub is_ready: bool,
}

impl ValueBundle {
    pub fn field(&self, key: &str) -> Option<&FieldHistory> {
        self.fields.get(key)
    }
}

/// A read-only view over one evaluation point: the exec-TF candle, the driving 1m candle,
/// per-instance indicator/structure outputs, engine time, and exchange-side quotes (§3 Snapshot).
///
/// Constructed once per evaluation tick and discarded after; never held across bars.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub minute_candle: Candle,
    pub exec_candle: Candle,
    pub ts_open: i64,
    pub ts_close: i64,
    pub exec_index: u64,
    pub last_price: f64,
    pub mark_price: f64,
    pub indicators: HashMap<SmolStr, ValueBundle>,
    pub structures: HashMap<SmolStr, ValueBundle>,
}

impl Snapshot {
    /// Resolve one of the DSL's price references (`close, open, high, low, volume, last_price,
    /// mark_price`) against this evaluation point. `close/open/high/low/volume` read the driving
    /// 1m candle — the finest granularity available inside the sub-loop.
    pub fn price_ref(&self, name: &str) -> Option<f64> {
        match name {
            "close" => Some(self.minute_candle.close),
            "open" => Some(self.minute_candle.open),
            "high" => Some(self.minute_candle.high),
            "low" => Some(self.minute_candle.low),
            "volume" => Some(self.minute_candle.volume),
            "last_price" => Some(self.last_price),
            "mark_price" => Some(self.mark_price),
            _ => None,
        }
    }

    pub fn input_source(&self, source: InputSource) -> f64 {
        self.minute_candle.input(source)
    }

    pub fn indicator(&self, id: &str) -> Option<&ValueBundle> {
        self.indicators.get(id)
    }

    pub fn structure(&self, key: &str) -> Option<&ValueBundle> {
        self.structures.get(key)
    }
}
