use playbook_instrument::Candle;

/// An indicator's value at the current bar: either a single scalar (EMA, RSI, ...) or a small
/// struct of named outputs (MACD's `{macd, signal, histogram}`, Bollinger's four bands, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorOutput {
    Scalar(f64),
    Multi(Vec<(&'static str, f64)>),
}

impl IndicatorOutput {
    /// The `"value"`-style scalar read, for indicators that only ever have one output.
    pub fn scalar(&self) -> f64 {
        match self {
            IndicatorOutput::Scalar(v) => *v,
            IndicatorOutput::Multi(fields) => fields.first().map(|(_, v)| *v).unwrap_or(f64::NAN),
        }
    }

    pub fn field(&self, key: &str) -> Option<f64> {
        match self {
            IndicatorOutput::Scalar(v) => (key == "value").then_some(*v),
            IndicatorOutput::Multi(fields) => {
                fields.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
            }
        }
    }
}

/// Every incremental indicator (§4.2): pure streaming computation over closed bars with a strict
/// warmup gate. All indicators are O(1) per update except WMA/TRIMA/LINREG (O(window) by nature)
/// and CCI's `value()` getter (O(window), documented on [`crate::momentum::Cci`]).
pub trait Indicator: std::fmt::Debug {
    /// Absorb one more closed bar.
    fn update(&mut self, candle: &Candle, input: f64);

    /// The indicator's current output. Implementations return `f64::NAN` (or per-field NAN)
    /// before `is_ready()`, except where the family's semantics name a specific pre-warmup value
    /// (e.g. RSI's documented `50.0` under "no movement").
    fn value(&self) -> IndicatorOutput;

    /// Whether enough bars have been observed for `value()` to be meaningful.
    fn is_ready(&self) -> bool;

    /// Discard all accumulated state, returning the indicator to its just-constructed form.
    fn reset(&mut self);
}
