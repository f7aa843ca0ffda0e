use playbook_instrument::snapshot::{FieldValue, ValueBundle};
use playbook_instrument::Candle;
use smol_str::SmolStr;
use std::collections::HashMap;

/// What a detector sees of the rest of the world at update time, beyond the closed bar itself:
/// already-updated peer detectors it depends on (keyed by the `dep_name` from its
/// `StructureDecl.deps`), and the indicator outputs for its TF role (a `Zone` reads its ATR
/// value this way, §4.3).
///
/// Construction-time dependency injection (as spec.md phrases it) is realized here as an
/// update-time reference lookup instead: the engine already updates every TF role's structures in
/// topological order into one indexmap, so handing each detector a borrow of its
/// already-updated peers for the current bar is equivalent and avoids `Rc<RefCell<_>>` plumbing
/// for what are, in practice, single-engine-owned values (§9 redesign notes).
pub struct DetectorContext<'a> {
    pub deps: HashMap<&'a str, &'a dyn Detector>,
    pub indicators: &'a HashMap<SmolStr, ValueBundle>,
}

impl<'a> DetectorContext<'a> {
    pub fn dep(&self, name: &str) -> Option<&'a dyn Detector> {
        self.deps.get(name).copied()
    }

    pub fn indicator_field(&self, indicator_id: &str, field: &str) -> Option<FieldValue> {
        self.indicators
            .get(indicator_id)
            .and_then(|bundle| bundle.field(field))
            .and_then(|history| history.current.clone())
    }
}

/// Every market-structure detector (§4.3): pure streaming computation over closed bars, reading
/// its declared dependencies and indicators through a [`DetectorContext`] rather than holding
/// owned references to them.
pub trait Detector: std::fmt::Debug {
    /// Absorb one more closed bar. `bar_idx` must be strictly greater than every previously
    /// observed index.
    fn update(&mut self, bar_idx: u64, candle: &Candle, ctx: &DetectorContext<'_>);

    /// Read a named output field, or `None` if the field is unknown or not yet produced.
    fn get(&self, field: &str) -> Option<FieldValue>;

    /// Whether enough bars have been observed for this detector's outputs to be meaningful.
    fn is_ready(&self) -> bool;

    /// Discard all accumulated state, returning the detector to its just-constructed form.
    fn reset(&mut self);
}
