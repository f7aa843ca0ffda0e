//! Snapshot-driven evaluation of a compiled expression tree (§4.4 Evaluation).
//!
//! Three-valued semantics throughout: a referenced feature/structure that is not ready, or whose
//! field is non-finite, resolves to [`DslValue::Missing`] rather than panicking or defaulting to a
//! number. `Missing` only collapses to `false` at a condition boundary (`to_bool_at_boundary`),
//! which is why every comparison here routes through [`DslValue`] instead of raw `f64`.

use crate::ast::{ArithOp, CmpOp, Scalar};
use crate::compile::{CompiledBlock, ResolvedCondition, ResolvedExpr, ResolvedOperand, ResolvedWindowOp};
use crate::value::DslValue;
use indexmap::IndexMap;
use playbook_instrument::snapshot::Snapshot;
use playbook_instrument::ActionKind;
use smol_str::SmolStr;
use std::collections::VecDeque;

/// Per-window-node boolean history, indexed by the id [`crate::compile::assign_window_ids`]
/// assigned at compile time. Owned by the engine per Play instance and carried across bars.
#[derive(Debug, Clone, Default)]
pub struct WindowHistory {
    slots: Vec<VecDeque<bool>>,
}

impl WindowHistory {
    pub fn new(slot_count: usize) -> Self {
        Self { slots: vec![VecDeque::new(); slot_count] }
    }

    fn record(&mut self, id: usize, cap: u32, value: bool) {
        let slot = &mut self.slots[id];
        slot.push_back(value);
        while slot.len() > cap as usize {
            slot.pop_front();
        }
    }
}

/// The outcome of evaluating one action block: which case (or the `else_emit` fallback) fired.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockOutcome {
    pub block_id: SmolStr,
    pub emit: ActionKind,
    pub metadata: IndexMap<SmolStr, f64>,
}

/// Evaluates expression trees against a single [`Snapshot`], memoizing named setups for the
/// duration of one evaluation tick (a setup referenced by three different blocks in the same tick
/// is only evaluated once).
pub struct Evaluator<'a> {
    snapshot: &'a Snapshot,
    setups: &'a [ResolvedExpr],
    setup_cache: Vec<Option<bool>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(snapshot: &'a Snapshot, setups: &'a [ResolvedExpr]) -> Self {
        Self { snapshot, setups, setup_cache: vec![None; setups.len()] }
    }

    pub fn eval(&mut self, expr: &ResolvedExpr, windows: &mut WindowHistory) -> bool {
        match expr {
            ResolvedExpr::All(items) => items.iter().all(|e| self.eval(e, windows)),
            ResolvedExpr::Any(items) => items.iter().any(|e| self.eval(e, windows)),
            // `Not` must see the inner branch's three-valued result before it collapses: negating
            // an already-boundary-collapsed `false` would turn `not(MISSING)` into `true`. Instead
            // MISSING stays MISSING through the negation and only collapses here, at this boundary.
            ResolvedExpr::Not(_) => self.eval_tristate(expr, windows).to_bool_at_boundary(),
            ResolvedExpr::Cond(cond) => self.eval_condition(cond, windows).to_bool_at_boundary(),
            ResolvedExpr::Window(w) => self.eval_window(w, windows),
        }
    }

    /// The three-valued counterpart of a single expression node's evaluation, used by `Not` so it
    /// can distinguish "inner was `false`" from "inner was `MISSING`" before negating.
    fn eval_tristate(&mut self, expr: &ResolvedExpr, windows: &mut WindowHistory) -> DslValue {
        match expr {
            ResolvedExpr::Cond(cond) => self.eval_condition(cond, windows),
            ResolvedExpr::Not(inner) => match self.eval_tristate(inner, windows) {
                DslValue::Missing => DslValue::Missing,
                other => DslValue::Bool(!other.to_bool_at_boundary()),
            },
            // All/Any already collapse each item at its own boundary (unaffected by this fix);
            // wrap the result so `Not(All(..))`/`Not(Any(..))` still negate a definite bool.
            ResolvedExpr::All(_) | ResolvedExpr::Any(_) | ResolvedExpr::Window(_) => {
                DslValue::Bool(self.eval(expr, windows))
            }
        }
    }

    fn eval_setup(&mut self, idx: usize, windows: &mut WindowHistory) -> bool {
        if let Some(cached) = self.setup_cache[idx] {
            return cached;
        }
        // Guard against a setup appearing twice on the recursion path slipping through: the
        // cycle check at compile time already rejects genuine cycles, so this is unreachable in
        // a successfully compiled play.
        self.setup_cache[idx] = Some(false);
        let expr = &self.setups[idx];
        let value = self.eval(expr, windows);
        self.setup_cache[idx] = Some(value);
        value
    }

    fn eval_window(&mut self, w: &ResolvedWindowOp, windows: &mut WindowHistory) -> bool {
        match w {
            ResolvedWindowOp::HoldsFor { id, bars, expr } => {
                let current = self.eval(expr, windows);
                windows.record(*id, *bars, current);
                let slot = &windows.slots[*id];
                slot.len() == *bars as usize && slot.iter().all(|v| *v)
            }
            ResolvedWindowOp::OccurredWithin { id, bars, expr } => {
                let current = self.eval(expr, windows);
                windows.record(*id, *bars, current);
                windows.slots[*id].iter().any(|v| *v)
            }
            ResolvedWindowOp::CountTrue { id, bars, min_true, expr } => {
                let current = self.eval(expr, windows);
                windows.record(*id, *bars, current);
                windows.slots[*id].iter().filter(|v| **v).count() >= *min_true as usize
            }
        }
    }

    fn eval_condition(&mut self, cond: &ResolvedCondition, windows: &mut WindowHistory) -> DslValue {
        match cond.op {
            CmpOp::CrossAbove | CmpOp::CrossBelow => {
                let (lhs_cur, lhs_prev) = self.eval_operand_with_prev(&cond.lhs, windows);
                let (rhs_cur, rhs_prev) = self.eval_operand_with_prev(&cond.rhs, windows);
                let (Some(lc), Some(lp), Some(rc), Some(rp)) =
                    (lhs_cur.as_f64(), lhs_prev.as_f64(), rhs_cur.as_f64(), rhs_prev.as_f64())
                else {
                    return DslValue::Missing;
                };
                let crossed = if cond.op == CmpOp::CrossAbove { lp <= rp && lc > rc } else { lp >= rp && lc < rc };
                DslValue::Bool(crossed)
            }
            CmpOp::NearPct | CmpOp::NearAbs => {
                let lhs = self.eval_operand(&cond.lhs, windows);
                let rhs = self.eval_operand(&cond.rhs, windows);
                let tol = cond
                    .tolerance
                    .as_ref()
                    .map(|t| self.eval_operand(t, windows))
                    .unwrap_or(DslValue::Missing);
                let (Some(l), Some(r), Some(t)) = (lhs.as_f64(), rhs.as_f64(), tol.as_f64()) else {
                    return DslValue::Missing;
                };
                let diff = (l - r).abs();
                let within = if cond.op == CmpOp::NearPct {
                    if r == 0.0 {
                        return DslValue::Missing;
                    }
                    diff / r.abs() <= t / 100.0
                } else {
                    diff <= t
                };
                DslValue::Bool(within)
            }
            CmpOp::Between | CmpOp::In => {
                let lhs = self.eval_operand(&cond.lhs, windows);
                let ResolvedOperand::Range(lo, hi) = &cond.rhs else {
                    return DslValue::Missing;
                };
                match lhs.as_f64() {
                    Some(v) => DslValue::Bool(v >= *lo && v <= *hi),
                    None => DslValue::Missing,
                }
            }
            CmpOp::Eq | CmpOp::Ne => {
                let lhs = self.eval_operand(&cond.lhs, windows);
                let rhs = self.eval_operand(&cond.rhs, windows);
                if lhs.is_missing() || rhs.is_missing() {
                    return DslValue::Missing;
                }
                let equal = match (lhs.as_symbol(), rhs.as_symbol()) {
                    (Some(a), Some(b)) => a == b,
                    _ => match (lhs.as_f64(), rhs.as_f64()) {
                        (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
                        _ => false,
                    },
                };
                DslValue::Bool(if cond.op == CmpOp::Eq { equal } else { !equal })
            }
            CmpOp::Gt | CmpOp::Lt | CmpOp::Ge | CmpOp::Le => {
                let lhs = self.eval_operand(&cond.lhs, windows);
                let rhs = self.eval_operand(&cond.rhs, windows);
                let (Some(l), Some(r)) = (lhs.as_f64(), rhs.as_f64()) else {
                    return DslValue::Missing;
                };
                let result = match cond.op {
                    CmpOp::Gt => l > r,
                    CmpOp::Lt => l < r,
                    CmpOp::Ge => l >= r,
                    CmpOp::Le => l <= r,
                    _ => unreachable!(),
                };
                DslValue::Bool(result)
            }
        }
    }

    fn eval_operand(&mut self, operand: &ResolvedOperand, windows: &mut WindowHistory) -> DslValue {
        match operand {
            ResolvedOperand::Feature { id, field, .. } => self
                .snapshot
                .indicator(id)
                .filter(|bundle| bundle.is_ready)
                .and_then(|bundle| bundle.field(field))
                .and_then(|history| history.current.clone())
                .map(DslValue::from)
                .unwrap_or(DslValue::Missing),
            ResolvedOperand::Struct { key, field, .. } => self
                .snapshot
                .structure(key)
                .filter(|bundle| bundle.is_ready)
                .and_then(|bundle| bundle.field(field))
                .and_then(|history| history.current.clone())
                .map(DslValue::from)
                .unwrap_or(DslValue::Missing),
            ResolvedOperand::Price(name) => {
                self.snapshot.price_ref(name).map(DslValue::from).unwrap_or(DslValue::Missing)
            }
            ResolvedOperand::Scalar(scalar) => scalar_to_value(scalar),
            ResolvedOperand::Range(..) => DslValue::Missing,
            ResolvedOperand::Arith { op, lhs, rhs } => {
                let l = self.eval_operand(lhs, windows).as_f64();
                let r = self.eval_operand(rhs, windows).as_f64();
                match (l, r) {
                    (Some(l), Some(r)) => apply_arith(*op, l, r),
                    _ => DslValue::Missing,
                }
            }
            ResolvedOperand::Setup(idx) => DslValue::Bool(self.eval_setup(*idx, windows)),
        }
    }

    /// Resolve `(current, previous)` for an operand. Only `Feature`/`Struct` carry real history;
    /// a constant `Scalar` is its own previous value, and every other operand kind (price
    /// references, arithmetic, ranges, setups) has no previous-bar value tracked in the
    /// [`Snapshot`], so its previous resolves to `Missing`.
    fn eval_operand_with_prev(&mut self, operand: &ResolvedOperand, windows: &mut WindowHistory) -> (DslValue, DslValue) {
        match operand {
            ResolvedOperand::Feature { id, field, .. } => {
                let bundle = self.snapshot.indicator(id).filter(|b| b.is_ready);
                let history = bundle.and_then(|b| b.field(field));
                let current = history.and_then(|h| h.current.clone()).map(DslValue::from).unwrap_or(DslValue::Missing);
                let previous = history.and_then(|h| h.previous.clone()).map(DslValue::from).unwrap_or(DslValue::Missing);
                (current, previous)
            }
            ResolvedOperand::Struct { key, field, .. } => {
                let bundle = self.snapshot.structure(key).filter(|b| b.is_ready);
                let history = bundle.and_then(|b| b.field(field));
                let current = history.and_then(|h| h.current.clone()).map(DslValue::from).unwrap_or(DslValue::Missing);
                let previous = history.and_then(|h| h.previous.clone()).map(DslValue::from).unwrap_or(DslValue::Missing);
                (current, previous)
            }
            ResolvedOperand::Scalar(scalar) => {
                let v = scalar_to_value(scalar);
                (v.clone(), v)
            }
            other => (self.eval_operand(other, windows), DslValue::Missing),
        }
    }
}

fn scalar_to_value(scalar: &Scalar) -> DslValue {
    match scalar {
        Scalar::Number(n) => DslValue::from(*n),
        Scalar::Bool(b) => DslValue::Bool(*b),
        Scalar::Str(s) => DslValue::Symbol(s.clone()),
        Scalar::EnumLiteral(s) => DslValue::Symbol(s.clone()),
    }
}

fn apply_arith(op: ArithOp, l: f64, r: f64) -> DslValue {
    let result = match op {
        ArithOp::Add => l + r,
        ArithOp::Sub => l - r,
        ArithOp::Mul => l * r,
        ArithOp::Div => {
            if r == 0.0 {
                return DslValue::Missing;
            }
            l / r
        }
        ArithOp::Mod => {
            if r == 0.0 {
                return DslValue::Missing;
            }
            l % r
        }
    };
    DslValue::from(result)
}

/// Evaluate a single compiled block: the top-level `when` gate must pass, then the first matching
/// `case` wins, falling back to `else_emit` (§4.4 "Action blocks").
pub fn evaluate_block(
    block: &CompiledBlock,
    snapshot: &Snapshot,
    setups: &[ResolvedExpr],
    windows: &mut WindowHistory,
) -> Option<BlockOutcome> {
    let mut evaluator = Evaluator::new(snapshot, setups);
    if let Some(when) = &block.when {
        if !evaluator.eval(when, windows) {
            return None;
        }
    }
    for case in &block.cases {
        if evaluator.eval(&case.when, windows) {
            return Some(BlockOutcome { block_id: block.id.clone(), emit: case.emit, metadata: case.metadata.clone() });
        }
    }
    block
        .else_emit
        .clone()
        .map(|(emit, metadata)| BlockOutcome { block_id: block.id.clone(), emit, metadata })
}

/// Evaluate an ordered list of blocks, returning the first one that produces an outcome
/// (§4.5 "action blocks are evaluated in declaration order; the first to emit wins").
pub fn evaluate_blocks(
    blocks: &[CompiledBlock],
    snapshot: &Snapshot,
    setups: &[ResolvedExpr],
    windows: &mut WindowHistory,
) -> Option<BlockOutcome> {
    blocks.iter().find_map(|block| evaluate_block(block, snapshot, setups, windows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap as Map;
    use playbook_instrument::snapshot::{FieldHistory, FieldValue, ValueBundle};
    use playbook_instrument::Candle;
    use std::collections::HashMap;

    fn empty_snapshot() -> Snapshot {
        let candle = Candle { ts_open: 0, ts_close: 60_000, open: 100.0, high: 101.0, low: 99.0, close: 100.5, volume: 10.0 };
        Snapshot {
            minute_candle: candle,
            exec_candle: candle,
            ts_open: 0,
            ts_close: 60_000,
            exec_index: 0,
            last_price: 100.5,
            mark_price: 100.4,
            indicators: HashMap::new(),
            structures: HashMap::new(),
        }
    }

    fn bundle_with(value: f64) -> ValueBundle {
        let mut fields = Map::new();
        fields.insert(SmolStr::new("value"), FieldHistory { current: Some(FieldValue::Number(value)), previous: None });
        ValueBundle { fields, is_ready: true }
    }

    #[test]
    fn missing_feature_collapses_to_false() {
        let snapshot = empty_snapshot();
        let setups: Vec<ResolvedExpr> = Vec::new();
        let cond = ResolvedCondition {
            lhs: ResolvedOperand::Feature { id: SmolStr::new("ghost"), field: SmolStr::new("value"), offset: 0 },
            op: CmpOp::Gt,
            rhs: ResolvedOperand::Scalar(Scalar::Number(1.0)),
            tolerance: None,
        };
        let mut evaluator = Evaluator::new(&snapshot, &setups);
        let mut windows = WindowHistory::new(0);
        assert!(!evaluator.eval(&ResolvedExpr::Cond(cond), &mut windows));
    }

    #[test]
    fn not_of_a_missing_condition_stays_false_not_true() {
        // `ghost` is not present in the snapshot, so the inner `gt` condition is MISSING, not
        // `false`. `not(MISSING)` must stay MISSING and collapse to `false` at this boundary,
        // rather than inverting an already-collapsed `false` into `true`.
        let snapshot = empty_snapshot();
        let setups: Vec<ResolvedExpr> = Vec::new();
        let inner = ResolvedExpr::Cond(ResolvedCondition {
            lhs: ResolvedOperand::Feature { id: SmolStr::new("ghost"), field: SmolStr::new("value"), offset: 0 },
            op: CmpOp::Gt,
            rhs: ResolvedOperand::Scalar(Scalar::Number(70.0)),
            tolerance: None,
        });
        let mut evaluator = Evaluator::new(&snapshot, &setups);
        let mut windows = WindowHistory::new(0);
        assert!(!evaluator.eval(&ResolvedExpr::Not(Box::new(inner)), &mut windows));
    }

    #[test]
    fn not_of_a_present_false_condition_is_true() {
        let mut snapshot = empty_snapshot();
        snapshot.indicators.insert(SmolStr::new("rsi"), bundle_with(50.0));
        let setups: Vec<ResolvedExpr> = Vec::new();
        let inner = ResolvedExpr::Cond(ResolvedCondition {
            lhs: ResolvedOperand::Feature { id: SmolStr::new("rsi"), field: SmolStr::new("value"), offset: 0 },
            op: CmpOp::Gt,
            rhs: ResolvedOperand::Scalar(Scalar::Number(70.0)),
            tolerance: None,
        });
        let mut evaluator = Evaluator::new(&snapshot, &setups);
        let mut windows = WindowHistory::new(0);
        assert!(evaluator.eval(&ResolvedExpr::Not(Box::new(inner)), &mut windows));
    }

    #[test]
    fn simple_gt_condition_passes() {
        let mut snapshot = empty_snapshot();
        snapshot.indicators.insert(SmolStr::new("ema_fast"), bundle_with(105.0));
        let setups: Vec<ResolvedExpr> = Vec::new();
        let cond = ResolvedCondition {
            lhs: ResolvedOperand::Feature { id: SmolStr::new("ema_fast"), field: SmolStr::new("value"), offset: 0 },
            op: CmpOp::Gt,
            rhs: ResolvedOperand::Scalar(Scalar::Number(100.0)),
            tolerance: None,
        };
        let mut evaluator = Evaluator::new(&snapshot, &setups);
        let mut windows = WindowHistory::new(0);
        assert!(evaluator.eval(&ResolvedExpr::Cond(cond), &mut windows));
    }

    #[test]
    fn division_by_zero_is_missing() {
        let snapshot = empty_snapshot();
        let setups: Vec<ResolvedExpr> = Vec::new();
        let operand = ResolvedOperand::Arith {
            op: ArithOp::Div,
            lhs: Box::new(ResolvedOperand::Scalar(Scalar::Number(1.0))),
            rhs: Box::new(ResolvedOperand::Scalar(Scalar::Number(0.0))),
        };
        let mut evaluator = Evaluator::new(&snapshot, &setups);
        let mut windows = WindowHistory::new(0);
        assert!(evaluator.eval_operand(&operand, &mut windows).is_missing());
    }

    #[test]
    fn holds_for_requires_full_window_of_true() {
        let snapshot = empty_snapshot();
        let setups: Vec<ResolvedExpr> = Vec::new();
        let inner = ResolvedExpr::Cond(ResolvedCondition {
            lhs: ResolvedOperand::Scalar(Scalar::Number(1.0)),
            op: CmpOp::Eq,
            rhs: ResolvedOperand::Scalar(Scalar::Number(1.0)),
            tolerance: None,
        });
        let window = ResolvedWindowOp::HoldsFor { id: 0, bars: 3, expr: Box::new(inner) };
        let mut evaluator = Evaluator::new(&snapshot, &setups);
        let mut windows = WindowHistory::new(1);
        assert!(!evaluator.eval_window(&window, &mut windows));
        assert!(!evaluator.eval_window(&window, &mut windows));
        assert!(evaluator.eval_window(&window, &mut windows));
    }
}
