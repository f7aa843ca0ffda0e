//! Typed expression tree produced by [`crate::parse`] (§4.4 Parsing).

use indexmap::IndexMap;
use playbook_instrument::ActionKind;
use smol_str::SmolStr;

/// Relative bar offset into a feature/structure's field history: `0` = current bar, `1` = previous
/// bar. Only `0` and `1` are meaningful per §3 Snapshot ("current + previous bar").
pub type Offset = u8;

/// A single operand in a [`Condition`] or [`ArithExpr`] (§4.4 grammar).
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `feature_id` or `feature_id.field`, optionally `[prev]` suffixed (represented via `offset`
    /// after normalization in [`crate::parse`]).
    FeatureRef { id: SmolStr, field: SmolStr, offset: Offset },
    /// `struct.field` or `struct.field[ratio]` (fibonacci bracket form), normalized to
    /// `level_<ratio>` by [`crate::parse::normalize_fib_bracket`].
    StructRef { key: SmolStr, field: SmolStr, offset: Offset },
    /// `close, open, high, low, volume, last_price, mark_price`.
    PriceRef(SmolStr),
    /// Numeric, boolean, string or ALL_CAPS enum-literal constant.
    Scalar(Scalar),
    /// The length-2 `between` RHS, a closed range `[lo, hi]`.
    Range(f64, f64),
    /// `[a, op, b]` or `{op: [a, b]}` arithmetic, `op` in `+ - * / %`.
    Arith { op: ArithOp, lhs: Box<Operand>, rhs: Box<Operand> },
    /// A reference to a previously-defined named setup (sub-expression), resolved and
    /// cycle-checked at compile time (§4.4 Compilation, §9).
    SetupRef(SmolStr),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Bool(bool),
    Str(SmolStr),
    /// ALL_CAPS enum literal (`ACTIVE`, `BROKEN`, `NONE`, `bullish`, ...).
    EnumLiteral(SmolStr),
}

/// A single comparison or shorthand-proximity test (§4.4 grammar, the 3-list/4-list form).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    In,
    Between,
    CrossAbove,
    CrossBelow,
    NearPct,
    NearAbs,
}

impl CmpOp {
    pub fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            ">" => CmpOp::Gt,
            "<" => CmpOp::Lt,
            ">=" => CmpOp::Ge,
            "<=" => CmpOp::Le,
            "==" => CmpOp::Eq,
            "!=" => CmpOp::Ne,
            "in" => CmpOp::In,
            "between" => CmpOp::Between,
            "cross_above" => CmpOp::CrossAbove,
            "cross_below" => CmpOp::CrossBelow,
            "near_pct" => CmpOp::NearPct,
            "near_abs" => CmpOp::NearAbs,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub lhs: Operand,
    pub op: CmpOp,
    pub rhs: Operand,
    /// Only used by the 4-list `near_pct`/`near_abs` shorthand.
    pub tolerance: Option<Operand>,
}

/// A windowed condition (§4.4 "Windowed conditions").
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOp {
    /// True iff `expr` has held true for the last `bars` consecutive bars (inclusive).
    HoldsFor { bars: u32, expr: Box<Expr> },
    /// True iff `expr` was true at least once within the last `bars` bars.
    OccurredWithin { bars: u32, expr: Box<Expr> },
    /// True iff `expr` was true on at least `min_true` of the last `bars` bars.
    CountTrue { bars: u32, min_true: u32, expr: Box<Expr> },
}

/// A boolean expression node (§4.4 "Boolean composition" and windowed conditions).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    All(Vec<Expr>),
    Any(Vec<Expr>),
    Not(Box<Expr>),
    Cond(Condition),
    Window(WindowOp),
}

/// One `cases: [...]` entry: a guard plus the intent(s) it emits when it is the first matching
/// case in its block (§4.4 "Action blocks").
#[derive(Debug, Clone, PartialEq)]
pub struct Case {
    pub when: Expr,
    pub emit: ActionKind,
    pub metadata: IndexMap<SmolStr, f64>,
}

/// An ordered action block: a top-level `when` gate, an ordered `cases` list evaluated
/// first-match-wins, and a terminal `else_emit` fallback (§4.4).
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: SmolStr,
    pub when: Option<Expr>,
    pub cases: Vec<Case>,
    pub else_emit: Option<(ActionKind, IndexMap<SmolStr, f64>)>,
}
