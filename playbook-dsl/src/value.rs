//! Three-valued DSL semantics (§4.4, §9): `MISSING` is a first-class value distinct from `false`,
//! used internally for short-circuit reasoning; boolean combinators collapse it to `false` only at
//! the outermost condition boundary.

use playbook_instrument::snapshot::FieldValue;
use smol_str::SmolStr;

/// A resolved scalar operand value, or `Missing` when the source feature/structure was not ready,
/// non-finite, or otherwise unavailable.
#[derive(Debug, Clone, PartialEq)]
pub enum DslValue {
    Number(f64),
    Symbol(SmolStr),
    Bool(bool),
    Missing,
}

impl DslValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DslValue::Number(v) => Some(*v),
            DslValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            DslValue::Symbol(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, DslValue::Missing)
    }

    /// Collapse `Missing` to `false` at a condition boundary (§4.4, §9 "formalize MISSING...").
    pub fn to_bool_at_boundary(&self) -> bool {
        match self {
            DslValue::Bool(b) => *b,
            DslValue::Missing => false,
            DslValue::Number(n) => *n != 0.0,
            DslValue::Symbol(_) => false,
        }
    }
}

impl From<FieldValue> for DslValue {
    fn from(value: FieldValue) -> Self {
        if !value.is_finite() {
            return DslValue::Missing;
        }
        match value {
            FieldValue::Number(v) => DslValue::Number(v),
            FieldValue::Symbol(s) => DslValue::Symbol(s),
            FieldValue::Bool(b) => DslValue::Bool(b),
        }
    }
}

impl From<f64> for DslValue {
    fn from(v: f64) -> Self {
        if v.is_finite() {
            DslValue::Number(v)
        } else {
            DslValue::Missing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_field_value_becomes_missing() {
        let v: DslValue = FieldValue::Number(f64::NAN).into();
        assert!(v.is_missing());
        let v: DslValue = FieldValue::Number(f64::INFINITY).into();
        assert!(v.is_missing());
    }

    #[test]
    fn missing_collapses_to_false_at_boundary() {
        assert!(!DslValue::Missing.to_bool_at_boundary());
    }
}
