//! Strict parsing of the canonical-shorthand grammar (§4.4) into the typed [`crate::ast`] tree.
//!
//! Unknown condition keys, unknown operators, malformed shorthand and legacy aliases all reject
//! with location context rather than falling back to a best-effort guess.

use crate::ast::{ArithOp, Block, Case, CmpOp, Condition, Expr, Operand, Scalar, WindowOp};
use crate::error::DslError;
use indexmap::IndexMap;
use playbook_instrument::ActionKind;
use serde_json::Value;
use smol_str::SmolStr;

const PRICE_REFS: [&str; 7] = ["close", "open", "high", "low", "volume", "last_price", "mark_price"];

/// Legacy condition-key aliases the source historically accepted; the target grammar refuses them
/// outright rather than silently translating (§4.4 "Legacy aliases are prohibited").
const LEGACY_ALIASES: [&str; 3] = ["and", "or", "none_of"];

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_ident(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_ident_char)
}

/// Normalize a fibonacci bracket reference `fib.level[0.618]` to the dotted field form
/// `fib.level_0.618`, matching [`playbook_structure::fibonacci::level_key`]'s canonical formatting
/// (§4.4, §8 "Bracket-level Fib keys").
pub fn normalize_fib_bracket(raw: &str) -> Option<(String, String)> {
    let open_bracket = raw.find('[')?;
    if !raw.ends_with(']') {
        return None;
    }
    let head = &raw[..open_bracket];
    let ratio_raw = &raw[open_bracket + 1..raw.len() - 1];
    let ratio: f64 = ratio_raw.parse().ok()?;
    let (key, field_prefix) = head.split_once('.')?;
    if !is_ident(key) || !is_ident(field_prefix) {
        return None;
    }
    let field = if field_prefix == "level" {
        playbook_structure::level_key(ratio).to_string()
    } else {
        format!("{field_prefix}_{}", playbook_structure::level_key(ratio))
    };
    Some((key.to_string(), field))
}

/// Split a bare dotted reference (`struct.field`, no bracket) into `(name, field)`.
fn split_dotted(raw: &str) -> Option<(String, String)> {
    let (lhs, rhs) = raw.split_once('.')?;
    if is_ident(lhs) && is_ident(rhs) {
        Some((lhs.to_string(), rhs.to_string()))
    } else {
        None
    }
}

/// ALL_CAPS enum literal: at least one char, letters/digits/underscore, no lowercase.
fn is_all_caps_literal(s: &str) -> bool {
    !s.is_empty()
        && s.chars().next().map(|c| c.is_ascii_uppercase()).unwrap_or(false)
        && s.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Parse a duration string (`"30m"`, `"2h"`, `"1d"`) into a bar count of the 1-minute sub-loop
/// evaluation tick, applying a 24h ceiling on the input and a 500-bar cap on the output
/// (§4.4 "duration-based variants").
pub fn parse_duration_to_bars(raw: &str, location: &str) -> Result<u32, DslError> {
    let (num_part, unit) = raw.split_at(raw.len().saturating_sub(1));
    let value: f64 = num_part.parse().map_err(|_| DslError::MalformedShorthand {
        location: location.to_string(),
        detail: format!("invalid duration: {raw}"),
    })?;
    let minutes = match unit {
        "m" => value,
        "h" => value * 60.0,
        "d" => value * 1_440.0,
        _ => {
            return Err(DslError::MalformedShorthand {
                location: location.to_string(),
                detail: format!("unknown duration unit in: {raw}"),
            })
        }
    };
    let capped_minutes = minutes.min(1_440.0); // 24h ceiling
    let bars = capped_minutes.round() as u32;
    Ok(bars.min(500)) // 500-bar cap
}

fn location(path: &str) -> String {
    if path.is_empty() {
        "<root>".to_string()
    } else {
        path.to_string()
    }
}

fn parse_operand(value: &Value, path: &str) -> Result<Operand, DslError> {
    match value {
        Value::Number(n) => Ok(Operand::Scalar(Scalar::Number(n.as_f64().unwrap_or(f64::NAN)))),
        Value::Bool(b) => Ok(Operand::Scalar(Scalar::Bool(*b))),
        Value::String(s) => parse_string_operand(s, path),
        Value::Array(items) if items.len() == 3 => parse_arith_list(items, path),
        Value::Object(map) if map.len() == 1 => {
            let (op_key, rhs) = map.iter().next().unwrap();
            if let Some(op) = parse_arith_op(op_key) {
                let Value::Array(items) = rhs else {
                    return Err(DslError::MalformedShorthand {
                        location: location(path),
                        detail: "arithmetic dict form requires a 2-element array value".into(),
                    });
                };
                if items.len() != 2 {
                    return Err(DslError::MalformedShorthand {
                        location: location(path),
                        detail: "arithmetic dict form requires exactly 2 operands".into(),
                    });
                }
                let lhs = parse_operand(&items[0], path)?;
                let rhs = parse_operand(&items[1], path)?;
                Ok(Operand::Arith { op, lhs: Box::new(lhs), rhs: Box::new(rhs) })
            } else {
                Err(DslError::UnknownOperator {
                    location: location(path),
                    op: op_key.clone(),
                })
            }
        }
        other => Err(DslError::MalformedShorthand {
            location: location(path),
            detail: format!("cannot parse operand from: {other:?}"),
        }),
    }
}

fn parse_arith_op(raw: &str) -> Option<ArithOp> {
    Some(match raw {
        "+" => ArithOp::Add,
        "-" => ArithOp::Sub,
        "*" => ArithOp::Mul,
        "/" => ArithOp::Div,
        "%" => ArithOp::Mod,
        _ => return None,
    })
}

fn parse_arith_list(items: &[Value], path: &str) -> Result<Operand, DslError> {
    // A bare 3-element array is ambiguous between `[lhs, op, rhs]` arithmetic and a condition;
    // callers that expect a `Condition` parse the 3-list themselves before falling back here, so
    // reaching this function at all means the middle element must be an arithmetic operator.
    let Value::String(op_str) = &items[1] else {
        return Err(DslError::MalformedShorthand {
            location: location(path),
            detail: "expected an operator string as the middle element".into(),
        });
    };
    let op = parse_arith_op(op_str).ok_or_else(|| DslError::UnknownOperator {
        location: location(path),
        op: op_str.clone(),
    })?;
    let lhs = parse_operand(&items[0], path)?;
    let rhs = parse_operand(&items[2], path)?;
    Ok(Operand::Arith { op, lhs: Box::new(lhs), rhs: Box::new(rhs) })
}

fn parse_string_operand(s: &str, path: &str) -> Result<Operand, DslError> {
    if LEGACY_ALIASES.contains(&s) {
        return Err(DslError::LegacyAliasProhibited {
            location: location(path),
            alias: s.to_string(),
        });
    }
    if PRICE_REFS.contains(&s) {
        return Ok(Operand::PriceRef(SmolStr::new(s)));
    }
    if let Some((key, field)) = normalize_fib_bracket(s) {
        return Ok(Operand::StructRef { key: SmolStr::new(key), field: SmolStr::new(field), offset: 0 });
    }
    if let Some((lhs_name, field)) = split_dotted(s) {
        // Ambiguous between FeatureRef and StructRef at parse time; disambiguated during compile
        // against the Play's feature/structure registries. Represented provisionally as StructRef;
        // compile falls back to FeatureRef if the key does not resolve as a structure.
        return Ok(Operand::StructRef { key: SmolStr::new(lhs_name), field: SmolStr::new(field), offset: 0 });
    }
    if is_all_caps_literal(s) {
        return Ok(Operand::Scalar(Scalar::EnumLiteral(SmolStr::new(s))));
    }
    // Bare identifier: a feature's default output field ("value").
    Ok(Operand::FeatureRef { id: SmolStr::new(s), field: SmolStr::new("value"), offset: 0 })
}

fn parse_condition(items: &[Value], path: &str) -> Result<Condition, DslError> {
    if items.len() != 3 && items.len() != 4 {
        return Err(DslError::MalformedShorthand {
            location: location(path),
            detail: format!("condition list must have 3 or 4 elements, got {}", items.len()),
        });
    }
    let Value::String(op_str) = &items[1] else {
        return Err(DslError::MalformedShorthand {
            location: location(path),
            detail: "condition operator must be a string".into(),
        });
    };
    let op = CmpOp::parse(op_str).ok_or_else(|| DslError::UnknownOperator {
        location: location(path),
        op: op_str.clone(),
    })?;

    if items.len() == 4 && !matches!(op, CmpOp::NearPct | CmpOp::NearAbs) {
        return Err(DslError::MalformedShorthand {
            location: location(path),
            detail: "4-element condition shorthand is only valid for near_pct/near_abs".into(),
        });
    }
    if items.len() == 3 && matches!(op, CmpOp::NearPct | CmpOp::NearAbs) {
        return Err(DslError::MalformedShorthand {
            location: location(path),
            detail: "near_pct/near_abs require a 4-element [lhs, op, target, tol] shorthand".into(),
        });
    }

    let lhs = parse_operand(&items[0], path)?;
    // `in` has no dedicated set-literal syntax in this grammar; it is accepted as an alias for
    // `between`'s closed-range RHS rather than adding a list operand type the grammar otherwise
    // never needs.
    let rhs = if matches!(op, CmpOp::Between | CmpOp::In) {
        parse_range(&items[2], path)?
    } else {
        parse_operand(&items[2], path)?
    };
    let tolerance = if items.len() == 4 { Some(parse_operand(&items[3], path)?) } else { None };

    Ok(Condition { lhs, op, rhs, tolerance })
}

fn parse_range(value: &Value, path: &str) -> Result<Operand, DslError> {
    let Value::Array(items) = value else {
        return Err(DslError::MalformedShorthand {
            location: location(path),
            detail: "between's rhs must be a 2-element array".into(),
        });
    };
    if items.len() != 2 {
        return Err(DslError::MalformedShorthand {
            location: location(path),
            detail: "between's rhs must have exactly 2 elements".into(),
        });
    }
    let lo = items[0].as_f64().ok_or_else(|| DslError::MalformedShorthand {
        location: location(path),
        detail: "between bounds must be numeric".into(),
    })?;
    let hi = items[1].as_f64().ok_or_else(|| DslError::MalformedShorthand {
        location: location(path),
        detail: "between bounds must be numeric".into(),
    })?;
    Ok(Operand::Range(lo, hi))
}

/// Parse a single [`Expr`] node: a 3/4-list condition, or a `{all,any,not,holds_for,
/// occurred_within,count_true}` dict.
pub fn parse_expr(value: &Value, path: &str) -> Result<Expr, DslError> {
    match value {
        Value::Array(items) => Ok(Expr::Cond(parse_condition(items, path)?)),
        Value::Object(map) => {
            if map.len() != 1 {
                return Err(DslError::MalformedShorthand {
                    location: location(path),
                    detail: "expression dict must have exactly one key".into(),
                });
            }
            let (key, body) = map.iter().next().unwrap();
            match key.as_str() {
                "all" => Ok(Expr::All(parse_expr_list(body, &format!("{path}.all"))?)),
                "any" => Ok(Expr::Any(parse_expr_list(body, &format!("{path}.any"))?)),
                "not" => {
                    let inner = match body {
                        Value::Array(_) => Expr::All(parse_expr_list(body, &format!("{path}.not"))?),
                        other => parse_expr(other, &format!("{path}.not"))?,
                    };
                    Ok(Expr::Not(Box::new(inner)))
                }
                "holds_for" => {
                    let obj = body.as_object().ok_or_else(|| DslError::MalformedShorthand {
                        location: location(path),
                        detail: "holds_for requires an object body".into(),
                    })?;
                    let bars = window_bars(obj, path)?;
                    let expr = parse_expr(
                        obj.get("expr").ok_or_else(|| DslError::MissingKey {
                            location: location(path),
                            key: "expr".into(),
                        })?,
                        &format!("{path}.holds_for.expr"),
                    )?;
                    Ok(Expr::Window(WindowOp::HoldsFor { bars, expr: Box::new(expr) }))
                }
                "occurred_within" => {
                    let obj = body.as_object().ok_or_else(|| DslError::MalformedShorthand {
                        location: location(path),
                        detail: "occurred_within requires an object body".into(),
                    })?;
                    let bars = window_bars(obj, path)?;
                    let expr = parse_expr(
                        obj.get("expr").ok_or_else(|| DslError::MissingKey {
                            location: location(path),
                            key: "expr".into(),
                        })?,
                        &format!("{path}.occurred_within.expr"),
                    )?;
                    Ok(Expr::Window(WindowOp::OccurredWithin { bars, expr: Box::new(expr) }))
                }
                "count_true" => {
                    let obj = body.as_object().ok_or_else(|| DslError::MalformedShorthand {
                        location: location(path),
                        detail: "count_true requires an object body".into(),
                    })?;
                    let bars = window_bars(obj, path)?;
                    let min_true = obj
                        .get("min_true")
                        .and_then(|v| v.as_u64())
                        .ok_or_else(|| DslError::MissingKey {
                            location: location(path),
                            key: "min_true".into(),
                        })? as u32;
                    let expr = parse_expr(
                        obj.get("expr").ok_or_else(|| DslError::MissingKey {
                            location: location(path),
                            key: "expr".into(),
                        })?,
                        &format!("{path}.count_true.expr"),
                    )?;
                    Ok(Expr::Window(WindowOp::CountTrue { bars, min_true, expr: Box::new(expr) }))
                }
                "setup" => {
                    let Value::String(name) = body else {
                        return Err(DslError::MalformedShorthand {
                            location: location(path),
                            detail: "setup reference must be a string".into(),
                        });
                    };
                    // A bare setup reference used as a full expression evaluates its resolved
                    // expression's truthiness; represented as a single-condition `==true` test
                    // resolved during compilation via SetupRef lookup.
                    Ok(Expr::Cond(Condition {
                        lhs: Operand::SetupRef(SmolStr::new(name)),
                        op: CmpOp::Eq,
                        rhs: Operand::Scalar(Scalar::Bool(true)),
                        tolerance: None,
                    }))
                }
                other => Err(DslError::UnknownConditionKey {
                    location: location(path),
                    key: other.to_string(),
                }),
            }
        }
        other => Err(DslError::MalformedShorthand {
            location: location(path),
            detail: format!("expected a condition list or expression dict, got: {other:?}"),
        }),
    }
}

fn window_bars(obj: &serde_json::Map<String, Value>, path: &str) -> Result<u32, DslError> {
    if let Some(bars) = obj.get("bars").and_then(|v| v.as_u64()) {
        return Ok(bars as u32);
    }
    if let Some(Value::String(duration)) = obj.get("duration") {
        return parse_duration_to_bars(duration, path);
    }
    Err(DslError::MissingKey { location: location(path), key: "bars or duration".into() })
}

fn parse_expr_list(value: &Value, path: &str) -> Result<Vec<Expr>, DslError> {
    let Value::Array(items) = value else {
        return Err(DslError::MalformedShorthand {
            location: location(path),
            detail: "all/any body must be an array".into(),
        });
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| parse_expr(item, &format!("{path}[{i}]")))
        .collect()
}

fn parse_action_kind(raw: &str, path: &str) -> Result<ActionKind, DslError> {
    Ok(match raw {
        "entry_long" => ActionKind::EntryLong,
        "entry_short" => ActionKind::EntryShort,
        "exit_long" => ActionKind::ExitLong,
        "exit_short" => ActionKind::ExitShort,
        "close" => ActionKind::Close,
        other => {
            return Err(DslError::UnknownEnumLiteral {
                location: location(path),
                literal: other.to_string(),
            })
        }
    });
}

fn parse_emit(value: &Value, path: &str) -> Result<(ActionKind, IndexMap<SmolStr, f64>), DslError> {
    match value {
        Value::String(s) => Ok((parse_action_kind(s, path)?, IndexMap::new())),
        Value::Object(map) => {
            let action_raw = map
                .get("action")
                .and_then(|v| v.as_str())
                .ok_or_else(|| DslError::MissingKey { location: location(path), key: "action".into() })?;
            let action = parse_action_kind(action_raw, path)?;
            let mut metadata = IndexMap::new();
            if let Some(Value::Object(meta)) = map.get("metadata") {
                for (k, v) in meta {
                    if let Some(n) = v.as_f64() {
                        metadata.insert(SmolStr::new(k), n);
                    }
                }
            }
            Ok((action, metadata))
        }
        other => Err(DslError::MalformedShorthand {
            location: location(path),
            detail: format!("emit must be a string or object, got: {other:?}"),
        }),
    }
}

/// Parse one action [`Block`] (§4.4 "Action blocks").
pub fn parse_block(value: &Value, path: &str) -> Result<Block, DslError> {
    let obj = value.as_object().ok_or_else(|| DslError::MalformedShorthand {
        location: location(path),
        detail: "action block must be an object".into(),
    })?;
    let id = obj
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| DslError::MissingKey { location: location(path), key: "id".into() })?;

    let when = obj.get("when").map(|w| parse_expr(w, &format!("{path}.when"))).transpose()?;

    let mut cases = Vec::new();
    if let Some(Value::Array(raw_cases)) = obj.get("cases") {
        for (i, raw_case) in raw_cases.iter().enumerate() {
            let case_obj = raw_case.as_object().ok_or_else(|| DslError::MalformedShorthand {
                location: location(path),
                detail: "case must be an object".into(),
            })?;
            let case_when = parse_expr(
                case_obj
                    .get("when")
                    .ok_or_else(|| DslError::MissingKey { location: location(path), key: "when".into() })?,
                &format!("{path}.cases[{i}].when"),
            )?;
            let (emit, metadata) = parse_emit(
                case_obj
                    .get("emit")
                    .ok_or_else(|| DslError::MissingKey { location: location(path), key: "emit".into() })?,
                &format!("{path}.cases[{i}].emit"),
            )?;
            cases.push(Case { when: case_when, emit, metadata });
        }
    } else if let Some(emit_value) = obj.get("emit") {
        let (emit, metadata) = parse_emit(emit_value, &format!("{path}.emit"))?;
        cases.push(Case {
            when: when.clone().unwrap_or(Expr::All(Vec::new())),
            emit,
            metadata,
        });
    }

    let else_emit = obj.get("else_emit").map(|v| parse_emit(v, &format!("{path}.else_emit"))).transpose()?;

    Ok(Block { id: SmolStr::new(id), when, cases, else_emit })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_simple_comparison_condition() {
        let value = json!(["ema_fast", ">", "ema_slow"]);
        let cond = parse_condition(value.as_array().unwrap(), "").unwrap();
        assert_eq!(cond.op, CmpOp::Gt);
    }

    #[test]
    fn rejects_unknown_operator() {
        let value = json!(["close", "squiggle", 100]);
        let err = parse_condition(value.as_array().unwrap(), "").unwrap_err();
        assert!(matches!(err, DslError::UnknownOperator { .. }));
    }

    #[test]
    fn near_pct_requires_four_elements() {
        let value = json!(["close", "near_pct", 100]);
        let err = parse_condition(value.as_array().unwrap(), "").unwrap_err();
        assert!(matches!(err, DslError::MalformedShorthand { .. }));
    }

    #[test]
    fn fib_bracket_normalizes_to_level_key() {
        let (key, field) = normalize_fib_bracket("fib.level[0.618]").unwrap();
        assert_eq!(key, "fib");
        assert_eq!(field, "level_0.618");
    }

    #[test]
    fn legacy_alias_is_rejected() {
        let err = parse_string_operand("and", "").unwrap_err();
        assert!(matches!(err, DslError::LegacyAliasProhibited { .. }));
    }

    #[test]
    fn all_caps_token_parses_as_enum_literal() {
        let op = parse_string_operand("ACTIVE", "").unwrap();
        assert_eq!(op, Operand::Scalar(Scalar::EnumLiteral(SmolStr::new("ACTIVE"))));
    }

    #[test]
    fn duration_converts_with_caps() {
        assert_eq!(parse_duration_to_bars("30m", "").unwrap(), 30);
        assert_eq!(parse_duration_to_bars("2h", "").unwrap(), 120);
        // 48h input is ceilinged to 24h = 1440 minutes before the 500-bar cap applies.
        assert_eq!(parse_duration_to_bars("48h", "").unwrap(), 500);
    }

    #[test]
    fn not_wraps_bare_list_in_all() {
        let value = json!({"not": [["close", ">", 100]]});
        let expr = parse_expr(&value, "").unwrap();
        assert!(matches!(expr, Expr::Not(_)));
    }

    #[test]
    fn unknown_expression_key_rejects() {
        let value = json!({"xor": []});
        let err = parse_expr(&value, "").unwrap_err();
        assert!(matches!(err, DslError::UnknownConditionKey { .. }));
    }
}
