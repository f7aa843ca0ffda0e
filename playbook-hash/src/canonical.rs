//! Canonical JSON (§6): sorted keys, no whitespace, integers over floats where exact, explicit
//! rejection of `NaN`/`Infinity` rather than ever serializing them.

use crate::error::HashError;
use serde::Serialize;
use serde_json::Value;

/// Recursively sort every object's keys, leaving arrays in their original order. Called on the
/// `serde_json::Value` tree before compact serialization so two logically-equal values with
/// differently-ordered map insertion produce byte-identical output.
fn sort_value(value: Value, path: &str) -> Result<Value, HashError> {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(String, Value)> = map.into_iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = serde_json::Map::new();
            for (key, v) in sorted {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                out.insert(key, sort_value(v, &child_path)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => Ok(Value::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| sort_value(v, &format!("{path}[{i}]")))
                .collect::<Result<_, _>>()?,
        )),
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(HashError::NonFiniteNumber { path: path.to_string() });
                }
            }
            Ok(Value::Number(n))
        }
        other => Ok(other),
    }
}

/// Serialize `value` as canonical JSON: recursively sorted object keys, no extraneous whitespace,
/// explicit `NaN`/`Infinity` rejection. Integers serialize without a decimal point because
/// `serde_json::Number` already distinguishes an integer-valued input from a float one as long as
/// the source type was integral (`serde` preserves this through `#[derive(Serialize)]`).
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, HashError> {
    let raw = serde_json::to_value(value).map_err(|e| HashError::Serialization(e.to_string()))?;
    let sorted = sort_value(raw, "")?;
    serde_json::to_string(&sorted).map_err(|e| HashError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys_recursively() {
        let value = json!({"b": 1, "a": {"d": 2, "c": 3}});
        let out = canonical_json(&value).unwrap();
        assert_eq!(out, r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn preserves_array_order() {
        let value = json!({"xs": [3, 1, 2]});
        let out = canonical_json(&value).unwrap();
        assert_eq!(out, r#"{"xs":[3,1,2]}"#);
    }

    #[test]
    fn rejects_non_finite_numbers() {
        // serde_json itself cannot represent NaN/Infinity in a Value constructed via json!, so
        // this is exercised at the `f64` boundary instead, via a type that serializes a raw float.
        #[derive(serde::Serialize)]
        struct Wrapper {
            v: f64,
        }
        let err = canonical_json(&Wrapper { v: f64::NAN });
        assert!(err.is_err());
    }

    #[test]
    fn same_logical_value_different_key_order_is_byte_identical() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_eq!(canonical_json(&a).unwrap(), canonical_json(&b).unwrap());
    }
}
