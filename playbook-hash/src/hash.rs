//! The §6 hashing contract: `play_hash`, `input_hash`, `trades_hash`, `equity_hash`, `run_hash`.

use crate::canonical::canonical_json;
use crate::error::HashError;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Full-length lowercase hex sha256 digest of a value's canonical JSON encoding.
pub fn sha256_hex<T: Serialize>(value: &T) -> Result<String, HashError> {
    let canonical = canonical_json(value)?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(hex::encode(digest))
}

/// The first `n` hex characters of a value's canonical-JSON sha256 digest (used by `play_hash`
/// and `input_hash`, which are truncated to 16 hex characters per §6).
pub fn sha256_hex_prefix<T: Serialize>(value: &T, n: usize) -> Result<String, HashError> {
    let full = sha256_hex(value)?;
    Ok(full.chars().take(n).collect())
}

/// `play_hash = sha256(canonical_json(play.to_dict()))[:16]`.
pub fn play_hash<T: Serialize>(play: &T) -> Result<String, HashError> {
    sha256_hex_prefix(play, 16)
}

/// `input_hash = sha256(canonical_json({play_hash, window, symbol, data_env, funding_env}))[:16]`.
#[derive(Debug, Clone, Serialize)]
pub struct InputHashKey<'a> {
    pub play_hash: &'a str,
    pub window: (i64, i64),
    pub symbol: &'a str,
    pub data_env: &'a str,
    pub funding_env: &'a str,
}

pub fn input_hash(key: &InputHashKey<'_>) -> Result<String, HashError> {
    sha256_hex_prefix(key, 16)
}

/// `trades_hash = sha256(canonical_json([t.to_dict() for t in trades]))` (untruncated).
pub fn trades_hash<T: Serialize>(trades: &[T]) -> Result<String, HashError> {
    sha256_hex(&trades)
}

/// `equity_hash = sha256(canonical_json([p.to_dict() for p in equity_curve]))` (untruncated).
pub fn equity_hash<T: Serialize>(equity_curve: &[T]) -> Result<String, HashError> {
    sha256_hex(&equity_curve)
}

/// `run_hash = sha256(canonical_json({play_hash, input_hash, trades_hash, equity_hash}))`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RunHashKey<'a> {
    pub play_hash: &'a str,
    pub input_hash: &'a str,
    pub trades_hash: &'a str,
    pub equity_hash: &'a str,
}

pub fn run_hash(key: &RunHashKey<'_>) -> Result<String, HashError> {
    sha256_hex(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sha256_hex_is_deterministic_across_key_order() {
        let a = json!({"x": 1, "y": 2});
        let b = json!({"y": 2, "x": 1});
        assert_eq!(sha256_hex(&a).unwrap(), sha256_hex(&b).unwrap());
    }

    #[test]
    fn changing_one_field_changes_the_hash() {
        let a = json!({"close": 100.00});
        let b = json!({"close": 100.01});
        assert_ne!(sha256_hex(&a).unwrap(), sha256_hex(&b).unwrap());
    }

    #[test]
    fn play_hash_truncates_to_16_hex_chars() {
        let h = play_hash(&json!({"id": "play-1"})).unwrap();
        assert_eq!(h.len(), 16);
    }

    #[test]
    fn run_hash_changes_when_any_component_changes() {
        let base = RunHashKey {
            play_hash: "aaaa",
            input_hash: "bbbb",
            trades_hash: "cccc",
            equity_hash: "dddd",
        };
        let changed = RunHashKey {
            equity_hash: "eeee",
            ..base
        };
        assert_ne!(run_hash(&base).unwrap(), run_hash(&changed).unwrap());
    }
}
