//! In-memory artifact *data* contracts (§6). Writing these to disk (parquet/CSV/JSON files) is an
//! external collaborator's job (§1 Non-goals); this crate only owns the serializable shapes and
//! their hashes.

use serde::Serialize;

/// Summary metrics plus the five stable hashes named in §6, for one completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub net_pnl: rust_decimal::Decimal,
    pub total_trades: u64,
    pub win_rate: f64,
    pub max_drawdown_pct: f64,
    pub trades_hash: String,
    pub equity_hash: String,
    pub run_hash: String,
    pub play_hash: String,
    pub input_hash: String,
}

/// Play echo, backtest window, and environment/version metadata for one run (§6
/// `run_manifest.json`).
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub play_id: String,
    pub play_version: String,
    pub play_hash: String,
    pub window_start_ts: i64,
    pub window_end_ts: i64,
    pub symbol: String,
    pub engine_version: String,
    pub rust_version: &'static str,
}

/// Proof fields validating that this run went through the production config/feature pipeline
/// rather than a placeholder shortcut (§6 `pipeline_signature.json`). Validation failing hard on
/// any deviation is the caller's (engine runner's) responsibility; this type only carries the
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PipelineSignature {
    pub config_source: ConfigSource,
    pub uses_system_config_loader: bool,
    pub placeholder_mode: bool,
    pub feature_keys_match: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Yaml,
    Placeholder,
}

impl PipelineSignature {
    /// A run is valid iff it did not go through placeholder config, did use the system loader,
    /// and its compiled feature keys match the registry it was validated against.
    pub fn is_valid(&self) -> bool {
        !self.placeholder_mode && self.uses_system_config_loader && self.feature_keys_match
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_mode_invalidates_the_signature() {
        let sig = PipelineSignature {
            config_source: ConfigSource::Placeholder,
            uses_system_config_loader: true,
            placeholder_mode: true,
            feature_keys_match: true,
        };
        assert!(!sig.is_valid());
    }

    #[test]
    fn fully_conformant_signature_is_valid() {
        let sig = PipelineSignature {
            config_source: ConfigSource::Yaml,
            uses_system_config_loader: true,
            placeholder_mode: false,
            feature_keys_match: true,
        };
        assert!(sig.is_valid());
    }
}
