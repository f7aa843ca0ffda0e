//! A compiled Play (§3 Play, §6 "Play YAML"): deserialize the YAML source, resolve every DSL
//! reference against the declared feature/structure registries, and compute the content-derived
//! `play_hash`.

use crate::compile::{assign_window_ids, compile_block, compile_setups, CompileContext, CompiledBlock, ResolvedExpr};
use crate::error::DslError;
use crate::parse::{parse_block, parse_expr};
use crate::risk::RiskModel;
use indexmap::IndexMap;
use playbook_instrument::{AccountConfig, FeatureDecl, PlayIdentity, PositionPolicy, StructureDecl, TimeframeMap};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The Play exactly as it appears in YAML (§6): a flat top-level document, no nested file
/// includes, no environment-variable interpolation.
#[derive(Debug, Clone, Deserialize, Serialize)]
struct RawPlay {
    id: SmolStr,
    version: SmolStr,
    symbol: SmolStr,
    timeframes: TimeframeMap,
    account: AccountConfig,
    #[serde(default)]
    features: Vec<FeatureDecl>,
    #[serde(default)]
    structures: Vec<StructureDecl>,
    #[serde(default)]
    setups: IndexMap<SmolStr, serde_yaml::Value>,
    #[serde(default)]
    actions: Vec<serde_yaml::Value>,
    risk: RiskModel,
    position_policy: PositionPolicy,
}

/// A fully parsed, compiled and hashed Play, ready to drive an engine run.
#[derive(Debug, Clone)]
pub struct CompiledPlay {
    pub identity: PlayIdentity,
    pub timeframes: TimeframeMap,
    pub account: AccountConfig,
    pub features: IndexMap<SmolStr, FeatureDecl>,
    pub structures: IndexMap<SmolStr, StructureDecl>,
    pub setups: Vec<ResolvedExpr>,
    pub actions: Vec<CompiledBlock>,
    pub risk: RiskModel,
    pub position_policy: PositionPolicy,
    /// Number of window-history slots the engine must allocate for this Play (§4.4 "Windowed
    /// conditions"), summed across every block's `when`/`cases` and every named setup.
    pub window_slot_count: usize,
    /// `sha256(canonical_json(play))[:16]` (§6 hashing contract).
    pub play_hash: String,
}

fn yaml_to_json(value: &serde_yaml::Value) -> Result<serde_json::Value, DslError> {
    serde_json::to_value(value).map_err(|e| DslError::Json(e.to_string()))
}

impl CompiledPlay {
    /// Parse, compile and hash a Play from its YAML source text.
    pub fn load(yaml_source: &str) -> Result<Self, DslError> {
        let raw: RawPlay = serde_yaml::from_str(yaml_source).map_err(|e| DslError::Yaml(e.to_string()))?;

        let mut features = IndexMap::new();
        for decl in &raw.features {
            features.insert(decl.id.clone(), decl.clone());
        }
        let mut structures = IndexMap::new();
        for decl in &raw.structures {
            structures.insert(decl.key.clone(), decl.clone());
        }

        let mut raw_setups = IndexMap::new();
        for (name, value) in &raw.setups {
            let json = yaml_to_json(value)?;
            let expr = parse_expr(&json, &format!("setups.{name}"))?;
            raw_setups.insert(name.clone(), expr);
        }

        let ctx = CompileContext { features: &features, structures: &structures };
        let (mut resolved_setups, mut setup_index) = compile_setups(&raw_setups, &ctx)?;

        let mut actions = Vec::with_capacity(raw.actions.len());
        for (i, value) in raw.actions.iter().enumerate() {
            let json = yaml_to_json(value)?;
            let block = parse_block(&json, &format!("actions[{i}]"))?;
            let compiled = compile_block(&block, &ctx, &raw_setups, &mut resolved_setups, &mut setup_index)?;
            actions.push(compiled);
        }

        let mut window_counter = 0usize;
        for setup in &mut resolved_setups {
            assign_window_ids(setup, &mut window_counter);
        }
        for block in &mut actions {
            if let Some(when) = &mut block.when {
                assign_window_ids(when, &mut window_counter);
            }
            for case in &mut block.cases {
                assign_window_ids(&mut case.when, &mut window_counter);
            }
        }

        let play_hash = playbook_hash::play_hash(&raw).map_err(|e| DslError::Hash(e.to_string()))?;

        Ok(CompiledPlay {
            identity: PlayIdentity { id: raw.id, version: raw.version, symbol: raw.symbol },
            timeframes: raw.timeframes,
            account: raw.account,
            features,
            structures,
            setups: resolved_setups,
            actions,
            risk: raw.risk,
            position_policy: raw.position_policy,
            window_slot_count: window_counter,
            play_hash,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_PLAY: &str = r#"
id: demo-play
version: "1"
symbol: BTCUSDT
timeframes:
  low_tf: 1m
  med_tf: 15m
  high_tf: 1h
  exec: low_tf
account:
  starting_equity_usdt: "1000"
  max_leverage: "5"
  fee_model:
    maker: "0.0002"
    taker: "0.0006"
features:
  - id: ema_fast
    indicator: ema
    params:
      length: 20
    tf_role: low_tf
structures: []
setups: {}
actions:
  - id: enter-long
    when: ["ema_fast", ">", 0]
    emit: entry_long
risk:
  sizing:
    mode: fixed_usdt
    amount: "100"
position_policy:
  mode: both
  exit_mode: first_hit
"#;

    #[test]
    fn loads_and_compiles_a_minimal_play() {
        let play = CompiledPlay::load(MINIMAL_PLAY).unwrap();
        assert_eq!(play.identity.id.as_str(), "demo-play");
        assert_eq!(play.actions.len(), 1);
        assert_eq!(play.play_hash.len(), 16);
    }

    #[test]
    fn play_hash_is_stable_across_reloads() {
        let a = CompiledPlay::load(MINIMAL_PLAY).unwrap();
        let b = CompiledPlay::load(MINIMAL_PLAY).unwrap();
        assert_eq!(a.play_hash, b.play_hash);
    }

    #[test]
    fn unresolved_feature_reference_fails_to_compile() {
        let broken = MINIMAL_PLAY.replace(r#"["ema_fast", ">", 0]"#, r#"["ghost_feature", ">", 0]"#);
        let err = CompiledPlay::load(&broken).unwrap_err();
        assert!(matches!(err, DslError::UnresolvedFeatureRef { .. }));
    }
}
