//! Warmup composition (§4.2, §4.3): how many closed bars each TF role needs before the engine
//! leaves `WARMING_UP`, derived from every feature's/structure's own bars-to-`is_ready` estimate
//! plus a conservative safety margin.

use indexmap::IndexMap;
use playbook_dsl::CompiledPlay;
use playbook_instrument::{FeatureDecl, StructureDecl, TfRole};
use smol_str::SmolStr;
use std::collections::HashMap;

/// How many bars one TF role requires before warmup clears, and how many it has actually seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleWarmup {
    pub bars_required: usize,
    pub bars_seen: usize,
}

impl RoleWarmup {
    pub fn is_ready(&self) -> bool {
        self.bars_seen >= self.bars_required
    }
}

/// The per-role warmup picture for a run, surfaced to callers as a diagnostic (§4.5 "WarmupReport").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmupReport {
    pub low_tf: RoleWarmup,
    pub med_tf: RoleWarmup,
    pub high_tf: RoleWarmup,
}

impl WarmupReport {
    pub fn all_ready(&self) -> bool {
        self.low_tf.is_ready() && self.med_tf.is_ready() && self.high_tf.is_ready()
    }

    pub fn role(&self, role: TfRole) -> RoleWarmup {
        match role {
            TfRole::LowTf => self.low_tf,
            TfRole::MedTf => self.med_tf,
            TfRole::HighTf => self.high_tf,
        }
    }

    pub fn with_bars_seen(&self, role: TfRole, bars_seen: usize) -> WarmupReport {
        let mut report = *self;
        let slot = match role {
            TfRole::LowTf => &mut report.low_tf,
            TfRole::MedTf => &mut report.med_tf,
            TfRole::HighTf => &mut report.high_tf,
        };
        slot.bars_seen = bars_seen;
        report
    }
}

/// The conservative default safety margin: `max(10, 5% of required bars)` (§4.2).
fn safety_margin(required: usize) -> usize {
    let five_pct = (required as f64 * 0.05).ceil() as usize;
    five_pct.max(10)
}

fn structure_total_warmup(
    key: &str,
    structures: &IndexMap<SmolStr, StructureDecl>,
    features: &IndexMap<SmolStr, FeatureDecl>,
    memo: &mut HashMap<SmolStr, usize>,
) -> usize {
    if let Some(total) = memo.get(key) {
        return *total;
    }
    let Some(decl) = structures.get(key) else {
        return 0;
    };
    let own = playbook_structure::own_warmup_estimate(decl);

    let mut total = own;
    for dep_key in decl.deps.values() {
        let dep_total = structure_total_warmup(dep_key, structures, features, memo);
        total = total.max(own + dep_total);
    }

    // A zone's width reads an ATR-family feature every bar; it cannot be meaningfully ready
    // before that feature has its own warmup, even though the dependency isn't expressed through
    // `StructureDecl.deps` (§4.3 "Zone ... widened by a multiple of ATR").
    if decl.kind.as_str() == "zone" {
        if let Some(atr_id) = decl.params.get("atr_indicator_id").and_then(|v| v.as_str()) {
            if let Some(atr_decl) = features.get(atr_id) {
                if let Ok(registered) = playbook_ta::build_indicator(atr_decl) {
                    total = total.max(own + registered.warmup_bars);
                }
            }
        }
    }

    memo.insert(SmolStr::new(key), total);
    total
}

fn required_bars_for_role(play: &CompiledPlay, role: TfRole) -> usize {
    let mut required = 0usize;

    for decl in play.features.values().filter(|d| d.tf_role == role) {
        if let Ok(registered) = playbook_ta::build_indicator(decl) {
            required = required.max(registered.warmup_bars);
        }
    }

    let mut memo = HashMap::new();
    for decl in play.structures.values().filter(|d| d.tf_role == role) {
        let total = structure_total_warmup(decl.key.as_str(), &play.structures, &play.features, &mut memo);
        required = required.max(total);
    }

    required + safety_margin(required)
}

/// Compute the bars-required half of a [`WarmupReport`] for every TF role a Play declares
/// features/structures against. `bars_seen` starts at zero; the engine fills it in per bar via
/// [`WarmupReport::with_bars_seen`].
pub fn compute_warmup_requirements(play: &CompiledPlay) -> WarmupReport {
    WarmupReport {
        low_tf: RoleWarmup { bars_required: required_bars_for_role(play, TfRole::LowTf), bars_seen: 0 },
        med_tf: RoleWarmup { bars_required: required_bars_for_role(play, TfRole::MedTf), bars_seen: 0 },
        high_tf: RoleWarmup { bars_required: required_bars_for_role(play, TfRole::HighTf), bars_seen: 0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safety_margin_floors_at_ten() {
        assert_eq!(safety_margin(20), 10);
        assert_eq!(safety_margin(1000), 50);
    }

    #[test]
    fn empty_play_requires_only_the_safety_margin_floor() {
        let play_yaml = r#"
id: demo
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
features: []
structures: []
setups: {}
actions: []
risk:
  sizing:
    mode: fixed_usdt
    amount: "100"
position_policy:
  mode: both
  exit_mode: first_hit
"#;
        let play = CompiledPlay::load(play_yaml).unwrap();
        let report = compute_warmup_requirements(&play);
        assert_eq!(report.low_tf.bars_required, 10);
        assert_eq!(report.med_tf.bars_required, 10);
        assert_eq!(report.high_tf.bars_required, 10);
    }
}
