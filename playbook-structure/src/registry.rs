//! Structure registry: resolves a TF role's [`StructureDecl`] list into boxed [`Detector`]s in
//! dependency order via a topological sort (§4.3, §9 "Dependency injection for structures").
//!
//! Detector instances are returned as a plain `Vec` in construction order (their arena index
//! doubles as their stable handle); the engine owns them and looks peers up by `key` through a
//! [`DetectorContext`] built fresh each bar, rather than holding `Rc<RefCell<_>>` cross-references.

use crate::core::Detector;
use crate::derived_zone::{DerivedZone, ZoneMode};
use crate::error::StructureError;
use crate::fibonacci::{Fibonacci, FibMode};
use crate::market_structure::MarketStructure;
use crate::rolling_window::RollingWindow;
use crate::swing::Swing;
use crate::trend::Trend;
use crate::zone::Zone;
use playbook_instrument::StructureDecl;
use playbook_ta::DequeMode;
use smol_str::SmolStr;
use std::collections::{HashMap, HashSet};

/// A constructed detector plus the resolved names of its dependencies, kept alongside so the
/// engine can build each bar's [`crate::core::DetectorContext`] without re-parsing `StructureDecl`.
pub struct RegisteredStructure {
    pub key: SmolStr,
    pub detector: Box<dyn Detector>,
    /// `dep_name -> dependency key`, in the order declared.
    pub deps: Vec<(SmolStr, SmolStr)>,
    /// Every field name this instance may produce through `Detector::get`, mirroring
    /// `playbook_ta::RegisteredIndicator::output_keys` so the engine's snapshot builder can
    /// populate a [`playbook_instrument::snapshot::ValueBundle`] without guessing field names.
    pub output_keys: Vec<SmolStr>,
}

impl std::fmt::Debug for RegisteredStructure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredStructure")
            .field("key", &self.key)
            .field("detector", &self.detector)
            .field("deps", &self.deps)
            .field("output_keys", &self.output_keys)
            .finish()
    }
}

fn parse_ratios(decl: &StructureDecl) -> Vec<f64> {
    decl.params
        .get("ratios")
        .and_then(|v| v.as_str())
        .map(|s| s.split(',').filter_map(|part| part.trim().parse::<f64>().ok()).collect::<Vec<_>>())
        .filter(|v: &Vec<f64>| !v.is_empty())
        .unwrap_or_else(|| vec![0.236, 0.382, 0.5, 0.618, 0.786, 1.0])
}

/// Output field names a structure kind may expose, computed from its declaration (§4.3). Mirrors
/// `playbook_ta::registry::build_indicator`'s `output_keys` table for indicators.
fn output_keys_for(decl: &StructureDecl) -> Vec<SmolStr> {
    match decl.kind.as_str() {
        "swing" => ["high_level", "low_level", "high_idx", "low_idx", "pair_direction", "pair_version"]
            .iter()
            .map(|s| SmolStr::new(*s))
            .collect(),
        "trend" => ["direction", "strength", "bars_in_trend"].iter().map(|s| SmolStr::new(*s)).collect(),
        "market_structure" => {
            ["bias", "bos_this_bar", "choch_this_bar"].iter().map(|s| SmolStr::new(*s)).collect()
        }
        "fibonacci" => parse_ratios(decl).into_iter().map(crate::fibonacci::level_key).collect(),
        "zone" => ["upper", "lower", "state"].iter().map(|s| SmolStr::new(*s)).collect(),
        "derived_zone" => {
            let max_active = decl.param_usize("max_active", 3);
            (0..max_active)
                .flat_map(|i| {
                    ["upper", "lower", "state", "hash"]
                        .iter()
                        .map(move |field| SmolStr::new(format!("zone_{i}.{field}")))
                })
                .collect()
        }
        "rolling_window" => vec![SmolStr::new("value")],
        _ => Vec::new(),
    }
}

/// A conservative bars-to-`is_ready` estimate for one structure kind's *own* contribution,
/// ignoring whatever its `deps` need (§4.2 "warmup_estimate(params) >= bars_to_is_ready", applied
/// to structures per §4.3). Callers composing a TF role's total warmup budget must add this on
/// top of the dependency chain's own estimate, since a `trend` detector cannot be ready before the
/// `swing` it consumes is.
pub fn own_warmup_estimate(decl: &StructureDecl) -> usize {
    match decl.kind.as_str() {
        "swing" => {
            let left = decl.param_usize("left", 2);
            let right = decl.param_usize("right", 2);
            left + right + 1
        }
        // Needs a couple of confirmed swing pairs beyond the swing's own warmup to resolve a
        // non-ambiguous wave sequence.
        "trend" => 3,
        "market_structure" => 3,
        // One completed swing pair is enough to place the first levels/zone.
        "fibonacci" | "zone" | "derived_zone" => 1,
        "rolling_window" => decl.param_usize("size", 20),
        _ => 0,
    }
}

fn build_one(decl: &StructureDecl) -> Result<Box<dyn Detector>, StructureError> {
    match decl.kind.as_str() {
        "swing" => {
            let left = decl.param_usize("left", 2);
            let right = decl.param_usize("right", 2);
            let min_atr_move = decl.params.get("min_atr_move").and_then(|v| v.as_f64());
            let major_threshold = decl.params.get("major_threshold").and_then(|v| v.as_f64());
            let atr_id = decl
                .params
                .get("atr_indicator_id")
                .and_then(|v| v.as_str())
                .map(SmolStr::new);
            Ok(Box::new(Swing::new(left, right, min_atr_move, major_threshold, atr_id)))
        }
        "trend" => Ok(Box::new(Trend::new())),
        "market_structure" => Ok(Box::new(MarketStructure::new())),
        "fibonacci" => {
            let ratios = decl
                .params
                .get("ratios")
                .and_then(|v| v.as_str())
                .map(|s| {
                    s.split(',')
                        .filter_map(|part| part.trim().parse::<f64>().ok())
                        .collect::<Vec<_>>()
                })
                .filter(|v: &Vec<f64>| !v.is_empty())
                .unwrap_or_else(|| vec![0.236, 0.382, 0.5, 0.618, 0.786, 1.0]);
            let mode = if decl.param_str("mode", "paired") == "trend_anchored" {
                FibMode::TrendAnchored
            } else {
                FibMode::Paired
            };
            Ok(Box::new(Fibonacci::new(ratios, mode)))
        }
        "zone" => {
            let k = decl.param_f64("k", 1.0);
            let atr_id = decl
                .params
                .get("atr_indicator_id")
                .and_then(|v| v.as_str())
                .map(SmolStr::new)
                .ok_or_else(|| StructureError::MissingDependency {
                    key: decl.key.to_string(),
                    dep_name: "atr_indicator_id".to_string(),
                })?;
            let use_high = decl.param_str("side", "high") == "high";
            Ok(Box::new(Zone::new(k, atr_id, use_high)))
        }
        "derived_zone" => {
            let max_active = decl.param_usize("max_active", 3);
            let tolerance_pct = decl.param_f64("tolerance_pct", 0.001);
            let mode = if decl.param_str("side", "high") == "high" {
                ZoneMode::High
            } else {
                ZoneMode::Low
            };
            Ok(Box::new(DerivedZone::new(max_active, tolerance_pct, mode)))
        }
        "rolling_window" => {
            let size = decl.param_usize("size", 20);
            let is_max = decl.param_str("mode", "max") == "max";
            let deque_mode = if is_max { DequeMode::Max } else { DequeMode::Min };
            let on_high = decl.param_str("source", "high") == "high";
            Ok(Box::new(if on_high {
                RollingWindow::high(size, deque_mode)
            } else {
                RollingWindow::low(size, deque_mode)
            }))
        }
        other => Err(StructureError::UnknownStructureKind(other.to_string())),
    }
}

/// Declared dependency names each structure kind requires (`DEPENDS_ON`, §4.3).
fn required_deps(kind: &str) -> &'static [&'static str] {
    match kind {
        "trend" | "market_structure" | "zone" | "derived_zone" => &["swing"],
        "fibonacci" => &["swing"], // "trend" is optional, validated separately.
        _ => &[],
    }
}

/// Build every [`StructureDecl`] for one TF role into [`RegisteredStructure`]s, ordered so each
/// detector appears after everything it depends on (topological sort over `deps`).
pub fn build_structures(decls: &[StructureDecl]) -> Result<Vec<RegisteredStructure>, StructureError> {
    let by_key: HashMap<&str, &StructureDecl> = decls.iter().map(|d| (d.key.as_str(), d)).collect();

    for decl in decls {
        for dep_name in required_deps(decl.kind.as_str()) {
            if !decl.deps.contains_key(*dep_name) {
                return Err(StructureError::MissingDependency {
                    key: decl.key.to_string(),
                    dep_name: dep_name.to_string(),
                });
            }
        }
        for dep_key in decl.deps.values() {
            if !by_key.contains_key(dep_key.as_str()) {
                return Err(StructureError::MissingDependency {
                    key: decl.key.to_string(),
                    dep_name: dep_key.to_string(),
                });
            }
        }
    }

    let mut order = Vec::with_capacity(decls.len());
    let mut visited: HashSet<&str> = HashSet::new();
    let mut visiting: HashSet<&str> = HashSet::new();

    fn visit<'a>(
        key: &'a str,
        by_key: &HashMap<&'a str, &'a StructureDecl>,
        visited: &mut HashSet<&'a str>,
        visiting: &mut HashSet<&'a str>,
        order: &mut Vec<&'a str>,
    ) -> Result<(), StructureError> {
        if visited.contains(key) {
            return Ok(());
        }
        if !visiting.insert(key) {
            return Err(StructureError::CircularDependency(key.to_string()));
        }
        if let Some(decl) = by_key.get(key) {
            for dep_key in decl.deps.values() {
                visit(dep_key.as_str(), by_key, visited, visiting, order)?;
            }
        }
        visiting.remove(key);
        visited.insert(key);
        order.push(key);
        Ok(())
    }

    for decl in decls {
        visit(decl.key.as_str(), &by_key, &mut visited, &mut visiting, &mut order)?;
    }

    order
        .into_iter()
        .map(|key| {
            let decl = by_key[key];
            let detector = build_one(decl)?;
            let deps = decl
                .deps
                .iter()
                .map(|(name, target)| (name.clone(), target.clone()))
                .collect();
            Ok(RegisteredStructure {
                key: decl.key.clone(),
                detector,
                deps,
                output_keys: output_keys_for(decl),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use playbook_instrument::TfRole;

    fn decl(key: &str, kind: &str, deps: Vec<(&str, &str)>) -> StructureDecl {
        let mut dep_map = IndexMap::new();
        for (name, target) in deps {
            dep_map.insert(SmolStr::new(name), SmolStr::new(target));
        }
        StructureDecl {
            key: SmolStr::new(key),
            kind: SmolStr::new(kind),
            tf_role: TfRole::LowTf,
            params: IndexMap::new(),
            deps: dep_map,
        }
    }

    #[test]
    fn orders_dependents_after_dependencies() {
        let decls = vec![
            decl("ms", "market_structure", vec![("swing", "sw")]),
            decl("sw", "swing", vec![]),
        ];
        let built = build_structures(&decls).unwrap();
        let keys: Vec<&str> = built.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, vec!["sw", "ms"]);
    }

    #[test]
    fn missing_required_dependency_errors() {
        let decls = vec![decl("ms", "market_structure", vec![])];
        assert!(build_structures(&decls).is_err());
    }

    #[test]
    fn self_referential_cycle_errors() {
        let decls = vec![decl("a", "trend", vec![("swing", "a")])];
        assert!(matches!(
            build_structures(&decls),
            Err(StructureError::CircularDependency(_))
        ));
    }
}
