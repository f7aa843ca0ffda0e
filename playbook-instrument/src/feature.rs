use crate::candle::InputSource;
use crate::param::ParamValue;
use crate::timeframe::TfRole;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Declaration of a single indicator instance (§3 Feature).
///
/// `indicator` names a registry key resolved by `playbook-ta`'s `IndicatorRegistry`; this crate
/// does not know the set of valid indicator kinds, only how to carry the declaration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FeatureDecl {
    pub id: SmolStr,
    pub indicator: SmolStr,
    #[serde(default)]
    pub params: IndexMap<SmolStr, ParamValue>,
    pub tf_role: TfRole,
    #[serde(default)]
    pub input: InputSource,
}

impl FeatureDecl {
    pub fn param_f64(&self, name: &str, default: f64) -> f64 {
        self.params
            .get(name)
            .and_then(ParamValue::as_f64)
            .unwrap_or(default)
    }

    pub fn param_usize(&self, name: &str, default: usize) -> usize {
        self.params
            .get(name)
            .and_then(ParamValue::as_usize)
            .unwrap_or(default)
    }
}
