use crate::param::ParamValue;
use crate::timeframe::TfRole;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Declaration of a single structure detector instance (§3 Structure instance).
///
/// `deps` maps a dependency role name (e.g. `"swing"`) to the `key` of another declared
/// [`StructureDecl`]; `playbook-structure`'s registry resolves these into arena handles via a
/// topological sort at construction time.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StructureDecl {
    pub key: SmolStr,
    pub kind: SmolStr,
    pub tf_role: TfRole,
    #[serde(default)]
    pub params: IndexMap<SmolStr, ParamValue>,
    #[serde(default)]
    pub deps: IndexMap<SmolStr, SmolStr>,
}

impl StructureDecl {
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

    pub fn param_str<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.params
            .get(name)
            .and_then(ParamValue::as_str)
            .unwrap_or(default)
    }
}
