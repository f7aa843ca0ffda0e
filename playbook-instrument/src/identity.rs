use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A Play's stable identity (§3 Play: `id`, `version`). The content-derived `play_hash` is
/// computed by `playbook-hash` over the canonicalized Play, not stored here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct PlayIdentity {
    pub id: SmolStr,
    pub version: SmolStr,
    pub symbol: SmolStr,
}
