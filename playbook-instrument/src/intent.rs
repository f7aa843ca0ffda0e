use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// The directive an action block emits before sizing (§3 Intent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    EntryLong,
    EntryShort,
    ExitLong,
    ExitShort,
    Close,
}

impl ActionKind {
    pub fn is_entry(self) -> bool {
        matches!(self, ActionKind::EntryLong | ActionKind::EntryShort)
    }

    pub fn is_exit(self) -> bool {
        matches!(
            self,
            ActionKind::ExitLong | ActionKind::ExitShort | ActionKind::Close
        )
    }
}

/// Output of evaluating an action block's firing case: an [`ActionKind`] plus free-form metadata
/// carried from the `emit` clause (§3 Intent).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intent {
    pub action: ActionKind,
    pub metadata: IndexMap<SmolStr, f64>,
    pub source_block_id: SmolStr,
}
