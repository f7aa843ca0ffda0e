use serde::{Deserialize, Serialize};

/// Which directions a Play is permitted to enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionMode {
    Long,
    Short,
    Both,
}

/// How signal-driven exits interact with SL/TP fills (§4.1, §8).
///
/// * `SlTpOnly` — a same-bar signal exit is suppressed unless SL/TP also fired this bar.
/// * `FirstHit` — whichever of {SL, TP, signal} triggers first in the 1m sub-loop wins.
/// * `SignalOnly` — SL/TP are ignored; only DSL exit blocks close positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitMode {
    SlTpOnly,
    FirstHit,
    SignalOnly,
}

/// A Play's position policy: permitted directions plus exit-mode semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct PositionPolicy {
    pub mode: PositionMode,
    pub exit_mode: ExitMode,
}

impl PositionPolicy {
    pub fn permits(&self, side: crate::side::Side) -> bool {
        match (self.mode, side) {
            (PositionMode::Both, _) => true,
            (PositionMode::Long, crate::side::Side::Long) => true,
            (PositionMode::Short, crate::side::Side::Short) => true,
            _ => false,
        }
    }
}
