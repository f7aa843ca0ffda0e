//! The engine's state machine (§4.5): `CREATED -> WARMING_UP -> READY -> RUNNING <-> RECONNECTING
//! -> STOPPING -> STOPPED | ERROR`, with an explicit `ERROR -> STOPPING` edge so a fatal error can
//! still force-close positions and flush artifacts before the run ends.
//!
//! Guarded by a single lock rather than threaded through every call site, mirroring how the
//! teacher crate keeps its engine state behind one owned value instead of scattering `AtomicBool`s
//! (§9 redesign notes: one lock, not several).

use crate::error::ValidationError;
use parking_lot::Mutex;

/// One of the engine's lifecycle states (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Created,
    WarmingUp,
    Ready,
    Running,
    Reconnecting,
    Stopping,
    Stopped,
    Error,
}

impl EngineState {
    fn allowed_transitions(self) -> &'static [EngineState] {
        use EngineState::*;
        match self {
            Created => &[WarmingUp, Stopping, Error],
            WarmingUp => &[Ready, Stopping, Error],
            Ready => &[Running, Stopping, Error],
            Running => &[Reconnecting, Stopping, Error],
            Reconnecting => &[Running, Stopping, Error],
            Stopping => &[Stopped, Error],
            Stopped => &[],
            Error => &[Stopping],
        }
    }
}

/// Lock-protected holder for the engine's current [`EngineState`].
#[derive(Debug)]
pub struct StateMachine {
    inner: Mutex<EngineState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self { inner: Mutex::new(EngineState::Created) }
    }

    pub fn current(&self) -> EngineState {
        *self.inner.lock()
    }

    /// Attempt to move to `to`, failing with [`ValidationError::InvalidStateTransition`] if the
    /// edge isn't in the state machine's allowed set.
    pub fn transition(&self, to: EngineState) -> Result<(), ValidationError> {
        let mut guard = self.inner.lock();
        if !guard.allowed_transitions().contains(&to) {
            return Err(ValidationError::InvalidStateTransition { from: *guard, to });
        }
        *guard = to;
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walks_the_happy_path() {
        let sm = StateMachine::new();
        sm.transition(EngineState::WarmingUp).unwrap();
        sm.transition(EngineState::Ready).unwrap();
        sm.transition(EngineState::Running).unwrap();
        sm.transition(EngineState::Stopping).unwrap();
        sm.transition(EngineState::Stopped).unwrap();
        assert_eq!(sm.current(), EngineState::Stopped);
    }

    #[test]
    fn reconnecting_round_trips_back_to_running() {
        let sm = StateMachine::new();
        sm.transition(EngineState::WarmingUp).unwrap();
        sm.transition(EngineState::Ready).unwrap();
        sm.transition(EngineState::Running).unwrap();
        sm.transition(EngineState::Reconnecting).unwrap();
        sm.transition(EngineState::Running).unwrap();
        assert_eq!(sm.current(), EngineState::Running);
    }

    #[test]
    fn error_can_still_reach_stopping() {
        let sm = StateMachine::new();
        sm.transition(EngineState::Error).unwrap();
        sm.transition(EngineState::Stopping).unwrap();
        assert_eq!(sm.current(), EngineState::Stopping);
    }

    #[test]
    fn stopped_is_terminal() {
        let sm = StateMachine::new();
        sm.transition(EngineState::Stopping).unwrap();
        sm.transition(EngineState::Stopped).unwrap();
        assert!(sm.transition(EngineState::Running).is_err());
    }

    #[test]
    fn skipping_warmup_is_rejected() {
        let sm = StateMachine::new();
        assert!(sm.transition(EngineState::Running).is_err());
    }
}
