//! The engine's unified error taxonomy (§7): every sub-crate error composed into one type, split
//! into recoverable and unrecoverable the way the rest of this codebase splits engine errors.
//!
//! `ConfigError`/`ValidationError` are raised at load/preflight time, before a run ever starts.
//! `RuntimeError` covers per-bar conditions the engine logs and steps past. `DataError` and
//! `InvariantError` always halt the engine (§4.5 point 4, §8). `ExchangeError` wraps both the
//! simulated and live exchange crates' errors; most variants are recoverable (a rejected order,
//! a dropped connection) but a ledger invariant violation surfacing through it is not.

use playbook_instrument::TfRole;
use thiserror::Error;

/// Errors raised while loading or compiling a Play, before any bar is processed.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Dsl(#[from] playbook_dsl::DslError),
    #[error(transparent)]
    Instrument(#[from] playbook_instrument::InstrumentError),
    #[error(transparent)]
    Indicator(#[from] playbook_ta::TaError),
    #[error(transparent)]
    Structure(#[from] playbook_structure::StructureError),
}

/// Errors raised during preflight validation of a compiled Play against its run window/data.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("{role} needs {required} warmup bars, only {have} available before the run window")]
    WarmupShortfall { role: TfRole, have: usize, required: usize },

    #[error("data gap: {detail}")]
    DataGap { detail: String },

    #[error("timeframe mapping inconsistent: {0}")]
    TimeframeMappingInconsistent(String),

    #[error("illegal engine state transition: {from:?} -> {to:?}")]
    InvalidStateTransition { from: crate::state::EngineState, to: crate::state::EngineState },
}

/// Conditions the engine logs and steps past without halting (§7 Recoverable).
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    #[error("malformed candle at {ts_close}: {detail}")]
    MalformedCandle { ts_close: i64, detail: String },

    #[error("missing {role} candle at boundary ts_close={ts_close}, forward-filling stale values")]
    MissingBoundaryCandle { role: TfRole, ts_close: i64 },
}

/// Historical-store gaps severe enough that the engine cannot keep stepping bars (§7 fatal).
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("no 1m coverage for exec window [{window_start}, {window_end}]")]
    NoMinuteCoverage { window_start: i64, window_end: i64 },
}

/// A data-model or ledger invariant was violated mid-run — always fatal (§3, §8).
#[derive(Debug, Clone, Error)]
pub enum InvariantError {
    #[error(transparent)]
    Ledger(#[from] playbook_instrument::LedgerInvariantViolation),

    #[error("duplicate bar index for {role}: {bar_idx}")]
    DuplicateBarIndex { role: String, bar_idx: u64 },

    #[error("non-monotonic timestamp for {role}: saw {ts}, last closed at {last_ts}")]
    NonMonotonicTimestamp { role: String, ts: i64, last_ts: i64 },

    #[error(transparent)]
    Hash(#[from] playbook_hash::HashError),
}

/// Errors surfaced by the simulated or live exchange (§7 `ExchangeError`).
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    #[error(transparent)]
    Sim(#[from] playbook_exchange_sim::SimExchangeError),
    #[error(transparent)]
    Live(#[from] playbook_exchange_live::LiveAdapterError),
}

impl ExchangeError {
    /// Whether this specific exchange error is one the engine can shrug off (reject the order,
    /// skip the tick, retry the connection) versus one that indicates the ledger itself is wrong.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ExchangeError::Sim(playbook_exchange_sim::SimExchangeError::LedgerInvariant(_)) => false,
            ExchangeError::Sim(_) => true,
            ExchangeError::Live(_) => true,
        }
    }
}

/// The engine's top-level error type (§7): every sub-crate error unified, with a
/// recoverable/unrecoverable split callers can act on without matching every variant.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("data error: {0}")]
    Data(#[from] DataError),
    #[error("invariant violated: {0}")]
    Invariant(#[from] InvariantError),
    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),
}

impl EngineError {
    /// Whether this error should transition the engine to `ERROR` and halt the run, versus being
    /// logged and stepped past (§7, §4.5 point 4).
    pub fn is_fatal(&self) -> bool {
        match self {
            EngineError::Config(_) | EngineError::Validation(_) => true,
            EngineError::Runtime(_) => false,
            EngineError::Data(_) | EngineError::Invariant(_) => true,
            EngineError::Exchange(e) => !e.is_recoverable(),
        }
    }
}
