use thiserror::Error;

/// Errors raised while constructing or validating core data-model values.
///
/// These are the [`ConfigError`](crate::error::InstrumentError::Config) and
/// [`InvariantError`](crate::error::InstrumentError::Invariant) kinds described at the data-model
/// boundary; DSL-specific and engine-specific error kinds live in their own crates and wrap this
/// one via `#[from]`.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum InstrumentError {
    /// A candle violates one of the OHLCV invariants (`high >= low`, `ts_close = ts_open + tf`, ...).
    #[error("invalid candle: {0}")]
    InvalidCandle(String),

    /// A timeframe string could not be mapped to a known Bybit interval.
    #[error("unknown timeframe: {0}")]
    UnknownTimeframe(String),

    /// A `tf_role` reference (`low_tf`/`med_tf`/`high_tf`) does not resolve to a configured role.
    #[error("unknown timeframe role: {0}")]
    UnknownTfRole(String),

    /// A required top-level Play key was missing.
    #[error("missing required key: {0}")]
    MissingKey(&'static str),

    /// A candle was observed with a `bar_idx` at or before one already processed for its role.
    #[error("non-monotonic bar index for {role}: saw {got}, expected > {last_seen}")]
    NonMonotonicBarIndex {
        role: String,
        got: u64,
        last_seen: u64,
    },
}
