use thiserror::Error;

/// Errors a [`crate::adapter::LiveExchangeAdapter`] implementation raises back to the engine
/// (§7 `ExchangeError`). The adapter itself owns retry/reconnect policy; these variants are what
/// survives up to the core after the adapter has given up on a given call.
#[derive(Debug, Clone, Error)]
pub enum LiveAdapterError {
    #[error("order submission rejected: {reason}")]
    SubmissionRejected { reason: String },

    #[error("adapter call timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("adapter is not connected")]
    NotConnected,

    #[error("adapter disconnected mid-call")]
    Disconnected,

    #[error("unknown symbol {symbol}")]
    UnknownSymbol { symbol: String },
}
