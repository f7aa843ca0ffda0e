use thiserror::Error;

/// Errors raised by the deterministic simulated exchange (§4.6, §7 `ExchangeError`/`InvariantError`).
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SimExchangeError {
    /// Entry gate rejection: `free_margin < position_IM + est_open_fee(+est_close_fee)` (§4.6
    /// "Entry gate").
    #[error("insufficient free margin: required {required}, available {available}")]
    InsufficientMargin { required: f64, available: f64 },

    /// Order size below the instrument's `min_notional` (§4.6 Constraints module).
    #[error("order notional {notional} below min_notional {min_notional}")]
    BelowMinNotional { notional: f64, min_notional: f64 },

    /// A ledger invariant (§3, §8) was violated mid-run — always fatal.
    #[error("ledger invariant violated: {0}")]
    LedgerInvariant(#[from] playbook_instrument::LedgerInvariantViolation),

    /// A caller attempted to open a second position while one was already open on this symbol.
    #[error("position already open on this symbol")]
    PositionAlreadyOpen,

    /// A caller attempted to close/mark a position that does not exist.
    #[error("no open position")]
    NoOpenPosition,
}
