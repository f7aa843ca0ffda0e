#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! The deterministic simulated exchange (§4.6): a single-symbol, single-position USDT-linear
//! isolated-margin venue driven bar by bar from closed 1m candles, with the same constraints,
//! fee, funding and liquidation mechanics the engine expects from a live venue.
//!
//! [`exchange::SimulatedExchange`] is the crate's entry point; the other modules are its
//! independently-testable building blocks (tick/lot rounding, slippage/impact, funding, the
//! Bybit-aligned liquidation formula).

pub mod constraints;
pub mod error;
pub mod exchange;
pub mod execution;
pub mod funding;
pub mod ledger;
pub mod liquidation;
pub mod pricing;

pub use constraints::InstrumentConstraints;
pub use error::SimExchangeError;
pub use exchange::{order_from_signal, MinuteOutcome, SimulatedExchange};
pub use execution::{fee_for, FeeKind, ImpactModel, LiquidityCap, SlippageModel};
pub use funding::{funding_payment, is_funding_boundary, position_held_through_boundary, FundingRate};
pub use ledger::{margin_for_notional, recompute_and_check, INVARIANT_TOLERANCE};
pub use liquidation::{bankruptcy_price, is_liquidatable, maintenance_margin};
pub use pricing::{intrabar_path, quote_from_candle, MarkPriceSource, Quote};
