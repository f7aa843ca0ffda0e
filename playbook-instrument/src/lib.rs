#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Core data model for the Playbook deterministic backtesting and live-trading engine.
//!
//! This crate carries no behaviour of its own: it is the shared vocabulary — candles,
//! timeframes, Play declarations, snapshots, orders, positions, trades — that every other
//! Playbook crate (`playbook-ta`, `playbook-structure`, `playbook-dsl`, the exchange crates, and
//! the root `playbook` engine) builds on.

pub mod account;
pub mod candle;
pub mod equity;
pub mod error;
pub mod feature;
pub mod identity;
pub mod intent;
pub mod ledger;
pub mod order;
pub mod param;
pub mod position;
pub mod position_policy;
pub mod side;
pub mod signal;
pub mod snapshot;
pub mod structure_decl;
pub mod timeframe;
pub mod trade;

pub use account::{AccountConfig, FeeModel};
pub use candle::{Candle, InputSource};
pub use equity::EquityPoint;
pub use error::InstrumentError;
pub use feature::FeatureDecl;
pub use identity::PlayIdentity;
pub use intent::{ActionKind, Intent};
pub use ledger::{LedgerInvariantViolation, LedgerState};
pub use order::{Order, OrderType};
pub use param::ParamValue;
pub use position::Position;
pub use position_policy::{ExitMode, PositionMode, PositionPolicy};
pub use side::Side;
pub use signal::Signal;
pub use snapshot::{FieldHistory, FieldValue, Snapshot, ValueBundle};
pub use structure_decl::StructureDecl;
pub use timeframe::{TfRole, Timeframe, TimeframeMap};
pub use trade::{ExitReason, Trade};
