#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Incremental technical indicators for the Playbook engine (§4.2).
//!
//! Every indicator here is a pure streaming computation over closed bars: `update` absorbs one
//! more candle, `value` reads the current output, `is_ready` reports whether enough bars have
//! accumulated for that output to be meaningful. [`registry::build_indicator`] resolves a
//! declarative `FeatureDecl` (owned by `playbook-instrument`) to a concrete boxed indicator.

pub mod core;
pub mod error;
pub mod macd;
pub mod momentum;
pub mod primitives;
pub mod registry;
pub mod trend;
pub mod trend_strength;
pub mod volatility;
pub mod volume;

pub use core::{Indicator, IndicatorOutput};
pub use error::TaError;
pub use primitives::{DequeMode, MonotonicDeque, RingBuffer};
pub use registry::{build_indicator, RegisteredIndicator};
