#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! The live exchange adapter contract (§4.7): a read-only mapping from a concrete venue's account
//! state onto the shape the engine expects, plus the bounded closed-candle queue a real adapter
//! feeds asynchronously (§5).
//!
//! This crate deliberately contains no venue implementation — only the trait a venue integration
//! must satisfy, and the small amount of plumbing (the candle queue, the stream adapter) that is
//! genuinely shared between any such integration.

pub mod adapter;
pub mod error;
pub mod queue;

pub use adapter::{closed_candle_stream, Balance, LiveExchangeAdapter, VenueId};
pub use error::LiveAdapterError;
pub use queue::ClosedCandleQueue;
