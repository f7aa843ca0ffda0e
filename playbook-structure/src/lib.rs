#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Incremental market-structure detectors for the Playbook engine (§4.3).
//!
//! Every detector here is a pure streaming computation over closed bars that reads its declared
//! dependencies (other detectors, indicator values) through a [`core::DetectorContext`] built
//! fresh each bar by the engine, rather than holding owned references to its peers.
//! [`registry::build_structures`] resolves a TF role's `StructureDecl` list into construction
//! order via topological sort.

pub mod core;
pub mod derived_zone;
pub mod error;
pub mod fibonacci;
pub mod market_structure;
pub mod registry;
pub mod rolling_window;
pub mod swing;
pub mod trend;
pub mod zone;

pub use core::{Detector, DetectorContext};
pub use derived_zone::{DerivedZone, SlotState, ZoneMode};
pub use error::StructureError;
pub use fibonacci::{level_key, FibMode, Fibonacci};
pub use market_structure::MarketStructure;
pub use registry::{build_structures, own_warmup_estimate, RegisteredStructure};
pub use rolling_window::RollingWindow;
pub use swing::Swing;
pub use trend::Trend;
pub use zone::{Zone, ZoneState};
