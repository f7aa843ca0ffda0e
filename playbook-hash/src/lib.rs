#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Canonical JSON and the Playbook artifact hashing contract (§6).
//!
//! This crate owns two things: a canonical JSON encoder (sorted keys, no whitespace, explicit
//! `NaN`/`Infinity` rejection) and the five content hashes derived from it (`play_hash`,
//! `input_hash`, `trades_hash`, `equity_hash`, `run_hash`). Writing the artifacts themselves to
//! disk is out of scope (§1); [`contracts`] only carries the in-memory serializable shapes.

pub mod canonical;
pub mod contracts;
pub mod error;
pub mod hash;

pub use canonical::canonical_json;
pub use contracts::{ConfigSource, PipelineSignature, RunManifest, RunResult};
pub use error::HashError;
pub use hash::{
    equity_hash, input_hash, play_hash, run_hash, sha256_hex, sha256_hex_prefix, trades_hash,
    InputHashKey, RunHashKey,
};
