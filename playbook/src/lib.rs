#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! Playbook: a deterministic crypto-derivatives strategy backtesting and live-trading engine.
//!
//! This crate is the top-level orchestrator of the Playbook workspace. It owns none of the
//! domain logic itself — that lives in `playbook-instrument` (data model), `playbook-ta`
//! (indicators), `playbook-structure` (structure detectors), `playbook-dsl` (the Play strategy
//! language) and the exchange crates — and instead wires them together into one engine that
//! steps bars, evaluates a compiled Play, and drives a simulated or live exchange (§4.5).
//!
//! [`engine::Engine`] is the crate's entry point for a single run; [`runner::run_backtest`]
//! drives one to completion and produces the §6 content-hashed artifacts.

pub mod data_provider;
pub mod engine;
pub mod error;
pub mod runner;
pub mod state;
pub mod sub_loop;
pub mod tf_stream;
pub mod warmup;

pub use data_provider::{crosses_boundary, DataProvider, InMemoryDataProvider};
pub use engine::{Engine, EngineHaltReason, StepOutcome};
pub use error::{ConfigError, DataError, EngineError, ExchangeError, InvariantError, RuntimeError, ValidationError};
pub use runner::{run_backtest, RunArtifacts, RunEnvironment};
pub use state::{EngineState, StateMachine};
pub use warmup::{compute_warmup_requirements, RoleWarmup, WarmupReport};
