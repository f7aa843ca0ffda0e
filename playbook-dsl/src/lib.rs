#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    clippy::unused_self,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! The declarative Play strategy language (§4.4): parse YAML shorthand into a typed expression
//! tree, compile every reference against a Play's feature/structure registries, and evaluate the
//! compiled tree against a [`playbook_instrument::Snapshot`] under three-valued semantics.
//!
//! [`play::CompiledPlay`] is the crate's top-level entry point: it owns parsing, compilation and
//! the `play_hash` computation end to end, since compiling a Play's action blocks requires the
//! declared feature/structure registries it also owns.

pub mod ast;
pub mod compile;
pub mod error;
pub mod eval;
pub mod parse;
pub mod play;
pub mod risk;
pub mod value;

pub use ast::{ArithOp, Block, Case, CmpOp, Expr, Operand, Scalar, WindowOp};
pub use compile::{
    assign_window_ids, compile_block, compile_expr, compile_setups, referenced_features,
    referenced_structures, CompileContext, CompiledBlock, ResolvedCase, ResolvedCondition,
    ResolvedExpr, ResolvedOperand, ResolvedWindowOp,
};
pub use error::DslError;
pub use eval::{evaluate_block, evaluate_blocks, BlockOutcome, Evaluator, WindowHistory};
pub use parse::{normalize_fib_bracket, parse_block, parse_duration_to_bars, parse_expr};
pub use play::CompiledPlay;
pub use risk::{RiskModel, SizingRule, StopRule};
pub use value::DslValue;
