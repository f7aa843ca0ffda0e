//! Backtest runner (§6): drives an [`Engine`] to completion and assembles its content-hashed
//! artifacts (`trades.json`, `equity_curve.json`, `run_result.json`, `run_manifest.json`).
//!
//! Writing these to disk is an external collaborator's job (§1 Non-goals); this module only owns
//! the loop and the in-memory shapes `playbook-hash` knows how to hash.

use crate::engine::{Engine, EngineHaltReason, StepOutcome};
use crate::error::{EngineError, InvariantError};
use playbook_hash::{equity_hash, input_hash, run_hash, InputHashKey, RunHashKey, RunManifest, RunResult};
use playbook_instrument::{EquityPoint, Trade};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// What venue/funding data a run was backtested against, folded into `input_hash` (§6) so two
/// runs over different data never collide on the same hash.
#[derive(Debug, Clone, Copy)]
pub struct RunEnvironment<'a> {
    pub data_env: &'a str,
    pub funding_env: &'a str,
    pub window: (i64, i64),
}

/// Everything a completed backtest produced.
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub result: RunResult,
    pub manifest: RunManifest,
}

/// Step `engine` until its data provider is exhausted or a halting condition fires, then compute
/// the §6 hash set over the resulting trades/equity curve.
pub fn run_backtest(mut engine: Engine, env: RunEnvironment<'_>) -> Result<(RunArtifacts, Option<EngineHaltReason>), EngineError> {
    let mut halt = None;
    loop {
        match engine.step()? {
            StepOutcome::Processed | StepOutcome::WarmingUp => {}
            StepOutcome::EndOfData => break,
            StepOutcome::Halted(reason) => {
                halt = Some(reason);
                break;
            }
        }
    }

    let play = engine.play();
    let trades = engine.trades().to_vec();
    let equity_curve = engine.equity_curve().to_vec();

    let input_key = InputHashKey {
        play_hash: &play.play_hash,
        window: env.window,
        symbol: play.identity.symbol.as_str(),
        data_env: env.data_env,
        funding_env: env.funding_env,
    };
    let input_hash_value = input_hash(&input_key).map_err(InvariantError::from)?;
    let trades_hash_value = playbook_hash::trades_hash(&trades).map_err(InvariantError::from)?;
    let equity_hash_value = equity_hash(&equity_curve).map_err(InvariantError::from)?;
    let run_hash_value = run_hash(&RunHashKey {
        play_hash: &play.play_hash,
        input_hash: &input_hash_value,
        trades_hash: &trades_hash_value,
        equity_hash: &equity_hash_value,
    })
    .map_err(InvariantError::from)?;

    // `play_hash` is already computed at compile time (`CompiledPlay::play_hash`); the runner
    // trusts that stored value rather than recomputing it from the same canonicalization.
    let (net_pnl, win_rate, max_drawdown_pct) = summarize(&trades, &equity_curve, play.account.starting_equity_usdt);

    let result = RunResult {
        net_pnl,
        total_trades: trades.len() as u64,
        win_rate,
        max_drawdown_pct,
        trades_hash: trades_hash_value,
        equity_hash: equity_hash_value,
        run_hash: run_hash_value,
        play_hash: play.play_hash.clone(),
        input_hash: input_hash_value,
    };

    let manifest = RunManifest {
        play_id: play.identity.id.to_string(),
        play_version: play.identity.version.to_string(),
        play_hash: play.play_hash.clone(),
        window_start_ts: env.window.0,
        window_end_ts: env.window.1,
        symbol: play.identity.symbol.to_string(),
        engine_version: env!("CARGO_PKG_VERSION").to_string(),
        rust_version: option_env!("RUSTC_VERSION").unwrap_or("unknown"),
    };

    Ok((RunArtifacts { trades, equity_curve, result, manifest }, halt))
}

fn summarize(trades: &[Trade], equity_curve: &[EquityPoint], starting_equity: Decimal) -> (Decimal, f64, f64) {
    let net_pnl: Decimal = trades.iter().map(|t| t.realized_pnl - t.fees + t.funding).sum();

    let win_rate = if trades.is_empty() {
        0.0
    } else {
        let wins = trades.iter().filter(|t| t.realized_pnl > Decimal::ZERO).count();
        wins as f64 / trades.len() as f64
    };

    let mut peak = starting_equity;
    let mut max_drawdown_pct = 0.0f64;
    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        }
        if peak > Decimal::ZERO {
            let drawdown = ((peak - point.equity) / peak).to_f64().unwrap_or(0.0) * 100.0;
            if drawdown > max_drawdown_pct {
                max_drawdown_pct = drawdown;
            }
        }
    }

    (net_pnl, win_rate, max_drawdown_pct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use playbook_instrument::{ExitReason, Side};
    use rust_decimal_macros::dec;

    fn trade(pnl: Decimal) -> Trade {
        Trade {
            entry_ts: 0,
            entry_price: dec!(100),
            exit_ts: 60_000,
            exit_price: dec!(101),
            side: Side::Long,
            size_usdt: dec!(1000),
            realized_pnl: pnl,
            fees: dec!(0),
            funding: dec!(0),
            mae_pct: dec!(0),
            mfe_pct: dec!(0),
            exit_reason: ExitReason::Signal,
        }
    }

    #[test]
    fn win_rate_counts_strictly_positive_pnl_trades() {
        let trades = vec![trade(dec!(10)), trade(dec!(-5)), trade(dec!(0))];
        let (_, win_rate, _) = summarize(&trades, &[], dec!(1000));
        assert!((win_rate - (1.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn max_drawdown_tracks_the_worst_dip_from_the_running_peak() {
        let points = vec![
            EquityPoint { ts: 0, equity: dec!(1000), cash: dec!(1000), unrealized: dec!(0), used_margin: dec!(0) },
            EquityPoint { ts: 1, equity: dec!(1200), cash: dec!(1200), unrealized: dec!(0), used_margin: dec!(0) },
            EquityPoint { ts: 2, equity: dec!(900), cash: dec!(900), unrealized: dec!(0), used_margin: dec!(0) },
            EquityPoint { ts: 3, equity: dec!(1100), cash: dec!(1100), unrealized: dec!(0), used_margin: dec!(0) },
        ];
        let (_, _, max_drawdown_pct) = summarize(&[], &points, dec!(1000));
        assert!((max_drawdown_pct - 25.0).abs() < 1e-9);
    }
}
