//! End-to-end engine scenarios mirroring the concrete worked examples: a bullish EMA cross that
//! opens and later force-closes a position, the warmup gate suppressing signal evaluation until
//! a Play's declared features have enough bars behind them, and rerun determinism of the content
//! hashes a completed run produces.

use playbook::{run_backtest, DataProvider, Engine, InMemoryDataProvider, RunEnvironment, StepOutcome};
use playbook_dsl::CompiledPlay;
use playbook_instrument::Candle;
use rust_decimal::prelude::ToPrimitive;

const TF_BLOCK: &str = r#"
timeframes:
  low_tf: 1m
  med_tf: 1m
  high_tf: 1m
  exec: low_tf
account:
  starting_equity_usdt: "1000"
  max_leverage: "5"
  fee_model:
    maker: "0"
    taker: "0"
"#;

fn flat_candle(ts_open: i64, price: f64) -> Candle {
    Candle::new(ts_open, ts_open + 60_000, price, price, price, price, 10.0, 1).unwrap()
}

/// A 1m candle series: `warmup_bars` flat bars at `warmup_price`, followed by `closes`.
fn candle_series(warmup_bars: usize, warmup_price: f64, closes: &[f64]) -> Vec<Candle> {
    let mut out = Vec::with_capacity(warmup_bars + closes.len());
    let mut ts = 0i64;
    for _ in 0..warmup_bars {
        out.push(flat_candle(ts, warmup_price));
        ts += 60_000;
    }
    for &price in closes {
        out.push(flat_candle(ts, price));
        ts += 60_000;
    }
    out
}

fn provider_from(candles: Vec<Candle>) -> Box<dyn DataProvider> {
    Box::new(InMemoryDataProvider::new(
        candles.clone(),
        candles.clone(),
        candles.clone(),
        candles,
    ))
}

/// §8 scenario 1 ("Two-bar EMA cross long"): a fast EMA(1) crossing above a slower EMA(2) opens a
/// long; the position rides to the end of the feed and is force-closed there. Twelve flat warmup
/// bars clear the engine's conservative `max(10, 5%)` safety margin (§4.2) before the scenario's
/// own price sequence runs, so the cross still fires on a clean, already-warm snapshot history.
#[test]
fn ema_cross_opens_long_and_force_closes_at_end_of_data() {
    let play_yaml = format!(
        r#"
id: ema-cross-demo
version: "1"
symbol: BTCUSDT
{TF_BLOCK}
features:
  - id: ema_1
    indicator: ema
    params:
      length: 1
    tf_role: low_tf
  - id: ema_2
    indicator: ema
    params:
      length: 2
    tf_role: low_tf
structures: []
setups: {{}}
actions:
  - id: enter-long
    when: ["ema_1", "cross_above", "ema_2"]
    emit: entry_long
risk:
  sizing:
    mode: fixed_usdt
    amount: "1000"
position_policy:
  mode: both
  exit_mode: first_hit
"#
    );
    let play = CompiledPlay::load(&play_yaml).unwrap();

    // 12 flat bars at 100 (warmup), then the scenario's own sequence.
    let candles = candle_series(12, 100.0, &[100.0, 100.0, 100.0, 100.0, 102.0, 102.0, 102.0, 104.0]);
    let provider = provider_from(candles);

    let mut engine = Engine::new(play, provider).unwrap();
    loop {
        match engine.step().unwrap() {
            StepOutcome::EndOfData | StepOutcome::Halted(_) => break,
            _ => {}
        }
    }

    let trades = engine.trades();
    assert_eq!(trades.len(), 1, "the cross should fire exactly once, not re-enter every subsequent bar");
    let trade = &trades[0];
    assert_eq!(trade.entry_price.to_f64().unwrap(), 102.0);
    assert_eq!(trade.exit_price.to_f64().unwrap(), 104.0);
    assert_eq!(trade.exit_reason, playbook_instrument::ExitReason::EndOfData);

    // (104 - 102) / 102 * 1000 ~= 19.607, zero fees/funding per this Play's account config.
    let net_pnl = trade.realized_pnl.to_f64().unwrap();
    assert!((net_pnl - 19.607_843).abs() < 1e-3, "net_pnl was {net_pnl}");
}

/// §8 scenario 3 ("Warmup gate"): a Play referencing a slow-warming feature must not evaluate any
/// action block — and therefore open no trade — until that feature's TF role has seen its full
/// computed warmup requirement, even though the entry condition below is trivially always true.
#[test]
fn warmup_gate_suppresses_signal_evaluation_until_required_bars_seen() {
    let play_yaml = format!(
        r#"
id: warmup-gate-demo
version: "1"
symbol: BTCUSDT
{TF_BLOCK}
features:
  - id: ema_slow
    indicator: ema
    params:
      length: 200
    tf_role: low_tf
structures: []
setups: {{}}
actions:
  - id: always-enter
    when: ["close", ">", 0]
    emit: entry_long
risk:
  sizing:
    mode: fixed_usdt
    amount: "100"
position_policy:
  mode: both
  exit_mode: first_hit
"#
    );
    let play = CompiledPlay::load(&play_yaml).unwrap();
    let required = playbook::compute_warmup_requirements(&play).low_tf.bars_required;
    assert!(required > 200, "the 200-length EMA plus the safety margin must exceed 200 bars");

    // One bar short of the requirement, then run past it.
    let candles = candle_series(required + 5, 100.0, &[]);
    let provider = provider_from(candles);
    let mut engine = Engine::new(play, provider).unwrap();

    let mut first_processed_bar = None;
    for i in 1..=(required + 5) {
        match engine.step().unwrap() {
            StepOutcome::WarmingUp => assert!(engine.trades().is_empty(), "no trade before warmup clears (bar {i})"),
            StepOutcome::Processed => {
                first_processed_bar.get_or_insert(i);
            }
            other => panic!("unexpected outcome at bar {i}: {other:?}"),
        }
    }
    let first_processed_bar = first_processed_bar.expect("warmup must clear before the feed runs out");
    assert_eq!(first_processed_bar, required, "signal evaluation begins on exactly the bar warmup clears");
    assert!(!engine.trades().is_empty(), "the always-true condition must fire once warmup clears");
}

fn determinism_play() -> &'static str {
    r#"
id: determinism-demo
version: "1"
symbol: BTCUSDT
timeframes:
  low_tf: 1m
  med_tf: 1m
  high_tf: 1m
  exec: low_tf
account:
  starting_equity_usdt: "1000"
  max_leverage: "5"
  fee_model:
    maker: "0.0002"
    taker: "0.0006"
features:
  - id: ema_1
    indicator: ema
    params:
      length: 1
    tf_role: low_tf
  - id: ema_2
    indicator: ema
    params:
      length: 2
    tf_role: low_tf
structures: []
setups: {}
actions:
  - id: enter-long
    when: ["ema_1", "cross_above", "ema_2"]
    emit: entry_long
risk:
  sizing:
    mode: fixed_usdt
    amount: "200"
position_policy:
  mode: both
  exit_mode: first_hit
"#
}

fn run_with_candles(candles: Vec<Candle>) -> playbook::RunArtifacts {
    let play = CompiledPlay::load(determinism_play()).unwrap();
    let provider = provider_from(candles);
    let engine = Engine::new(play, provider).unwrap();
    let env = RunEnvironment { data_env: "test-fixture", funding_env: "zero", window: (0, 1) };
    let (artifacts, _halt) = run_backtest(engine, env).unwrap();
    artifacts
}

/// §8 scenario 5 ("Determinism"): two independent runs over the same candle stream must produce
/// identical `trades_hash`/`equity_hash`/`run_hash`; perturbing a single candle's close by one
/// cent must change at least one of them.
#[test]
fn rerun_is_bit_identical_and_a_single_candle_change_breaks_the_hash() {
    let candles = candle_series(12, 100.0, &[100.0, 100.5, 101.0, 102.0, 101.5, 103.0]);

    let first = run_with_candles(candles.clone());
    let second = run_with_candles(candles.clone());
    assert_eq!(first.result.trades_hash, second.result.trades_hash);
    assert_eq!(first.result.equity_hash, second.result.equity_hash);
    assert_eq!(first.result.run_hash, second.result.run_hash);

    let mut perturbed = candles;
    let last = perturbed.len() - 1;
    let bumped_close = perturbed[last].close + 0.01;
    perturbed[last] = Candle::new(
        perturbed[last].ts_open,
        perturbed[last].ts_close,
        perturbed[last].open,
        perturbed[last].high.max(bumped_close),
        perturbed[last].low.min(bumped_close),
        bumped_close,
        perturbed[last].volume,
        1,
    )
    .unwrap();

    let third = run_with_candles(perturbed);
    assert_ne!(first.result.run_hash, third.result.run_hash, "a changed candle must change the run hash");
}
