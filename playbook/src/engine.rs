//! The engine (§4.5): owns one Play's compiled config, its three [`TfStream`]s, the simulated
//! exchange, and the state machine, and advances one closed low_tf bar at a time.
//!
//! `low_tf`/`exec` are always the same role (`TimeframeMap::validate`); every [`step`](Engine::step)
//! pulls exactly one low_tf bar, folds in any med_tf/high_tf bar that closed on the same boundary,
//! then walks that bar's 1m sub-loop once warmup has cleared.

use crate::data_provider::{crosses_boundary, DataProvider};
use crate::error::{ConfigError, EngineError, ExchangeError, ValidationError};
use crate::state::{EngineState, StateMachine};
use crate::sub_loop;
use crate::tf_stream::TfStream;
use crate::warmup::{compute_warmup_requirements, WarmupReport};
use playbook_dsl::{CompiledPlay, WindowHistory};
use playbook_exchange_sim::{
    FundingRate, ImpactModel, InstrumentConstraints, LiquidityCap, MarkPriceSource, SimulatedExchange, SlippageModel,
};
use playbook_instrument::{EquityPoint, ExitReason, TfRole};
use rust_decimal::Decimal;
use tracing::{info, warn};

/// Why a run stopped before its data source was exhausted (§4.5 point 4, §7 propagation policy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineHaltReason {
    MaxDrawdownBreached,
    InvariantViolation(String),
    DataGap(String),
}

/// What one [`Engine::step`] call accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A bar was fully processed (warmup had already cleared).
    Processed,
    /// A bar advanced the TF streams but warmup has not cleared yet; no sub-loop ran.
    WarmingUp,
    /// The data provider is exhausted; any open position was force-closed and the engine stopped.
    EndOfData,
    /// A halting condition fired; any open position was force-closed and the engine stopped.
    Halted(EngineHaltReason),
}

/// The Bybit-typical maintenance margin rate used when a Play doesn't carry its own instrument
/// microstructure config (§9 Open Question: `CompiledPlay` has no constraints/slippage/funding
/// fields, so the engine supplies conservative, zero-friction defaults — see DESIGN.md).
fn default_maintenance_margin_rate() -> Decimal {
    Decimal::new(5, 3) // 0.5%
}

/// Drives one Play end to end against a [`DataProvider`] and a [`SimulatedExchange`] (§4.5).
#[derive(Debug)]
pub struct Engine {
    play: CompiledPlay,
    state: StateMachine,
    provider: Box<dyn DataProvider>,
    exchange: SimulatedExchange,
    low_stream: TfStream,
    med_stream: TfStream,
    high_stream: TfStream,
    windows: WindowHistory,
    warmup: WarmupReport,
    equity_curve: Vec<EquityPoint>,
    last_ts_close: Option<i64>,
}

impl Engine {
    pub fn new(play: CompiledPlay, provider: Box<dyn DataProvider>) -> Result<Self, EngineError> {
        play.timeframes.validate().map_err(ConfigError::from)?;

        let low_stream = TfStream::build(TfRole::LowTf, play.timeframes.low_tf, &play.features, &play.structures)?;
        let med_stream = TfStream::build(TfRole::MedTf, play.timeframes.med_tf, &play.features, &play.structures)?;
        let high_stream = TfStream::build(TfRole::HighTf, play.timeframes.high_tf, &play.features, &play.structures)?;

        let exchange = SimulatedExchange::new(
            play.identity.symbol.clone(),
            play.account,
            InstrumentConstraints::default(),
            SlippageModel::none(),
            LiquidityCap::unbounded(),
            ImpactModel::none(),
            MarkPriceSource::default(),
            default_maintenance_margin_rate(),
            FundingRate(Decimal::ZERO),
        );

        let warmup = compute_warmup_requirements(&play);
        let windows = WindowHistory::new(play.window_slot_count);

        Ok(Self {
            play,
            state: StateMachine::new(),
            provider,
            exchange,
            low_stream,
            med_stream,
            high_stream,
            windows,
            warmup,
            equity_curve: Vec::new(),
            last_ts_close: None,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state.current()
    }

    pub fn play(&self) -> &CompiledPlay {
        &self.play
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn warmup_report(&self) -> WarmupReport {
        self.warmup
    }

    fn stream_mut(&mut self, role: TfRole) -> &mut TfStream {
        match role {
            TfRole::LowTf => &mut self.low_stream,
            TfRole::MedTf => &mut self.med_stream,
            TfRole::HighTf => &mut self.high_stream,
        }
    }

    /// Pull and process the next closed low_tf bar. Returns `Ok(StepOutcome::EndOfData)` once the
    /// provider has nothing left (§4.5 "end-of-data settlement").
    ///
    /// A fatal error (§7: `ConfigError`/`ValidationError`/`DataError`/`InvariantError`, or an
    /// unrecoverable `ExchangeError`) forces the state machine to `ERROR` before it propagates;
    /// a non-fatal `RuntimeError` is left for the caller to log and step past.
    pub fn step(&mut self) -> Result<StepOutcome, EngineError> {
        self.step_inner().map_err(|err| {
            if err.is_fatal() {
                warn!(play_id = %self.play.identity.id, error = %err, "fatal error, forcing ERROR state");
                let _ = self.state.transition(EngineState::Error);
            }
            err
        })
    }

    fn step_inner(&mut self) -> Result<StepOutcome, EngineError> {
        if matches!(self.state.current(), EngineState::Stopped | EngineState::Stopping) {
            return Ok(StepOutcome::EndOfData);
        }

        let Some(candle) = self.provider.next_low_tf_candle() else {
            self.finalize(ExitReason::EndOfData)?;
            return Ok(StepOutcome::EndOfData);
        };
        self.last_ts_close = Some(candle.ts_close);

        self.low_stream.update(&candle)?;
        for role in [TfRole::MedTf, TfRole::HighTf] {
            let tf_minutes = self.play.timeframes.resolve(role).minutes();
            if crosses_boundary(candle.ts_close, tf_minutes) {
                if let Some(higher_candle) = self.provider.closed_candle_at(role, candle.ts_close) {
                    self.stream_mut(role).update(&higher_candle)?;
                }
            }
        }

        self.advance_lifecycle()?;
        if !self.warmup.all_ready() {
            self.record_equity_point(candle.ts_close);
            return Ok(StepOutcome::WarmingUp);
        }

        let minute_candles = self.provider.minute_candles(candle.ts_open, candle.ts_close);
        let mut indicators = self.low_stream.indicator_values().clone();
        indicators.extend(self.med_stream.indicator_values().clone());
        indicators.extend(self.high_stream.indicator_values().clone());
        let mut structures = self.low_stream.structure_values().clone();
        structures.extend(self.med_stream.structure_values().clone());
        structures.extend(self.high_stream.structure_values().clone());

        sub_loop::run_sub_loop(
            &self.play,
            &mut self.exchange,
            &mut self.windows,
            &candle,
            self.low_stream.bar_counter() as u64,
            &minute_candles,
            &indicators,
            &structures,
        )?;

        self.record_equity_point(candle.ts_close);

        if let Some(reason) = self.check_max_drawdown() {
            self.finalize(ExitReason::ForceClose)?;
            return Ok(StepOutcome::Halted(reason));
        }

        Ok(StepOutcome::Processed)
    }

    /// `trades()` mirrors the simulated exchange's run-scoped trade list (§3 Trade).
    pub fn trades(&self) -> &[playbook_instrument::Trade] {
        self.exchange.trades()
    }

    fn advance_lifecycle(&mut self) -> Result<(), EngineError> {
        self.warmup = self
            .warmup
            .with_bars_seen(TfRole::LowTf, self.low_stream.bar_counter())
            .with_bars_seen(TfRole::MedTf, self.med_stream.bar_counter())
            .with_bars_seen(TfRole::HighTf, self.high_stream.bar_counter());

        match self.state.current() {
            EngineState::Created => {
                self.state.transition(EngineState::WarmingUp).map_err(ValidationError::from)?;
                info!(play_id = %self.play.identity.id, "engine warming up");
            }
            EngineState::WarmingUp if self.warmup.all_ready() => {
                self.state.transition(EngineState::Ready).map_err(ValidationError::from)?;
                self.state.transition(EngineState::Running).map_err(ValidationError::from)?;
                info!(play_id = %self.play.identity.id, "warmup cleared, engine running");
            }
            EngineState::Ready => self.state.transition(EngineState::Running).map_err(ValidationError::from)?,
            _ => {}
        }
        Ok(())
    }

    fn record_equity_point(&mut self, ts: i64) {
        let ledger = self.exchange.ledger();
        self.equity_curve.push(EquityPoint {
            ts,
            equity: ledger.equity,
            cash: ledger.cash_balance,
            unrealized: ledger.unrealized_pnl,
            used_margin: ledger.used_margin,
        });
    }

    /// `equity < initial_equity * (1 - max_drawdown_pct / 100)` (§4.5 point 4). `None` disables
    /// the gate.
    fn check_max_drawdown(&self) -> Option<EngineHaltReason> {
        let pct = self.play.risk.max_drawdown_pct?;
        let equity = self.exchange.ledger().equity;
        let floor = self.play.account.starting_equity_usdt * (Decimal::ONE - pct / Decimal::from(100));
        (equity < floor).then_some(EngineHaltReason::MaxDrawdownBreached)
    }

    /// Close any open position at the last quote, then walk the state machine to `STOPPED`
    /// (§4.5, §7 "InvariantError, DataError, and max-drawdown halt the engine and transition to
    /// ERROR").
    fn finalize(&mut self, reason: ExitReason) -> Result<(), EngineError> {
        if self.exchange.position().is_some() {
            let ts = self.last_ts_close.unwrap_or_default();
            let price = self.exchange.quote().last_price;
            self.exchange.force_close(price, ts, reason).map_err(ExchangeError::from)?;
        }
        if matches!(self.state.current(), EngineState::Running | EngineState::Reconnecting) && reason != ExitReason::EndOfData {
            warn!(play_id = %self.play.identity.id, ?reason, "engine halting");
            self.state.transition(EngineState::Error).map_err(ValidationError::from)?;
        }
        if self.state.current() != EngineState::Stopping {
            self.state.transition(EngineState::Stopping).map_err(ValidationError::from)?;
        }
        self.state.transition(EngineState::Stopped).map_err(ValidationError::from)?;
        info!(play_id = %self.play.identity.id, ?reason, "engine stopped");
        Ok(())
    }
}
