//! The deterministic simulated exchange (§4.6): the Bybit-aligned counterpart of the live
//! exchange adapter, driving one symbol's USDT-linear isolated-margin account through closed 1m
//! candles via the engine's sub-loop.

use crate::constraints::InstrumentConstraints;
use crate::error::SimExchangeError;
use crate::execution::{fee_for, FeeKind, ImpactModel, LiquidityCap, SlippageModel};
use crate::funding::{funding_payment, is_funding_boundary, position_held_through_boundary, FundingRate};
use crate::ledger::recompute_and_check;
use crate::liquidation::{bankruptcy_price, is_liquidatable, maintenance_margin};
use crate::pricing::{quote_from_candle, MarkPriceSource, Quote};
use playbook_instrument::{AccountConfig, Candle, ExitReason, LedgerState, Order, OrderType, Position, Side, Trade};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use smol_str::SmolStr;
use tracing::{debug, info, warn};

fn decimal_from_f64(v: f64) -> Decimal {
    Decimal::from_f64_retain(v).unwrap_or(Decimal::ZERO)
}

fn f64_from_decimal(v: Decimal) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}

/// A queued entry/exit instruction awaiting the open of the next 1m bar (§4.6 "queued entries
/// fill on the OPEN of the NEXT 1m bar").
#[derive(Debug, Clone)]
struct QueuedOrder {
    order: Order,
}

/// Extra book-keeping the instrument-crate [`Position`] doesn't carry: resolved SL/TP price
/// levels and running excursion/funding accumulators for the trade this position will close into.
#[derive(Debug, Clone)]
struct OpenPositionState {
    position: Position,
    sl_price: Option<f64>,
    tp_price: Option<f64>,
    mae_pct: Decimal,
    mfe_pct: Decimal,
    funding_accum: Decimal,
}

/// Every fill/close event the exchange produced while processing one 1m bar, in chronological
/// order within that bar.
#[derive(Debug, Clone, Default)]
pub struct MinuteOutcome {
    pub trades: Vec<Trade>,
}

/// The deterministic simulated exchange for one symbol (§4.6). Owns the [`LedgerState`], the
/// current (at most one) open [`Position`], a single queued order, and the run-scoped trade list.
#[derive(Debug)]
pub struct SimulatedExchange {
    symbol: SmolStr,
    account: AccountConfig,
    constraints: InstrumentConstraints,
    slippage: SlippageModel,
    liquidity_cap: LiquidityCap,
    impact: ImpactModel,
    mark_source: MarkPriceSource,
    maintenance_margin_rate: Decimal,
    funding_rate: FundingRate,
    warned_zero_volume: bool,

    ledger: LedgerState,
    position: Option<OpenPositionState>,
    queued: Option<QueuedOrder>,
    quote: Quote,
    trades: Vec<Trade>,
}

impl SimulatedExchange {
    pub fn new(
        symbol: impl Into<SmolStr>,
        account: AccountConfig,
        constraints: InstrumentConstraints,
        slippage: SlippageModel,
        liquidity_cap: LiquidityCap,
        impact: ImpactModel,
        mark_source: MarkPriceSource,
        maintenance_margin_rate: Decimal,
        funding_rate: FundingRate,
    ) -> Self {
        let mut ledger = LedgerState {
            cash_balance: account.starting_equity_usdt,
            ..Default::default()
        };
        ledger.recompute();
        Self {
            symbol: symbol.into(),
            account,
            constraints,
            slippage,
            liquidity_cap,
            impact,
            mark_source,
            maintenance_margin_rate,
            funding_rate,
            warned_zero_volume: false,
            ledger,
            position: None,
            queued: None,
            quote: Quote {
                last_price: 0.0,
                mark_price: 0.0,
                mid: 0.0,
                spread: 0.0,
            },
            trades: Vec::new(),
        }
    }

    pub fn ledger(&self) -> &LedgerState {
        &self.ledger
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref().map(|p| &p.position)
    }

    pub fn quote(&self) -> Quote {
        self.quote
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Queue a Signal-derived order for the OPEN of the next 1m bar (§4.6). Only one order may be
    /// in flight at a time; a second queue attempt replaces the first (the DSL's "first block that
    /// fires wins" rule upstream already prevents this from being reachable in practice).
    pub fn queue_order(&mut self, order: Order) {
        self.queued = Some(QueuedOrder { order });
    }

    /// Whether an order is currently queued (diagnostic / test hook).
    pub fn has_queued_order(&self) -> bool {
        self.queued.is_some()
    }

    /// Process one closed 1m bar end to end (§4.6 "Signal-to-fill sequence per 1m bar"):
    /// fill any queued order at this bar's open, update marks, check TP/SL against the intrabar
    /// path, check liquidation, then apply funding if this bar's close lands on a funding
    /// boundary. The caller (the engine's sub-loop) evaluates the DSL *after* this returns, using
    /// the quote this produced, and queues any resulting order for the next call.
    pub fn process_minute(&mut self, candle: &Candle, ts_close: i64) -> Result<MinuteOutcome, SimExchangeError> {
        let mut outcome = MinuteOutcome::default();

        if let Some(queued) = self.queued.take() {
            if let Some(trade) = self.fill_queued(queued.order, candle.open, candle.ts_open)? {
                outcome.trades.push(trade);
            }
        }

        self.quote = quote_from_candle(candle, self.mark_source);
        self.mark_and_update_excursion(candle);
        recompute_unrealized(&mut self.ledger, self.position.as_ref());
        recompute_and_check(&mut self.ledger)?;

        if let Some(trade) = self.check_stops(candle, ts_close)? {
            outcome.trades.push(trade);
        }

        if self.position.is_some() {
            if let Some(trade) = self.check_liquidation(ts_close)? {
                outcome.trades.push(trade);
            }
        }

        if is_funding_boundary(ts_close) {
            self.apply_funding(ts_close)?;
        }

        Ok(outcome)
    }

    /// Mark the open position to this bar's quote and roll its running excursion extremes
    /// (§4.6 MAE/MFE): one pass so no caller holds a live borrow of `self.position` across a
    /// separate method call on `self`.
    fn mark_and_update_excursion(&mut self, candle: &Candle) {
        let mark_price = decimal_from_f64(self.quote.mark_price);
        let Some(state) = &mut self.position else { return };
        state.position.mark_to_market(mark_price);

        let entry = f64_from_decimal(state.position.entry_price);
        if entry == 0.0 {
            return;
        }
        let sign = state.position.side.sign();
        let (fav_price, adv_price) = match state.position.side {
            Side::Long => (candle.high, candle.low),
            Side::Short => (candle.low, candle.high),
        };
        let fav_pct = decimal_from_f64(((fav_price - entry) / entry) * sign);
        let adv_pct = decimal_from_f64(((adv_price - entry) / entry) * sign);
        state.mfe_pct = state.mfe_pct.max(fav_pct);
        state.mae_pct = state.mae_pct.min(adv_pct);
    }

    fn fill_queued(&mut self, order: Order, open_price: f64, ts: i64) -> Result<Option<Trade>, SimExchangeError> {
        let fill_price = self
            .constraints
            .round_price(self.slippage.apply(decimal_from_f64(open_price), order.side, order.reduce_only));

        // Classify against a snapshot of the current position first so the match below never
        // holds a borrow of `self.position` across the mutating calls it dispatches to.
        enum Action {
            Open,
            Increase,
            CloseThenMaybeFlip { existing_size: Decimal },
            Reduce,
        }

        let action = match &self.position {
            None => {
                if order.reduce_only {
                    debug!(symbol = %self.symbol, "reduce_only fill with no open position, dropping");
                    return Ok(None);
                }
                Action::Open
            }
            Some(state) if state.position.side == order.side => Action::Increase,
            Some(state) => {
                let existing_size = state.position.size_usdt;
                if order.size_usdt >= existing_size {
                    Action::CloseThenMaybeFlip { existing_size }
                } else {
                    Action::Reduce
                }
            }
        };

        match action {
            Action::Open => {
                self.open_position(order.side, order.size_usdt, fill_price, order.tp_price, order.sl_price, ts)?;
                Ok(None)
            }
            Action::Increase => {
                self.increase_position(order.size_usdt, fill_price)?;
                Ok(None)
            }
            Action::CloseThenMaybeFlip { existing_size } => {
                let trade = self.close_position(fill_price, ts, ExitReason::Signal, FeeKind::Taker)?;
                let remainder = order.size_usdt - existing_size;
                if !order.reduce_only && remainder > Decimal::ZERO {
                    self.open_position(order.side, remainder, fill_price, order.tp_price, order.sl_price, ts)?;
                }
                Ok(Some(trade))
            }
            Action::Reduce => {
                let trade = self.reduce_position(order.size_usdt, fill_price, ts, ExitReason::Signal)?;
                Ok(Some(trade))
            }
        }
    }

    fn entry_gate(&self, notional: Decimal, leverage: Decimal) -> Result<(), SimExchangeError> {
        if !self.constraints.meets_min_notional(notional) {
            return Err(SimExchangeError::BelowMinNotional {
                notional: f64_from_decimal(notional),
                min_notional: f64_from_decimal(self.constraints.min_notional),
            });
        }
        let required_margin = notional / leverage;
        let est_open_fee = fee_for(&self.account, FeeKind::Taker, notional);
        let required = required_margin + est_open_fee;
        if self.ledger.free_margin < required {
            return Err(SimExchangeError::InsufficientMargin {
                required: f64_from_decimal(required),
                available: f64_from_decimal(self.ledger.free_margin),
            });
        }
        Ok(())
    }

    fn open_position(
        &mut self,
        side: Side,
        size_usdt: Decimal,
        entry_price: Decimal,
        tp_price: Option<f64>,
        sl_price: Option<f64>,
        ts: i64,
    ) -> Result<(), SimExchangeError> {
        let leverage = self.account.max_leverage;
        self.entry_gate(size_usdt, leverage)?;

        let open_fee = fee_for(&self.account, FeeKind::Taker, size_usdt);
        self.ledger.cash_balance -= open_fee;
        self.ledger.used_margin += size_usdt / leverage;
        recompute_and_check(&mut self.ledger)?;

        self.position = Some(OpenPositionState {
            position: Position {
                symbol: self.symbol.clone(),
                side,
                size_usdt,
                entry_price,
                avg_entry_ts: ts,
                unrealized_pnl: Decimal::ZERO,
                mark_price: entry_price,
                leverage,
                sl_order_id: None,
                tp_order_id: None,
            },
            sl_price,
            tp_price,
            mae_pct: Decimal::ZERO,
            mfe_pct: Decimal::ZERO,
            funding_accum: Decimal::ZERO,
        });
        info!(symbol = %self.symbol, ?side, size = %size_usdt, price = %entry_price, "opened position");
        Ok(())
    }

    fn increase_position(&mut self, add_usdt: Decimal, fill_price: Decimal) -> Result<(), SimExchangeError> {
        let leverage = self.account.max_leverage;
        self.entry_gate(add_usdt, leverage)?;
        let open_fee = fee_for(&self.account, FeeKind::Taker, add_usdt);
        self.ledger.cash_balance -= open_fee;
        self.ledger.used_margin += add_usdt / leverage;

        let state = self.position.as_mut().expect("checked by caller");
        let old_notional = state.position.size_usdt;
        let new_notional = old_notional + add_usdt;
        // Weighted-average entry price across the combined notional.
        state.position.entry_price =
            (state.position.entry_price * old_notional + fill_price * add_usdt) / new_notional;
        state.position.size_usdt = new_notional;
        recompute_and_check(&mut self.ledger)
    }

    /// Reduce an open position by `reduce_usdt` notional, realizing the proportional PnL on that
    /// slice while the remainder stays open at the same entry price (§4.6 "On partial exit, used
    /// margin and maintenance margin update immediately to reflect new size").
    fn reduce_position(
        &mut self,
        reduce_usdt: Decimal,
        fill_price: Decimal,
        ts: i64,
        reason: ExitReason,
    ) -> Result<Trade, SimExchangeError> {
        let fee_kind = if reason == ExitReason::Tp { FeeKind::Maker } else { FeeKind::Taker };
        let state = self.position.as_mut().ok_or(SimExchangeError::NoOpenPosition)?;
        let leverage = state.position.leverage;
        let side = state.position.side;
        let entry_price = state.position.entry_price;
        let entry_ts = state.position.avg_entry_ts;
        let total_notional = state.position.size_usdt;
        let mae_pct = state.mae_pct;
        let mfe_pct = state.mfe_pct;
        let funding = state.funding_accum * (reduce_usdt / total_notional);

        let price_delta = match side {
            Side::Long => fill_price - entry_price,
            Side::Short => entry_price - fill_price,
        };
        let realized_pnl = reduce_usdt * price_delta / entry_price;
        let fee = fee_for(&self.account, fee_kind, reduce_usdt);

        self.ledger.cash_balance += realized_pnl - fee + funding;
        self.ledger.used_margin -= reduce_usdt / leverage;

        let state = self.position.as_mut().expect("checked above");
        state.position.size_usdt = total_notional - reduce_usdt;
        state.funding_accum -= funding;
        // size_usdt just changed; re-derive unrealized_pnl for the remainder at the same mark.
        let mark_price = state.position.mark_price;
        state.position.mark_to_market(mark_price);
        recompute_unrealized(&mut self.ledger, self.position.as_ref());
        recompute_and_check(&mut self.ledger)?;

        let trade = Trade {
            entry_ts,
            entry_price,
            exit_ts: ts,
            exit_price: fill_price,
            side,
            size_usdt: reduce_usdt,
            realized_pnl,
            fees: fee,
            funding,
            mae_pct,
            mfe_pct,
            exit_reason: reason,
        };
        self.trades.push(trade.clone());
        Ok(trade)
    }

    fn close_position(
        &mut self,
        fill_price: Decimal,
        ts: i64,
        reason: ExitReason,
        fee_kind: FeeKind,
    ) -> Result<Trade, SimExchangeError> {
        let state = self.position.take().ok_or(SimExchangeError::NoOpenPosition)?;
        let leverage = state.position.leverage;
        let notional = state.position.size_usdt;
        let price_delta = match state.position.side {
            Side::Long => fill_price - state.position.entry_price,
            Side::Short => state.position.entry_price - fill_price,
        };
        let realized_pnl = notional * price_delta / state.position.entry_price;
        let fee = fee_for(&self.account, fee_kind, notional);

        self.ledger.cash_balance += realized_pnl - fee + state.funding_accum;
        self.ledger.used_margin -= notional / leverage;
        // position is already taken out of self.position here, so the ledger is flat again.
        self.ledger.unrealized_pnl = Decimal::ZERO;
        recompute_and_check(&mut self.ledger)?;

        let trade = Trade {
            entry_ts: state.position.avg_entry_ts,
            entry_price: state.position.entry_price,
            exit_ts: ts,
            exit_price: fill_price,
            side: state.position.side,
            size_usdt: notional,
            realized_pnl,
            fees: fee,
            funding: state.funding_accum,
            mae_pct: state.mae_pct,
            mfe_pct: state.mfe_pct,
            exit_reason: reason,
        };
        self.trades.push(trade.clone());
        Ok(trade)
    }

    /// Check the open position's SL/TP against this bar's deterministic intrabar path (§4.6);
    /// whichever triggers first wins. SL is a market close (slippage applied); TP is a resting
    /// limit close (no slippage, maker fee).
    fn check_stops(&mut self, candle: &Candle, ts: i64) -> Result<Option<Trade>, SimExchangeError> {
        let Some(state) = &self.position else { return Ok(None) };
        let (sl, tp, side) = (state.sl_price, state.tp_price, state.position.side);
        if sl.is_none() && tp.is_none() {
            return Ok(None);
        }

        for price in candle.intrabar_path() {
            let sl_hit = sl.is_some_and(|sl| match side {
                Side::Long => price <= sl,
                Side::Short => price >= sl,
            });
            let tp_hit = tp.is_some_and(|tp| match side {
                Side::Long => price >= tp,
                Side::Short => price <= tp,
            });
            if sl_hit {
                let trigger = self.constraints.round_price(decimal_from_f64(sl.unwrap()));
                let fill = self.constraints.round_price(self.slippage.apply(trigger, side, true));
                return Ok(Some(self.close_position(fill, ts, ExitReason::Sl, FeeKind::Taker)?));
            }
            if tp_hit {
                let fill = self.constraints.round_price(decimal_from_f64(tp.unwrap()));
                return Ok(Some(self.close_position(fill, ts, ExitReason::Tp, FeeKind::Maker)?));
            }
        }
        Ok(None)
    }

    fn check_liquidation(&mut self, ts: i64) -> Result<Option<Trade>, SimExchangeError> {
        let Some(state) = &self.position else { return Ok(None) };
        let notional_at_mark = state.position.size_usdt;
        let mm = maintenance_margin(notional_at_mark, self.maintenance_margin_rate);
        if !is_liquidatable(self.ledger.equity, mm) {
            return Ok(None);
        }
        let taker_fee = self.account.fee_model.taker;
        let price = bankruptcy_price(
            state.position.entry_price,
            state.position.side,
            state.position.leverage,
            self.maintenance_margin_rate,
            taker_fee,
        );
        warn!(symbol = %self.symbol, %price, "position liquidated");
        Ok(Some(self.close_position(price, ts, ExitReason::Liquidation, FeeKind::Taker)?))
    }

    fn apply_funding(&mut self, ts: i64) -> Result<(), SimExchangeError> {
        let Some(state) = &mut self.position else { return Ok(()) };
        if !position_held_through_boundary(state.position.avg_entry_ts, ts) {
            return Ok(());
        }
        let payment = funding_payment(state.position.side, state.position.size_usdt, self.funding_rate);
        self.ledger.cash_balance -= payment;
        state.funding_accum -= payment;
        recompute_and_check(&mut self.ledger)
    }

    /// Force-close the open position (if any) at `price` — used for the max-drawdown gate and
    /// end-of-data settlement (§4.5 point 4, §3 Trade exit reasons).
    pub fn force_close(&mut self, price: f64, ts: i64, reason: ExitReason) -> Result<Option<Trade>, SimExchangeError> {
        if self.position.is_none() {
            return Ok(None);
        }
        let fill = self.constraints.round_price(decimal_from_f64(price));
        Ok(Some(self.close_position(fill, ts, reason, FeeKind::Taker)?))
    }

    /// Cap a requested order notional to this bar's liquidity ceiling and warn once if it
    /// actually binds (§4.6 "liquidity cap").
    pub fn cap_to_liquidity(&mut self, requested_notional: Decimal, candle: &Candle) -> Decimal {
        let bar_volume_notional = decimal_from_f64(candle.volume * candle.close);
        if bar_volume_notional.is_zero() {
            if !self.warned_zero_volume {
                warn!(symbol = %self.symbol, "zero bar volume, liquidity cap degenerates to 0");
                self.warned_zero_volume = true;
            }
            return requested_notional;
        }
        self.liquidity_cap.cap(requested_notional, bar_volume_notional)
    }
}

/// Re-derive the ledger's `unrealized_pnl` from the current open position (or zero, if flat).
fn recompute_unrealized(ledger: &mut LedgerState, position: Option<&OpenPositionState>) {
    ledger.unrealized_pnl = position.map(|s| s.position.unrealized_pnl).unwrap_or(Decimal::ZERO);
}

/// Build an [`Order`] from a sized [`playbook_instrument::Signal`] (the sub-loop's sizing step).
pub fn order_from_signal(
    signal: &playbook_instrument::Signal,
    reduce_only: bool,
    ts: i64,
) -> Order {
    Order {
        id: SmolStr::new(format!("ord-{ts}")),
        symbol: SmolStr::new(""),
        side: signal.side,
        size_usdt: signal.size_usdt,
        order_type: OrderType::Market,
        reduce_only,
        tp_price: signal.tp_price,
        sl_price: signal.sl_price,
        ts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playbook_instrument::FeeModel;
    use rust_decimal_macros::dec;

    fn account() -> AccountConfig {
        AccountConfig {
            starting_equity_usdt: dec!(1000),
            max_leverage: dec!(10),
            fee_model: FeeModel {
                maker: dec!(0.0002),
                taker: dec!(0.0006),
            },
        }
    }

    fn exchange() -> SimulatedExchange {
        SimulatedExchange::new(
            "BTCUSDT",
            account(),
            InstrumentConstraints {
                tick_size: dec!(0.1),
                lot_size: dec!(0.001),
                min_notional: dec!(5),
            },
            SlippageModel::none(),
            LiquidityCap::unbounded(),
            ImpactModel::none(),
            MarkPriceSource::LastClose,
            dec!(0.005),
            FundingRate(Decimal::ZERO),
        )
    }

    fn candle(ts_open: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(ts_open, ts_open + 60_000, open, high, low, close, 100.0, 1).unwrap()
    }

    fn queue_long(ex: &mut SimulatedExchange, size: Decimal, sl: Option<f64>, tp: Option<f64>, ts: i64) {
        ex.queue_order(Order {
            id: SmolStr::new("o1"),
            symbol: SmolStr::new("BTCUSDT"),
            side: Side::Long,
            size_usdt: size,
            order_type: OrderType::Market,
            reduce_only: false,
            tp_price: tp,
            sl_price: sl,
            ts,
        });
    }

    #[test]
    fn opens_position_on_queued_order_fill_at_next_open() {
        let mut ex = exchange();
        queue_long(&mut ex, dec!(500), None, None, 0);
        let outcome = ex.process_minute(&candle(60_000, 100.0, 101.0, 99.0, 100.5), 120_000).unwrap();
        assert!(outcome.trades.is_empty());
        let pos = ex.position().expect("position opened");
        assert_eq!(pos.side, Side::Long);
        assert_eq!(pos.entry_price, dec!(100));
        assert_eq!(pos.size_usdt, dec!(500));
    }

    #[test]
    fn tp_triggers_before_sl_when_the_intrabar_path_reaches_it_first() {
        // A bearish bar's deterministic path is open -> high -> low -> close (§4.6): the TP sits
        // between open and high, the SL sits between high and low, so TP must win the race even
        // though the bar's low would also have breached the stop.
        let mut ex = exchange();
        queue_long(&mut ex, dec!(500), Some(92.0), Some(108.0), 0);
        ex.process_minute(&candle(60_000, 100.0, 101.0, 99.0, 100.0), 120_000).unwrap();
        assert!(ex.position().is_some());

        let outcome = ex
            .process_minute(&candle(120_000, 105.0, 110.0, 90.0, 95.0), 180_000)
            .unwrap();
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].exit_reason, ExitReason::Tp);
        assert!(ex.position().is_none());
    }

    #[test]
    fn sl_triggers_when_low_breaches_stop_before_tp_is_reached() {
        let mut ex = exchange();
        queue_long(&mut ex, dec!(500), Some(98.0), Some(110.0), 0);
        ex.process_minute(&candle(60_000, 100.0, 101.0, 99.0, 100.5), 120_000).unwrap();

        let outcome = ex
            .process_minute(&candle(120_000, 100.5, 102.0, 97.0, 99.0), 180_000)
            .unwrap();
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].exit_reason, ExitReason::Sl);
    }

    #[test]
    fn heavy_adverse_move_triggers_liquidation() {
        let mut ex = exchange();
        // Full account at 10x: 10,000 notional against 1,000 equity leaves no slack.
        queue_long(&mut ex, dec!(9000), None, None, 0);
        ex.process_minute(&candle(60_000, 100.0, 101.0, 99.0, 100.0), 120_000).unwrap();
        assert!(ex.position().is_some());

        let outcome = ex
            .process_minute(&candle(120_000, 100.0, 100.0, 80.0, 85.0), 180_000)
            .unwrap();
        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(outcome.trades[0].exit_reason, ExitReason::Liquidation);
        assert!(ex.position().is_none());
    }

    #[test]
    fn insufficient_margin_rejects_oversized_entry() {
        let mut ex = exchange();
        queue_long(&mut ex, dec!(50_000), None, None, 0);
        let err = ex
            .process_minute(&candle(60_000, 100.0, 101.0, 99.0, 100.5), 120_000)
            .unwrap_err();
        assert!(matches!(err, SimExchangeError::InsufficientMargin { .. }));
        assert!(ex.position().is_none());
    }

    #[test]
    fn funding_is_charged_once_position_has_been_held_through_a_boundary() {
        let mut ex = SimulatedExchange::new(
            "BTCUSDT",
            account(),
            InstrumentConstraints::default(),
            SlippageModel::none(),
            LiquidityCap::unbounded(),
            ImpactModel::none(),
            MarkPriceSource::LastClose,
            dec!(0.005),
            FundingRate(dec!(0.0001)),
        );
        queue_long(&mut ex, dec!(500), None, None, 0);
        ex.process_minute(&candle(60_000, 100.0, 101.0, 99.0, 100.0), 120_000).unwrap();
        let equity_before = ex.ledger().equity;

        let boundary = 8 * 60 * 60 * 1_000;
        ex.process_minute(&candle(boundary - 60_000, 100.0, 101.0, 99.0, 100.0), boundary)
            .unwrap();
        assert!(ex.ledger().equity < equity_before, "long position should pay positive funding");
    }
}
