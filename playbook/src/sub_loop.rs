//! The 1m sub-loop (§4.5 point 3/5, §4.6 "Signal-to-fill sequence per 1m bar"): for each 1m bar
//! nested inside the current exec-TF bar, hand the exchange the candle (fills the queued order,
//! marks, checks TP/SL/liquidation, applies funding), then evaluate the Play's action blocks
//! against a freshly built [`Snapshot`] and queue whatever intent fires for the *next* 1m open.

use crate::error::{EngineError, ExchangeError};
use playbook_dsl::{evaluate_blocks, CompiledPlay, WindowHistory};
use playbook_exchange_sim::{order_from_signal, SimulatedExchange};
use playbook_instrument::snapshot::{Snapshot, ValueBundle};
use playbook_instrument::{ActionKind, Candle, ExitMode, ExitReason, Order, OrderType, Side, Signal, Trade};
use smol_str::SmolStr;
use std::collections::HashMap;

/// Every trade the exchange produced while walking one exec bar's 1m sub-loop.
#[derive(Debug, Clone, Default)]
pub struct SubLoopOutcome {
    pub trades: Vec<Trade>,
}

#[allow(clippy::too_many_arguments)]
pub fn run_sub_loop(
    play: &CompiledPlay,
    exchange: &mut SimulatedExchange,
    windows: &mut WindowHistory,
    exec_candle: &Candle,
    exec_index: u64,
    minute_candles: &[Candle],
    indicators: &HashMap<SmolStr, ValueBundle>,
    structures: &HashMap<SmolStr, ValueBundle>,
) -> Result<SubLoopOutcome, EngineError> {
    let mut outcome = SubLoopOutcome::default();

    // A complete 1m feed for this bar is the normal case; an empty slice (feed gap, or the exec
    // TF already *is* 1m and the caller passed nothing) falls back to evaluating once against the
    // exec candle itself so a Play still gets a decision point for this bar.
    let owned_fallback;
    let ticks: &[Candle] = if minute_candles.is_empty() {
        owned_fallback = [*exec_candle];
        &owned_fallback
    } else {
        minute_candles
    };

    for minute in ticks {
        let minute_outcome = exchange
            .process_minute(minute, minute.ts_close)
            .map_err(ExchangeError::from)?;
        let sl_tp_fired_this_minute = minute_outcome
            .trades
            .iter()
            .any(|t| matches!(t.exit_reason, ExitReason::Sl | ExitReason::Tp | ExitReason::Liquidation));
        outcome.trades.extend(minute_outcome.trades);

        // An order queued by a previous minute is still awaiting its fill at the next open; don't
        // let this minute's evaluation clobber it (only one order may be in flight, §4.6).
        if exchange.has_queued_order() {
            continue;
        }

        let quote = exchange.quote();
        let snapshot = Snapshot {
            minute_candle: *minute,
            exec_candle: *exec_candle,
            ts_open: exec_candle.ts_open,
            ts_close: exec_candle.ts_close,
            exec_index,
            last_price: quote.last_price,
            mark_price: quote.mark_price,
            indicators: indicators.clone(),
            structures: structures.clone(),
        };

        let Some(block_outcome) = evaluate_blocks(&play.actions, &snapshot, &play.setups, windows) else {
            continue;
        };

        if block_outcome.emit.is_exit() {
            handle_exit(play, exchange, block_outcome.emit, sl_tp_fired_this_minute, minute.ts_close);
        } else if block_outcome.emit.is_entry() {
            handle_entry(play, exchange, &snapshot, block_outcome.emit, block_outcome.block_id, minute.ts_close);
        }
    }

    Ok(outcome)
}

fn handle_exit(
    play: &CompiledPlay,
    exchange: &mut SimulatedExchange,
    emit: ActionKind,
    sl_tp_fired_this_minute: bool,
    ts: i64,
) {
    // §4.1/§8: under `sl_tp_only`, a signal-driven exit is suppressed unless SL/TP also fired in
    // this same tick. `first_hit` and `signal_only` always honor the DSL's exit.
    if play.position_policy.exit_mode == ExitMode::SlTpOnly && !sl_tp_fired_this_minute {
        return;
    }
    let Some(position) = exchange.position() else {
        return;
    };
    let closes_this_position = match emit {
        ActionKind::ExitLong => position.side == Side::Long,
        ActionKind::ExitShort => position.side == Side::Short,
        ActionKind::Close => true,
        _ => false,
    };
    if !closes_this_position {
        return;
    }
    let order = Order {
        id: SmolStr::new(format!("exit-{ts}")),
        symbol: position.symbol.clone(),
        side: position.side.opposite(),
        size_usdt: position.size_usdt,
        order_type: OrderType::Market,
        reduce_only: true,
        tp_price: None,
        sl_price: None,
        ts,
    };
    exchange.queue_order(order);
}

fn handle_entry(
    play: &CompiledPlay,
    exchange: &mut SimulatedExchange,
    snapshot: &Snapshot,
    emit: ActionKind,
    block_id: SmolStr,
    ts: i64,
) {
    let side = match emit {
        ActionKind::EntryLong => Side::Long,
        ActionKind::EntryShort => Side::Short,
        _ => return,
    };
    if !play.position_policy.permits(side) {
        return;
    }

    // Sizing and SL/TP resolution anchor on `last_price` as an entry-price proxy: the order
    // itself only fills at the *next* 1m open (§4.6), which isn't knowable at decision time.
    let entry_price = snapshot.last_price;
    let stop_price = play.risk.stop_loss.as_ref().and_then(|rule| rule.resolve(entry_price, side, snapshot));
    let take_profit_price = play.risk.take_profit.as_ref().and_then(|rule| rule.resolve(entry_price, side, snapshot));
    let size_usdt = play.risk.size_usdt(exchange.ledger().equity, entry_price, stop_price);

    // `signal_only` ignores SL/TP entirely: don't even attach resolved prices, so the exchange
    // never triggers a stop/take-profit check against this position (§4.1).
    let (sl_price, tp_price) = if play.position_policy.exit_mode == ExitMode::SignalOnly {
        (None, None)
    } else {
        (stop_price, take_profit_price)
    };

    let signal = Signal {
        side,
        size_usdt,
        sl_price,
        tp_price,
        reason: block_id.clone(),
        source_block_id: block_id,
    };
    exchange.queue_order(order_from_signal(&signal, false, ts));
}
