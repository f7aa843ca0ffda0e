//! The engine's only dependency on a historical candle store (§1, §4.5): pull closed exec-TF
//! candles one at a time, fetch the higher-role candle that closed alongside one (if any), and
//! hand over the 1m slice the sub-loop walks within one exec bar.
//!
//! No concrete backtest-store implementation (parquet/DuckDB/CSV) lives here — that is an
//! external collaborator's job (§1 Non-goals). [`InMemoryDataProvider`] exists only so the engine
//! and its tests have something to drive without one.

use playbook_instrument::{Candle, TfRole};
use std::collections::VecDeque;

/// True iff a low_tf bar closing at `ts_close` also lands exactly on `tf_minutes`'s boundary —
/// pure arithmetic, since both timeframes share the same UTC epoch origin (§4.5 "TF index advance").
pub fn crosses_boundary(ts_close: i64, tf_minutes: u32) -> bool {
    let width_ms = i64::from(tf_minutes) * 60_000;
    width_ms > 0 && ts_close % width_ms == 0
}

/// What the engine needs from a historical (or live) candle source.
pub trait DataProvider: std::fmt::Debug {
    /// Pull the next closed exec-TF (always `low_tf`, §6) candle, or `None` at end of data.
    fn next_low_tf_candle(&mut self) -> Option<Candle>;

    /// Fetch the already-closed candle for `role` whose `ts_close` matches exactly, when the
    /// low_tf bar that just closed also lands on that role's boundary. `None` means either the bar
    /// doesn't align with that role's boundary, or coverage is missing (the caller can't tell
    /// which from this return value alone and treats both as "nothing to update this tick").
    fn closed_candle_at(&mut self, role: TfRole, ts_close: i64) -> Option<Candle>;

    /// 1m candles covering `[ts_open, ts_close]` (inclusive of both ends) for one exec bar's
    /// sub-loop. Returns fewer than expected when the 1m feed is incomplete for this bar; an empty
    /// result signals the sub-loop should fall back to evaluating once at `ts_close` (§4.5 "1m
    /// sub-loop").
    fn minute_candles(&mut self, ts_open: i64, ts_close: i64) -> Vec<Candle>;
}

/// A preloaded, in-memory [`DataProvider`] for tests and small backtests: every role's candle
/// series plus the 1m series are supplied up front and consumed by cursor.
#[derive(Debug)]
pub struct InMemoryDataProvider {
    low_tf: VecDeque<Candle>,
    med_tf: Vec<Candle>,
    high_tf: Vec<Candle>,
    minute: Vec<Candle>,
    med_cursor: usize,
    high_cursor: usize,
}

impl InMemoryDataProvider {
    pub fn new(low_tf: Vec<Candle>, med_tf: Vec<Candle>, high_tf: Vec<Candle>, minute: Vec<Candle>) -> Self {
        Self {
            low_tf: low_tf.into(),
            med_tf,
            high_tf,
            minute,
            med_cursor: 0,
            high_cursor: 0,
        }
    }
}

impl DataProvider for InMemoryDataProvider {
    fn next_low_tf_candle(&mut self) -> Option<Candle> {
        self.low_tf.pop_front()
    }

    fn closed_candle_at(&mut self, role: TfRole, ts_close: i64) -> Option<Candle> {
        let (series, cursor) = match role {
            TfRole::LowTf => return None,
            TfRole::MedTf => (&self.med_tf, &mut self.med_cursor),
            TfRole::HighTf => (&self.high_tf, &mut self.high_cursor),
        };
        while *cursor < series.len() && series[*cursor].ts_close < ts_close {
            *cursor += 1;
        }
        if *cursor < series.len() && series[*cursor].ts_close == ts_close {
            let candle = series[*cursor];
            *cursor += 1;
            Some(candle)
        } else {
            None
        }
    }

    fn minute_candles(&mut self, ts_open: i64, ts_close: i64) -> Vec<Candle> {
        self.minute.iter().filter(|c| c.ts_open >= ts_open && c.ts_close <= ts_close).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_check_matches_a_15m_role_every_quarter_hour() {
        assert!(crosses_boundary(15 * 60_000, 15));
        assert!(!crosses_boundary(10 * 60_000, 15));
        assert!(crosses_boundary(0, 15));
    }

    #[test]
    fn closed_candle_at_skips_past_already_seen_entries() {
        let med = vec![
            Candle::new(0, 900_000, 1.0, 1.0, 1.0, 1.0, 1.0, 15).unwrap(),
            Candle::new(900_000, 1_800_000, 1.0, 1.0, 1.0, 1.0, 1.0, 15).unwrap(),
        ];
        let mut provider = InMemoryDataProvider::new(vec![], med, vec![], vec![]);
        assert!(provider.closed_candle_at(TfRole::MedTf, 900_000).is_some());
        assert!(provider.closed_candle_at(TfRole::MedTf, 900_000).is_none());
        assert!(provider.closed_candle_at(TfRole::MedTf, 1_800_000).is_some());
    }
}
