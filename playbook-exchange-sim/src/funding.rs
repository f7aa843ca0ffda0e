//! Funding module (§4.6): 8-hour funding payments at 00:00/08:00/16:00 UTC, scaled by position
//! notional and the historical funding rate for the interval.
//!
//! §9 Open Question resolution: the boundary is inclusive-open — a position must have been held
//! *strictly before* the tick timestamp to be charged/paid funding at that tick. A position opened
//! exactly at the boundary timestamp is not charged until the next boundary.

use playbook_instrument::Side;
use rust_decimal::Decimal;

pub const FUNDING_INTERVAL_MS: i64 = 8 * 60 * 60 * 1_000;

/// The historical funding rate to apply for one interval, expressed as a fraction (e.g. `0.0001`
/// = 1 bp) of position notional. Positive rates are paid by longs to shorts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FundingRate(pub Decimal);

/// True iff `ts` lands exactly on a funding boundary (00:00, 08:00 or 16:00 UTC).
pub fn is_funding_boundary(ts: i64) -> bool {
    ts.rem_euclid(FUNDING_INTERVAL_MS) == 0
}

/// Whether a position opened at `entry_ts` is subject to a funding tick at `boundary_ts`: it must
/// have been held strictly before the boundary (§9 Open Question).
pub fn position_held_through_boundary(entry_ts: i64, boundary_ts: i64) -> bool {
    entry_ts < boundary_ts
}

/// Signed funding cash-flow for a position of `side` and `notional` under `rate` for one
/// interval: positive means the position *pays* (cash leaves the ledger), negative means it
/// *receives*. Longs pay when `rate > 0`; shorts pay when `rate < 0`.
pub fn funding_payment(side: Side, notional: Decimal, rate: FundingRate) -> Decimal {
    let signed = notional * rate.0;
    match side {
        Side::Long => signed,
        Side::Short => -signed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn detects_utc_boundaries() {
        assert!(is_funding_boundary(0));
        assert!(is_funding_boundary(8 * 60 * 60 * 1_000));
        assert!(!is_funding_boundary(60_000));
    }

    #[test]
    fn boundary_is_inclusive_open() {
        let boundary = 8 * 60 * 60 * 1_000;
        assert!(!position_held_through_boundary(boundary, boundary));
        assert!(position_held_through_boundary(boundary - 1, boundary));
    }

    #[test]
    fn long_pays_positive_rate() {
        let payment = funding_payment(Side::Long, dec!(10_000), FundingRate(dec!(0.0001)));
        assert_eq!(payment, dec!(1));
        let payment = funding_payment(Side::Short, dec!(10_000), FundingRate(dec!(0.0001)));
        assert_eq!(payment, dec!(-1));
    }
}
