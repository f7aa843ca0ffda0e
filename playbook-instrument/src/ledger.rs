use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// The four USDT-denominated balances the simulated exchange tracks (§3 Ledger state).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LedgerState {
    pub cash_balance: Decimal,
    pub unrealized_pnl: Decimal,
    pub equity: Decimal,
    pub used_margin: Decimal,
    pub free_margin: Decimal,
    pub available_balance: Decimal,
}

/// A ledger invariant (§3, §8) was violated — always fatal (`InvariantError`, §7).
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum LedgerInvariantViolation {
    #[error("equity {equity} != cash_balance {cash_balance} + unrealized_pnl {unrealized_pnl}")]
    EquityMismatch {
        equity: Decimal,
        cash_balance: Decimal,
        unrealized_pnl: Decimal,
    },
    #[error("free_margin {free_margin} != equity {equity} - used_margin {used_margin}")]
    FreeMarginMismatch {
        free_margin: Decimal,
        equity: Decimal,
        used_margin: Decimal,
    },
    #[error("available_balance {available_balance} != max(0, free_margin {free_margin})")]
    AvailableBalanceMismatch {
        available_balance: Decimal,
        free_margin: Decimal,
    },
}

impl LedgerState {
    /// Recompute `equity`, `free_margin` and `available_balance` from `cash_balance`,
    /// `unrealized_pnl` and `used_margin` — the three independently-set inputs.
    pub fn recompute(&mut self) {
        self.equity = self.cash_balance + self.unrealized_pnl;
        self.free_margin = self.equity - self.used_margin;
        self.available_balance = self.free_margin.max(Decimal::ZERO);
    }

    /// Check the §3/§8 ledger invariants hold, to within a tolerance that absorbs Decimal rounding
    /// noise from chained arithmetic (the identities themselves are exact; only accumulated
    /// rounding across many bars needs slack).
    pub fn check_invariants(&self, tolerance: Decimal) -> Result<(), LedgerInvariantViolation> {
        let expected_equity = self.cash_balance + self.unrealized_pnl;
        if (self.equity - expected_equity).abs() > tolerance {
            return Err(LedgerInvariantViolation::EquityMismatch {
                equity: self.equity,
                cash_balance: self.cash_balance,
                unrealized_pnl: self.unrealized_pnl,
            });
        }

        let expected_free = self.equity - self.used_margin;
        if (self.free_margin - expected_free).abs() > tolerance {
            return Err(LedgerInvariantViolation::FreeMarginMismatch {
                free_margin: self.free_margin,
                equity: self.equity,
                used_margin: self.used_margin,
            });
        }

        let expected_available = self.free_margin.max(Decimal::ZERO);
        if (self.available_balance - expected_available).abs() > tolerance {
            return Err(LedgerInvariantViolation::AvailableBalanceMismatch {
                available_balance: self.available_balance,
                free_margin: self.free_margin,
            });
        }

        Ok(())
    }
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            cash_balance: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            equity: Decimal::ZERO,
            used_margin: Decimal::ZERO,
            free_margin: Decimal::ZERO,
            available_balance: Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn recompute_then_check_passes() {
        let mut ledger = LedgerState {
            cash_balance: dec!(1000),
            unrealized_pnl: dec!(-50),
            used_margin: dec!(200),
            ..Default::default()
        };
        ledger.recompute();
        assert_eq!(ledger.equity, dec!(950));
        assert_eq!(ledger.free_margin, dec!(750));
        assert_eq!(ledger.available_balance, dec!(750));
        ledger.check_invariants(Decimal::new(1, 6)).unwrap();
    }

    #[test]
    fn negative_free_margin_clamps_available_to_zero() {
        let mut ledger = LedgerState {
            cash_balance: dec!(100),
            unrealized_pnl: dec!(-50),
            used_margin: dec!(200),
            ..Default::default()
        };
        ledger.recompute();
        assert_eq!(ledger.free_margin, dec!(-150));
        assert_eq!(ledger.available_balance, Decimal::ZERO);
    }
}
