//! Running balance cross-check.

use rust_decimal::Decimal;

/// Outcome of checking one row against the running balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceStep {
    /// Computed `previous running - debit + credit`, carried from the opening balance.
    pub running: Option<Decimal>,
    /// `running - statement balance`, when both are known.
    pub difference: Option<Decimal>,
    /// Previous printed balance moved by this row's debit and credit.
    pub expected: Option<Decimal>,
    /// `expected` differs from the printed balance by more than the tolerance.
    pub mismatch: bool,
}

/// Tracks the balance from row to row.
///
/// The computed running balance is carried forward on its own, so a
/// printed error shows up in every later `difference`. The mismatch check
/// compares each row's movement with its printed balances only, so one
/// bad row produces one warning.
#[derive(Debug, Clone)]
pub struct BalanceTracker {
    running: Option<Decimal>,
    printed: Option<Decimal>,
    tolerance: Decimal,
}

impl BalanceTracker {
    pub fn new(opening: Option<Decimal>, tolerance: Decimal) -> Self {
        Self {
            running: opening,
            printed: opening,
            tolerance: tolerance.abs(),
        }
    }

    /// The computed running balance so far.
    pub fn running(&self) -> Option<Decimal> {
        self.running
    }

    /// Movement implied by the statement balance.
    pub fn delta_to(&self, statement: Option<Decimal>) -> Option<Decimal> {
        Some(statement? - self.printed?)
    }

    pub fn apply(&mut self, debit: Decimal, credit: Decimal, statement: Option<Decimal>) -> BalanceStep {
        let running = match self.running {
            Some(previous) => Some(previous - debit + credit),
            None => statement,
        };
        let expected = self.printed.map(|previous| previous - debit + credit);
        let difference = match (running, statement) {
            (Some(running), Some(statement)) => Some(running - statement),
            _ => None,
        };
        let mismatch = match (expected, statement) {
            (Some(expected), Some(statement)) => (expected - statement).abs() > self.tolerance,
            _ => false,
        };

        self.running = running;
        self.printed = statement.or(expected);

        BalanceStep {
            running,
            difference,
            expected,
            mismatch,
        }
    }
}
