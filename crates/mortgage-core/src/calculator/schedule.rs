use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::payment::{emi, monthly_insurance, monthly_rate};
use crate::types::{round_money, Money, Months, Rate};
use crate::MortgageResult;

/// One month of an amortisation schedule, at full precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmortizationRow {
    pub period: Months,
    pub opening_balance: Money,
    pub installment: Money,
    pub principal: Money,
    pub interest: Money,
    pub insurance: Money,
    pub closing_balance: Money,
}

impl AmortizationRow {
    pub fn rounded(&self) -> AmortizationRow {
        AmortizationRow {
            period: self.period,
            opening_balance: round_money(self.opening_balance),
            installment: round_money(self.installment),
            principal: round_money(self.principal),
            interest: round_money(self.interest),
            insurance: round_money(self.insurance),
            closing_balance: round_money(self.closing_balance),
        }
    }
}

/// Lazy month-by-month schedule of a fixed-rate loan.
///
/// A clone continues from the same period; clone before iterating to walk
/// the schedule more than once.
#[derive(Debug, Clone)]
pub struct AmortizationSchedule {
    monthly_rate: Rate,
    emi: Money,
    insurance: Money,
    months: Months,
    period: Months,
    balance: Money,
}

impl AmortizationSchedule {
    pub fn new(
        principal: Money,
        annual_rate: Rate,
        annual_insurance_rate: Rate,
        months: Months,
    ) -> MortgageResult<Self> {
        let rate = monthly_rate(annual_rate);
        Ok(AmortizationSchedule {
            monthly_rate: rate,
            emi: emi(principal, rate, months)?,
            insurance: monthly_insurance(principal, annual_insurance_rate),
            months,
            period: 0,
            balance: principal,
        })
    }

    pub fn emi(&self) -> Money {
        self.emi
    }

    pub fn monthly_insurance(&self) -> Money {
        self.insurance
    }

    pub fn duration_months(&self) -> Months {
        self.months
    }
}

impl Iterator for AmortizationSchedule {
    type Item = AmortizationRow;

    fn next(&mut self) -> Option<AmortizationRow> {
        if self.period >= self.months {
            return None;
        }
        self.period += 1;

        let opening = self.balance;
        let interest = opening * self.monthly_rate;
        let principal = if self.period == self.months {
            // Final payment clears whatever residue the rounding left.
            opening
        } else {
            self.emi - interest
        };
        let closing = if self.period == self.months {
            Decimal::ZERO
        } else {
            opening - principal
        };
        self.balance = closing;

        Some(AmortizationRow {
            period: self.period,
            opening_balance: opening,
            installment: principal + interest + self.insurance,
            principal,
            interest,
            insurance: self.insurance,
            closing_balance: closing,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.months - self.period) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for AmortizationSchedule {}

/// Schedule for `principal` at a fixed annual rate over `months`.
pub fn amortization_schedule(
    principal: Money,
    annual_rate: Rate,
    annual_insurance_rate: Rate,
    months: Months,
) -> MortgageResult<AmortizationSchedule> {
    AmortizationSchedule::new(principal, annual_rate, annual_insurance_rate, months)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn assert_close(actual: Decimal, expected: Decimal, tol: Decimal, msg: &str) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "{msg}: expected ~{expected}, got {actual} (diff={diff}, tol={tol})"
        );
    }

    #[test]
    fn test_row_count_and_payoff() {
        let schedule = amortization_schedule(dec!(200000), dec!(0.032), dec!(0.0025), 300).unwrap();
        assert_eq!(schedule.len(), 300);

        let rows: Vec<AmortizationRow> = schedule.collect();
        assert_eq!(rows.len(), 300);
        assert_eq!(rows[0].period, 1);
        assert_eq!(rows[299].period, 300);
        assert_eq!(rows[299].closing_balance, Decimal::ZERO);

        let principal_sum: Decimal = rows.iter().map(|r| r.principal).sum();
        assert_close(principal_sum, dec!(200000), dec!(0.000001), "principal sum");
    }

    #[test]
    fn test_balances_chain() {
        let rows: Vec<AmortizationRow> =
            amortization_schedule(dec!(50000), dec!(0.04), Decimal::ZERO, 24)
                .unwrap()
                .collect();
        for pair in rows.windows(2) {
            assert_eq!(pair[0].closing_balance, pair[1].opening_balance);
        }
    }

    #[test]
    fn test_first_row_split() {
        let mut schedule =
            amortization_schedule(dec!(200000), dec!(0.032), dec!(0.0025), 300).unwrap();
        let first = schedule.next().unwrap().rounded();
        assert_eq!(first.interest, dec!(533.33));
        assert_eq!(first.insurance, dec!(41.67));
        assert_eq!(first.principal, dec!(436.02));
        assert_eq!(first.installment, dec!(1011.02));
        assert_eq!(schedule.len(), 299);
    }

    #[test]
    fn test_insurance_is_constant() {
        let rows: Vec<AmortizationRow> =
            amortization_schedule(dec!(100000), dec!(0.03), dec!(0.003), 120)
                .unwrap()
                .collect();
        assert!(rows.iter().all(|r| r.insurance == dec!(25)));
    }

    #[test]
    fn test_zero_rate_schedule() {
        let rows: Vec<AmortizationRow> =
            amortization_schedule(dec!(120000), Decimal::ZERO, Decimal::ZERO, 120)
                .unwrap()
                .collect();
        assert!(rows.iter().all(|r| r.interest.is_zero()));
        assert!(rows.iter().all(|r| r.principal == dec!(1000)));
    }

    #[test]
    fn test_clone_walks_again() {
        let schedule = amortization_schedule(dec!(10000), dec!(0.05), Decimal::ZERO, 12).unwrap();
        let first: Decimal = schedule.clone().map(|r| r.interest).sum();
        let second: Decimal = schedule.map(|r| r.interest).sum();
        assert_eq!(first, second);
    }
}
