use rust_decimal::Decimal;

use crate::error::MortgageError;
use crate::types::{Money, Months, Rate};
use crate::MortgageResult;

const MONTHS_PER_YEAR: Decimal = Decimal::from_parts(12, 0, 0, false, 0);

/// Annual nominal rate to its monthly equivalent.
pub fn monthly_rate(annual_rate: Rate) -> Rate {
    annual_rate / MONTHS_PER_YEAR
}

/// (1 + r)^n via iterative multiplication, `None` past `Decimal::MAX`.
pub(crate) fn compound_factor(monthly_rate: Rate, months: Months) -> Option<Decimal> {
    let growth = Decimal::ONE + monthly_rate;
    (0..months).try_fold(Decimal::ONE, |compound, _| compound.checked_mul(growth))
}

/// Equated monthly instalment of a fixed-rate annuity loan.
///
/// `P·r·(1+r)^n / ((1+r)^n − 1)`; an interest-free loan amortises
/// straight-line as `P / n`.
pub fn emi(principal: Money, monthly_rate: Rate, months: Months) -> MortgageResult<Money> {
    if months == 0 {
        return Err(MortgageError::InvalidInput {
            field: "months".into(),
            reason: "loan duration must be at least one month".into(),
        });
    }
    if principal < Decimal::ZERO {
        return Err(MortgageError::InvalidInput {
            field: "principal".into(),
            reason: "principal cannot be negative".into(),
        });
    }
    if monthly_rate < Decimal::ZERO {
        return Err(MortgageError::InvalidInput {
            field: "monthly_rate".into(),
            reason: "rate cannot be negative".into(),
        });
    }

    if monthly_rate.is_zero() {
        return Ok(principal / Decimal::from(months));
    }

    // Past Decimal::MAX the annuity factor has converged to r.
    let factor = match compound_factor(monthly_rate, months) {
        Some(compound) => {
            let denominator = compound - Decimal::ONE;
            if denominator.is_zero() {
                // Rate too small to move (1+r)^n at 28 significant digits.
                return Ok(principal / Decimal::from(months));
            }
            // r·c/(c−1) never exceeds 1 + r, so only the principal can overflow.
            monthly_rate * (compound / denominator)
        }
        None => monthly_rate,
    };

    principal
        .checked_mul(factor)
        .ok_or_else(|| MortgageError::InvalidInput {
            field: "principal".into(),
            reason: format!("{principal} is too large to price at a monthly rate of {monthly_rate}"),
        })
}

/// Borrower insurance premium: a flat share of the original principal,
/// charged every month for the life of the loan.
pub fn monthly_insurance(original_principal: Money, annual_insurance_rate: Rate) -> Money {
    original_principal * annual_insurance_rate / MONTHS_PER_YEAR
}
