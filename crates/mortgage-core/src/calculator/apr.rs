use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::payment::compound_factor;
use crate::error::MortgageError;
use crate::types::{Money, Months, Rate};
use crate::MortgageResult;

const MAX_APR_ITERATIONS: u32 = 200;
const PV_TOLERANCE: Decimal = dec!(0.0000000001);
const BRACKET_TOLERANCE: Decimal = dec!(0.0000000000000001);

/// Present value of `months` level payments of `installment` at `r` per
/// month, and its derivative with respect to `r`.
fn annuity_pv(installment: Money, r: Rate, months: Months) -> (Money, Decimal) {
    let n = Decimal::from(months);
    if r.is_zero() {
        // Limit of the derivative at r = 0 is -C·n(n+1)/2.
        return (installment * n, -installment * n * (n + Decimal::ONE) / dec!(2));
    }
    // A factor past Decimal::MAX discounts to nothing at 28 digits.
    let discount = compound_factor(r, months).map_or(Decimal::ZERO, |c| Decimal::ONE / c);
    let annuity = (Decimal::ONE - discount) / r;
    let pv = installment * annuity;
    let d_pv = installment * (n * discount / (Decimal::ONE + r) / r - annuity / r);
    (pv, d_pv)
}

/// Nominal annual rate equating `months` payments of `installment` with
/// `principal`: the APR once insurance is folded into the instalment.
///
/// Newton-Raphson on the annuity present value. Every step is kept inside a
/// shrinking `[lo, hi]` bracket and falls back to bisection when Newton
/// would leave it.
pub fn effective_annual_rate(
    principal: Money,
    installment: Money,
    months: Months,
) -> MortgageResult<Rate> {
    if months == 0 {
        return Err(MortgageError::InvalidInput {
            field: "months".into(),
            reason: "loan duration must be at least one month".into(),
        });
    }
    if principal <= Decimal::ZERO {
        return Err(MortgageError::InvalidInput {
            field: "principal".into(),
            reason: "principal must be positive".into(),
        });
    }

    let n = Decimal::from(months);
    let total_paid = installment * n;
    // P / n carries a rounding residue, so an interest-free loan can total a
    // hair under P.
    if (total_paid - principal).abs() <= PV_TOLERANCE {
        return Ok(Decimal::ZERO);
    }
    if total_paid < principal {
        return Err(MortgageError::InvalidInput {
            field: "installment".into(),
            reason: format!("{months} payments of {installment} do not repay {principal}"),
        });
    }

    // PV(0) = C·n > P and PV(C/P) < C/(C/P) = P, so the root is bracketed.
    let mut lo = Decimal::ZERO;
    let mut hi = installment / principal;
    let mut rate = dec!(2) * (total_paid - principal) / (principal * (n + Decimal::ONE));
    if rate <= lo || rate >= hi {
        rate = (lo + hi) / dec!(2);
    }

    let mut last_delta = Decimal::MAX;
    for _ in 0..MAX_APR_ITERATIONS {
        let (pv, d_pv) = annuity_pv(installment, rate, months);
        let gap = pv - principal;
        last_delta = gap;

        if gap.abs() < PV_TOLERANCE || hi - lo < BRACKET_TOLERANCE {
            return Ok(rate * dec!(12));
        }

        // PV falls as the rate rises.
        if gap > Decimal::ZERO {
            lo = rate;
        } else {
            hi = rate;
        }

        let newton = if d_pv.is_zero() {
            None
        } else {
            Some(rate - gap / d_pv)
        };
        rate = match newton {
            Some(next) if next > lo && next < hi => next,
            _ => (lo + hi) / dec!(2),
        };
    }

    Err(MortgageError::ConvergenceFailure {
        function: "effective_annual_rate".into(),
        iterations: MAX_APR_ITERATIONS,
        last_delta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculator::payment::{emi, monthly_insurance, monthly_rate};

    fn assert_close(actual: Decimal, expected: Decimal, tol: Decimal, msg: &str) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "{msg}: expected ~{expected}, got {actual} (diff={diff}, tol={tol})"
        );
    }

    #[test]
    fn test_recovers_nominal_rate_without_insurance() {
        let principal = dec!(200000);
        let payment = emi(principal, monthly_rate(dec!(0.032)), 300).unwrap();
        let apr = effective_annual_rate(principal, payment, 300).unwrap();
        assert_close(apr, dec!(0.032), dec!(0.0000001), "APR equals nominal");
    }

    #[test]
    fn test_insurance_raises_apr() {
        let principal = dec!(200000);
        let payment = emi(principal, monthly_rate(dec!(0.032)), 300).unwrap()
            + monthly_insurance(principal, dec!(0.0025));
        let apr = effective_annual_rate(principal, payment, 300).unwrap();
        assert!(apr > dec!(0.032));
        assert!(apr < dec!(0.032) + dec!(0.0060), "APR {apr} unexpectedly high");
    }

    #[test]
    fn test_exact_repayment_is_zero() {
        assert_eq!(
            effective_annual_rate(dec!(12000), dec!(1000), 12).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_interest_free_uneven_split_is_zero() {
        let principal = dec!(313750);
        let payment = emi(principal, Decimal::ZERO, 300).unwrap();
        assert!(payment * dec!(300) < principal);
        assert_eq!(
            effective_annual_rate(principal, payment, 300).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_steep_rate_long_loan_converges() {
        let principal = dec!(2_250_000_000);
        let payment = emi(principal, monthly_rate(dec!(0.99)), 600).unwrap();
        let apr = effective_annual_rate(principal, payment, 600).unwrap();
        assert_close(apr, dec!(0.99), dec!(0.000001), "99% over 50 years");
    }

    #[test]
    fn test_underpayment_rejected() {
        assert!(matches!(
            effective_annual_rate(dec!(12000), dec!(999), 12),
            Err(MortgageError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_single_period() {
        let apr = effective_annual_rate(dec!(1000), dec!(1010), 1).unwrap();
        assert_close(apr, dec!(0.12), dec!(0.0000001), "one-month loan");
    }

    #[test]
    fn test_high_rate_long_loan() {
        let principal = dec!(300000);
        let payment = emi(principal, monthly_rate(dec!(0.15)), 480).unwrap();
        let apr = effective_annual_rate(principal, payment, 480).unwrap();
        assert_close(apr, dec!(0.15), dec!(0.000001), "15% over 40 years");
    }
}
