use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::apr::effective_annual_rate;
use super::payment::monthly_rate;
use super::schedule::AmortizationSchedule;
use crate::error::MortgageError;
use crate::types::{round_money, round_ratio, Money, Months, Rate};
use crate::MortgageResult;

/// Everything needed to price one (down payment, duration) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanPlanInput {
    pub down_payment: Money,
    pub principal: Money,
    /// Applicable annual rate, LTV adjustment already included.
    pub annual_rate: Rate,
    pub annual_insurance_rate: Rate,
    pub duration_months: Months,
    pub monthly_income: Money,
    pub property_price: Money,
}

/// A fully priced fixed-rate loan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanPlan {
    pub down_payment: Money,
    pub principal: Money,
    pub duration_months: Months,
    pub annual_rate: Rate,
    pub annual_insurance_rate: Rate,
    pub monthly_emi: Money,
    pub monthly_insurance: Money,
    /// EMI plus insurance.
    pub monthly_installment: Money,
    pub first_month_interest: Money,
    pub apr: Rate,
    pub total_interest: Money,
    pub total_insurance: Money,
    /// Interest plus insurance over the life of the loan.
    pub total_cost: Money,
    pub total_repaid: Money,
    pub debt_ratio: Decimal,
    pub ltv_ratio: Decimal,
}

impl LoanPlan {
    /// Copy with money at cents and ratios at four places.
    pub fn rounded(&self) -> LoanPlan {
        LoanPlan {
            down_payment: round_money(self.down_payment),
            principal: round_money(self.principal),
            duration_months: self.duration_months,
            annual_rate: round_ratio(self.annual_rate),
            annual_insurance_rate: round_ratio(self.annual_insurance_rate),
            monthly_emi: round_money(self.monthly_emi),
            monthly_insurance: round_money(self.monthly_insurance),
            monthly_installment: round_money(self.monthly_installment),
            first_month_interest: round_money(self.first_month_interest),
            apr: round_ratio(self.apr),
            total_interest: round_money(self.total_interest),
            total_insurance: round_money(self.total_insurance),
            total_cost: round_money(self.total_cost),
            total_repaid: round_money(self.total_repaid),
            debt_ratio: round_ratio(self.debt_ratio),
            ltv_ratio: round_ratio(self.ltv_ratio),
        }
    }

    pub fn schedule(&self) -> MortgageResult<AmortizationSchedule> {
        AmortizationSchedule::new(
            self.principal,
            self.annual_rate,
            self.annual_insurance_rate,
            self.duration_months,
        )
    }
}

/// Month-by-month schedule of an already priced plan.
pub fn schedule(plan: &LoanPlan) -> MortgageResult<AmortizationSchedule> {
    plan.schedule()
}

/// Price a loan: instalment split, APR, lifetime totals and ratios.
pub fn build_loan_plan(input: &LoanPlanInput) -> MortgageResult<LoanPlan> {
    if input.principal <= Decimal::ZERO {
        return Err(MortgageError::InvalidInput {
            field: "principal".into(),
            reason: "a loan plan needs a positive principal".into(),
        });
    }
    if input.monthly_income <= Decimal::ZERO {
        return Err(MortgageError::InvalidInput {
            field: "monthly_income".into(),
            reason: "must be positive to compute a debt ratio".into(),
        });
    }
    if input.property_price <= Decimal::ZERO {
        return Err(MortgageError::InvalidInput {
            field: "property_price".into(),
            reason: "must be positive to compute an LTV".into(),
        });
    }

    let schedule = AmortizationSchedule::new(
        input.principal,
        input.annual_rate,
        input.annual_insurance_rate,
        input.duration_months,
    )?;
    let monthly_emi = schedule.emi();
    let monthly_insurance = schedule.monthly_insurance();
    let monthly_installment = monthly_emi + monthly_insurance;

    let total_interest: Money = schedule.map(|row| row.interest).sum();
    let total_insurance = monthly_insurance * Decimal::from(input.duration_months);
    let total_cost = total_interest + total_insurance;

    Ok(LoanPlan {
        down_payment: input.down_payment,
        principal: input.principal,
        duration_months: input.duration_months,
        annual_rate: input.annual_rate,
        annual_insurance_rate: input.annual_insurance_rate,
        monthly_emi,
        monthly_insurance,
        monthly_installment,
        first_month_interest: input.principal * monthly_rate(input.annual_rate),
        apr: effective_annual_rate(input.principal, monthly_installment, input.duration_months)?,
        total_interest,
        total_insurance,
        total_cost,
        total_repaid: input.principal + total_cost,
        debt_ratio: monthly_installment / input.monthly_income,
        ltv_ratio: input.principal / input.property_price,
    })
}
