//! Pre-optimization gate: can the buyer get any loan at all?

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::calculator::{emi, monthly_insurance, monthly_rate};
use crate::config::SimulatorConfig;
use crate::error::{Ineligibility, MortgageError};
use crate::optimizer::searchable_durations;
use crate::resolver::ResolvedParameters;
use crate::types::{round_money, Money, Months, Rate};
use crate::MortgageResult;

/// Search bounds established by a successful feasibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeasibilityPass {
    pub min_down_payment: Money,
    pub max_down_payment: Money,
    /// Loan left when every euro of savings goes into the down payment.
    pub min_principal: Money,
    pub max_principal: Money,
    /// Stricter of the debt-ratio limit and the absolute payment cap.
    pub monthly_cap: Money,
    pub min_duration_months: Months,
    pub max_duration_months: Months,
    /// Instalment of the smallest loan over the longest duration.
    pub cheapest_installment: Money,
    pub cheapest_rate: Rate,
}

/// Run the three eligibility checks in order; the first failure wins.
#[instrument(skip_all, fields(country = %params.country.value()))]
pub fn check_feasibility(
    params: &ResolvedParameters,
    config: &SimulatorConfig,
) -> MortgageResult<FeasibilityPass> {
    let required = params.effective_minimum_down_payment;
    let available = params.available_savings;

    // Savings must cover the minimum down payment.
    if available < required {
        return Err(MortgageError::Ineligible(Ineligibility::InsufficientSavings {
            required: round_money(required),
            available: round_money(available),
            shortfall: round_money(required - available),
        }));
    }

    let durations = searchable_durations(params, config);
    let (Some(&min_duration), Some(&max_duration)) = (durations.first(), durations.last()) else {
        return Err(MortgageError::validation(
            "max_loan_duration_months",
            format!(
                "{} months is shorter than the shortest searchable duration of {} months",
                params.max_loan_duration_months.get(),
                config.min_duration_months
            ),
        ));
    };

    let monthly_cap = params.monthly_cap();
    let min_principal = params.principal_for(available);

    // Nothing left to borrow: the income check cannot fail.
    if min_principal <= Decimal::ZERO {
        return Err(MortgageError::Ineligible(Ineligibility::NoLoanNeeded {
            surplus: round_money(-min_principal),
        }));
    }

    // The cheapest possible loan must fit under the cap.
    let cheapest_rate = params.rate_for_ltv(min_principal / params.property_price);
    let cheapest_installment = emi(min_principal, monthly_rate(cheapest_rate), max_duration)?
        + monthly_insurance(min_principal, params.insurance_rate.get());
    if cheapest_installment > monthly_cap {
        return Err(MortgageError::Ineligible(Ineligibility::InsufficientIncome {
            required_payment: round_money(cheapest_installment),
            monthly_cap: round_money(monthly_cap),
            shortfall: round_money(cheapest_installment - monthly_cap),
        }));
    }

    let pass = FeasibilityPass {
        min_down_payment: required,
        max_down_payment: available,
        min_principal,
        max_principal: params.principal_for(required),
        monthly_cap,
        min_duration_months: min_duration,
        max_duration_months: max_duration,
        cheapest_installment,
        cheapest_rate,
    };
    debug!(
        %monthly_cap,
        %min_principal,
        cheapest_installment = %round_money(cheapest_installment),
        "feasibility passed"
    );
    Ok(pass)
}
