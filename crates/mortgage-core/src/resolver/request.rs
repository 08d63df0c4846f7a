use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::MAX_SUPPORTED_DURATION_MONTHS;
use crate::error::MortgageError;
use crate::profiles::ProfileQuality;
use crate::types::{Money, Months, Rate};
use crate::MortgageResult;

/// What the optimizer ranks feasible plans by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationPreference {
    MinimizeTotalCost,
    MinimizeMonthlyPayment,
    MinimizeDuration,
    MinimizeDownPayment,
    #[default]
    Balanced,
}

impl OptimizationPreference {
    pub const ALL: [OptimizationPreference; 5] = [
        OptimizationPreference::MinimizeTotalCost,
        OptimizationPreference::MinimizeMonthlyPayment,
        OptimizationPreference::MinimizeDuration,
        OptimizationPreference::MinimizeDownPayment,
        OptimizationPreference::Balanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptimizationPreference::MinimizeTotalCost => "minimize_total_cost",
            OptimizationPreference::MinimizeMonthlyPayment => "minimize_monthly_payment",
            OptimizationPreference::MinimizeDuration => "minimize_duration",
            OptimizationPreference::MinimizeDownPayment => "minimize_down_payment",
            OptimizationPreference::Balanced => "balanced",
        }
    }
}

impl fmt::Display for OptimizationPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptimizationPreference {
    type Err = MortgageError;

    /// Accepts the snake_case names, their kebab-case spelling and the
    /// short forms `cost`, `monthly`, `duration`, `down_payment`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "minimize_total_cost" | "cost" | "total_cost" => {
                Ok(OptimizationPreference::MinimizeTotalCost)
            }
            "minimize_monthly_payment" | "monthly" | "monthly_payment" => {
                Ok(OptimizationPreference::MinimizeMonthlyPayment)
            }
            "minimize_duration" | "duration" => Ok(OptimizationPreference::MinimizeDuration),
            "minimize_down_payment" | "down_payment" => {
                Ok(OptimizationPreference::MinimizeDownPayment)
            }
            "balanced" => Ok(OptimizationPreference::Balanced),
            _ => Err(MortgageError::validation(
                "preference",
                format!(
                    "'{s}' is not one of: {}",
                    OptimizationPreference::ALL
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            )),
        }
    }
}

/// A mortgage request as the user typed it. Absent fields are filled from
/// the country profile or the simulator defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRequest {
    pub property_price: Money,
    pub monthly_income: Money,
    /// Upper bound on the down payment.
    pub available_savings: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_quality: Option<ProfileQuality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_taxes: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_rate: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insurance_rate: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_down_payment_ratio: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_loan_duration_months: Option<Months>,
    /// Pins the optimizer to exactly this duration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_duration_months: Option<Months>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_down_payment: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_debt_ratio: Option<Rate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_monthly_payment: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference: Option<OptimizationPreference>,
}

impl RawRequest {
    pub fn new(property_price: Money, monthly_income: Money, available_savings: Money) -> Self {
        RawRequest {
            property_price,
            monthly_income,
            available_savings,
            country: None,
            profile_quality: None,
            purchase_taxes: None,
            annual_rate: None,
            insurance_rate: None,
            min_down_payment_ratio: None,
            max_loan_duration_months: None,
            fixed_duration_months: None,
            preferred_down_payment: None,
            max_debt_ratio: None,
            max_monthly_payment: None,
            preference: None,
        }
    }

    /// Check every user-supplied field against its domain. Constraints that
    /// depend on profile values are checked during resolution.
    pub fn validate(&self) -> MortgageResult<()> {
        if self.property_price <= Decimal::ZERO {
            return Err(MortgageError::validation("property_price", "must be > 0"));
        }
        if self.monthly_income <= Decimal::ZERO {
            return Err(MortgageError::validation("monthly_income", "must be > 0"));
        }
        if self.available_savings < Decimal::ZERO {
            return Err(MortgageError::validation("available_savings", "must be >= 0"));
        }
        if let Some(country) = &self.country {
            if country.trim().is_empty() {
                return Err(MortgageError::validation(
                    "country",
                    "must be a non-empty country code",
                ));
            }
        }
        if let Some(taxes) = self.purchase_taxes {
            if taxes < Decimal::ZERO {
                return Err(MortgageError::validation("purchase_taxes", "must be >= 0"));
            }
        }
        for (field, rate) in [
            ("annual_rate", self.annual_rate),
            ("insurance_rate", self.insurance_rate),
        ] {
            if let Some(rate) = rate {
                if rate < Decimal::ZERO || rate >= Decimal::ONE {
                    return Err(MortgageError::validation(field, "must be in [0, 1)"));
                }
            }
        }
        if let Some(ratio) = self.min_down_payment_ratio {
            if ratio < Decimal::ZERO || ratio > Decimal::ONE {
                return Err(MortgageError::validation(
                    "min_down_payment_ratio",
                    "must be in [0, 1]",
                ));
            }
        }
        if let Some(ratio) = self.max_debt_ratio {
            if ratio <= Decimal::ZERO || ratio > Decimal::ONE {
                return Err(MortgageError::validation("max_debt_ratio", "must be in (0, 1]"));
            }
        }
        if let Some(months) = self.max_loan_duration_months {
            if !(12..=MAX_SUPPORTED_DURATION_MONTHS).contains(&months) {
                return Err(MortgageError::validation(
                    "max_loan_duration_months",
                    format!("must be between 12 and {MAX_SUPPORTED_DURATION_MONTHS}"),
                ));
            }
        }
        if let Some(months) = self.fixed_duration_months {
            if !(12..=MAX_SUPPORTED_DURATION_MONTHS).contains(&months) {
                return Err(MortgageError::validation(
                    "fixed_duration_months",
                    format!("must be between 12 and {MAX_SUPPORTED_DURATION_MONTHS}"),
                ));
            }
        }
        if let Some(cap) = self.max_monthly_payment {
            if cap <= Decimal::ZERO {
                return Err(MortgageError::validation("max_monthly_payment", "must be > 0"));
            }
        }
        if let Some(preferred) = self.preferred_down_payment {
            if preferred < Decimal::ZERO {
                return Err(MortgageError::validation("preferred_down_payment", "must be >= 0"));
            }
            if preferred > self.available_savings {
                return Err(MortgageError::validation(
                    "preferred_down_payment",
                    format!(
                        "{preferred} exceeds available savings of {}",
                        self.available_savings
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// One edit to a request. `None` payloads reset the field so it is
/// resolved from the profile or the defaults again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum ParameterChange {
    PropertyPrice(Money),
    MonthlyIncome(Money),
    AvailableSavings(Money),
    Country(Option<String>),
    ProfileQuality(Option<ProfileQuality>),
    PurchaseTaxes(Option<Money>),
    AnnualRate(Option<Rate>),
    InsuranceRate(Option<Rate>),
    MinDownPaymentRatio(Option<Rate>),
    MaxLoanDurationMonths(Option<Months>),
    FixedDurationMonths(Option<Months>),
    PreferredDownPayment(Option<Money>),
    MaxDebtRatio(Option<Rate>),
    MaxMonthlyPayment(Option<Money>),
    Preference(Option<OptimizationPreference>),
}

impl ParameterChange {
    pub fn apply(&self, request: &mut RawRequest) {
        match self.clone() {
            ParameterChange::PropertyPrice(v) => request.property_price = v,
            ParameterChange::MonthlyIncome(v) => request.monthly_income = v,
            ParameterChange::AvailableSavings(v) => request.available_savings = v,
            ParameterChange::Country(v) => request.country = v,
            ParameterChange::ProfileQuality(v) => request.profile_quality = v,
            ParameterChange::PurchaseTaxes(v) => request.purchase_taxes = v,
            ParameterChange::AnnualRate(v) => request.annual_rate = v,
            ParameterChange::InsuranceRate(v) => request.insurance_rate = v,
            ParameterChange::MinDownPaymentRatio(v) => request.min_down_payment_ratio = v,
            ParameterChange::MaxLoanDurationMonths(v) => request.max_loan_duration_months = v,
            ParameterChange::FixedDurationMonths(v) => request.fixed_duration_months = v,
            ParameterChange::PreferredDownPayment(v) => request.preferred_down_payment = v,
            ParameterChange::MaxDebtRatio(v) => request.max_debt_ratio = v,
            ParameterChange::MaxMonthlyPayment(v) => request.max_monthly_payment = v,
            ParameterChange::Preference(v) => request.preference = v,
        }
    }
}
