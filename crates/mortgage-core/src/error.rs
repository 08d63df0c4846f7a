use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Money;

#[derive(Debug, Error)]
pub enum MortgageError {
    #[error("Validation error: {field} — {reason}")]
    Validation { field: String, reason: String },

    #[error("Unsupported country code '{code}'. Supported codes: {supported}")]
    UnsupportedCountry { code: String, supported: String },

    #[error("Ineligible: {0}")]
    Ineligible(Ineligibility),

    #[error("No feasible loan plan found after evaluating {candidates_evaluated} candidates. Try increasing savings, income, or maximum duration.")]
    OptimizationExhausted { candidates_evaluated: usize },

    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Rate fetch failed: {0}")]
    RateFetch(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MortgageError {
    pub(crate) fn validation(field: &str, reason: impl Into<String>) -> Self {
        MortgageError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for MortgageError {
    fn from(e: serde_json::Error) -> Self {
        MortgageError::Serialization(e.to_string())
    }
}

/// Why a buyer cannot get any loan. Every variant carries the numeric gap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Ineligibility {
    #[error("insufficient savings: a down payment of at least {required} is required, {available} available (short by {shortfall})")]
    InsufficientSavings {
        required: Money,
        available: Money,
        shortfall: Money,
    },

    #[error("insufficient income: the smallest possible loan costs {required_payment} per month, above the monthly cap of {monthly_cap} (short by {shortfall})")]
    InsufficientIncome {
        required_payment: Money,
        monthly_cap: Money,
        shortfall: Money,
    },

    #[error("no loan needed: available savings exceed the acquisition cost by {surplus}")]
    NoLoanNeeded { surplus: Money },
}
