//! Simulator-wide defaults and tuneable search parameters.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::MortgageError;
use crate::profiles::ProfileQuality;
use crate::types::{Money, Months, Rate};
use crate::MortgageResult;

/// Hard ceiling on any loan duration the simulator will consider.
pub const MAX_SUPPORTED_DURATION_MONTHS: Months = 600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Country used when the request names none.
    pub default_country: String,
    /// Profile quality used when the request names none.
    pub default_quality: ProfileQuality,
    /// Absolute monthly payment cap applied when the request sets none.
    pub default_max_monthly_payment: Money,
    /// Down-payment increment of the optimizer grid.
    pub down_payment_step: Money,
    /// Duration increment of the optimizer grid (whole years by default).
    pub duration_step_months: Months,
    /// Shortest duration the optimizer grid starts at.
    pub min_duration_months: Months,
    /// Return an idle euro would earn elsewhere; drives the sweet-spot verdict.
    pub opportunity_cost_rate: Rate,
    /// Months of net income kept liquid after the down payment.
    pub reserve_months: u32,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            default_country: "BE".to_string(),
            default_quality: ProfileQuality::Average,
            default_max_monthly_payment: dec!(2200),
            down_payment_step: dec!(1000),
            duration_step_months: 12,
            min_duration_months: 12,
            opportunity_cost_rate: dec!(0.035),
            reserve_months: 6,
        }
    }
}

impl SimulatorConfig {
    pub fn validate(&self) -> MortgageResult<()> {
        if self.default_country.trim().is_empty() {
            return Err(MortgageError::validation(
                "default_country",
                "must be a non-empty country code",
            ));
        }
        if self.default_max_monthly_payment <= Decimal::ZERO {
            return Err(MortgageError::validation(
                "default_max_monthly_payment",
                "must be > 0",
            ));
        }
        if self.down_payment_step <= Decimal::ZERO {
            return Err(MortgageError::validation("down_payment_step", "must be > 0"));
        }
        if self.duration_step_months == 0 {
            return Err(MortgageError::validation(
                "duration_step_months",
                "must be at least 1 month",
            ));
        }
        if self.min_duration_months == 0 || self.min_duration_months > MAX_SUPPORTED_DURATION_MONTHS {
            return Err(MortgageError::validation(
                "min_duration_months",
                format!("must be between 1 and {MAX_SUPPORTED_DURATION_MONTHS}"),
            ));
        }
        if self.opportunity_cost_rate < Decimal::ZERO || self.opportunity_cost_rate >= Decimal::ONE {
            return Err(MortgageError::validation(
                "opportunity_cost_rate",
                "must be in [0, 1)",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SimulatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_country, "BE");
        assert_eq!(config.opportunity_cost_rate, dec!(0.035));
        assert_eq!(config.reserve_months, 6);
    }

    #[test]
    fn test_partial_json_falls_back_to_defaults() {
        let config: SimulatorConfig =
            serde_json::from_str(r#"{ "opportunity_cost_rate": "0.04", "reserve_months": 9 }"#)
                .unwrap();
        assert_eq!(config.opportunity_cost_rate, dec!(0.04));
        assert_eq!(config.reserve_months, 9);
        assert_eq!(config.down_payment_step, dec!(1000));
        assert_eq!(config.default_quality, ProfileQuality::Average);
    }

    #[test]
    fn test_deserialised_zero_step_fails_validation() {
        let config: SimulatorConfig =
            serde_json::from_str(r#"{ "down_payment_step": "0" }"#).unwrap();
        assert!(matches!(
            config.validate(),
            Err(MortgageError::Validation { ref field, .. }) if field == "down_payment_step"
        ));
    }

    #[test]
    fn test_zero_step_rejected() {
        let config = SimulatorConfig {
            down_payment_step: Decimal::ZERO,
            ..SimulatorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(MortgageError::Validation { ref field, .. }) if field == "down_payment_step"
        ));
    }
}
