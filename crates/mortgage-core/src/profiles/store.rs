use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::country::{CountryProfile, ProfileQuality, SUPPORTED_COUNTRIES};
use crate::config::MAX_SUPPORTED_DURATION_MONTHS;
use crate::error::MortgageError;
use crate::types::{Months, Rate};
use crate::MortgageResult;

/// How an annual-rate override entered the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateOrigin {
    Manual,
    Fetched,
}

/// A single change to one country's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum ProfileOverride {
    AnnualRate {
        country: String,
        quality: ProfileQuality,
        rate: Rate,
        origin: RateOrigin,
    },
    InsuranceRate {
        country: String,
        quality: ProfileQuality,
        rate: Rate,
    },
    PurchaseTaxRate { country: String, rate: Rate },
    TaxesFinanceable { country: String, value: bool },
    MinDownPaymentRatio { country: String, ratio: Rate },
    MaxDebtRatio { country: String, ratio: Rate },
    MaxLoanDuration { country: String, months: Months },
}

impl ProfileOverride {
    pub fn country(&self) -> &str {
        match self {
            ProfileOverride::AnnualRate { country, .. }
            | ProfileOverride::InsuranceRate { country, .. }
            | ProfileOverride::PurchaseTaxRate { country, .. }
            | ProfileOverride::TaxesFinanceable { country, .. }
            | ProfileOverride::MinDownPaymentRatio { country, .. }
            | ProfileOverride::MaxDebtRatio { country, .. }
            | ProfileOverride::MaxLoanDuration { country, .. } => country,
        }
    }
}

/// Source of a published average mortgage rate. Implemented by the
/// surrounding application; the simulation pipeline never calls it.
pub trait RateFetcher {
    /// Latest average annual rate for `country`, as a fraction.
    fn fetch_average_rate(&self, country: &str) -> MortgageResult<Rate>;
}

/// Immutable snapshot of the built-in profiles plus session overrides.
///
/// Every update returns a new store, so a simulation can hold one snapshot
/// for its whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileStore {
    overridden: BTreeMap<String, CountryProfile>,
    manual_rates: BTreeSet<(String, ProfileQuality)>,
}

impl ProfileStore {
    pub fn new() -> Self {
        ProfileStore::default()
    }

    /// Effective profile for `code`, overrides applied.
    pub fn profile(&self, code: &str) -> MortgageResult<CountryProfile> {
        let code = code.trim().to_ascii_uppercase();
        match self.overridden.get(&code) {
            Some(profile) => Ok(profile.clone()),
            None => CountryProfile::builtin(&code),
        }
    }

    /// Effective profiles for every supported country, sorted by code.
    pub fn profiles(&self) -> Vec<CountryProfile> {
        SUPPORTED_COUNTRIES
            .iter()
            .filter_map(|code| self.profile(code).ok())
            .collect()
    }

    pub fn is_annual_rate_manually_set(&self, code: &str, quality: ProfileQuality) -> bool {
        self.manual_rates
            .contains(&(code.trim().to_ascii_uppercase(), quality))
    }

    /// Apply one override, returning the updated snapshot.
    pub fn with_override(&self, change: &ProfileOverride) -> MortgageResult<ProfileStore> {
        let code = change.country().trim().to_ascii_uppercase();
        let mut profile = self.profile(&code)?;
        let mut manual_rates = self.manual_rates.clone();

        match *change {
            ProfileOverride::AnnualRate {
                quality,
                rate,
                origin,
                ..
            } => {
                if rate <= Decimal::ZERO {
                    return Err(MortgageError::validation("annual_rate", "must be > 0"));
                }
                match quality {
                    ProfileQuality::Average => profile.average.annual_rate = rate,
                    ProfileQuality::Best => profile.best.annual_rate = rate,
                }
                match origin {
                    RateOrigin::Manual => {
                        manual_rates.insert((code.clone(), quality));
                    }
                    RateOrigin::Fetched => {
                        manual_rates.remove(&(code.clone(), quality));
                    }
                }
            }
            ProfileOverride::InsuranceRate { quality, rate, .. } => match quality {
                ProfileQuality::Average => profile.average.insurance_rate = rate,
                ProfileQuality::Best => profile.best.insurance_rate = rate,
            },
            ProfileOverride::PurchaseTaxRate { rate, .. } => profile.purchase_tax_rate = rate,
            ProfileOverride::TaxesFinanceable { value, .. } => profile.taxes_financeable = value,
            ProfileOverride::MinDownPaymentRatio { ratio, .. } => {
                profile.min_down_payment_ratio = ratio
            }
            ProfileOverride::MaxDebtRatio { ratio, .. } => profile.max_debt_ratio = ratio,
            ProfileOverride::MaxLoanDuration { months, .. } => {
                if !(12..=MAX_SUPPORTED_DURATION_MONTHS).contains(&months) {
                    return Err(MortgageError::validation(
                        "max_loan_duration_months",
                        format!("must be between 12 and {MAX_SUPPORTED_DURATION_MONTHS} months"),
                    ));
                }
                profile.max_loan_duration_months = months;
            }
        }

        profile.validate()?;
        debug!(country = %code, ?change, "profile override applied");

        let mut overridden = self.overridden.clone();
        overridden.insert(code, profile);
        Ok(ProfileStore {
            overridden,
            manual_rates,
        })
    }

    /// Apply a sequence of overrides in order.
    pub fn with_overrides<'a>(
        &self,
        changes: impl IntoIterator<Item = &'a ProfileOverride>,
    ) -> MortgageResult<ProfileStore> {
        changes
            .into_iter()
            .try_fold(self.clone(), |store, change| store.with_override(change))
    }

    /// Replace the `average` annual rate of `code` with a freshly fetched one.
    pub fn with_fetched_rate(
        &self,
        fetcher: &dyn RateFetcher,
        code: &str,
    ) -> MortgageResult<ProfileStore> {
        let code = code.trim().to_ascii_uppercase();
        // Fail fast on unknown codes before touching the collaborator.
        self.profile(&code)?;
        let rate = fetcher.fetch_average_rate(&code)?;
        self.with_override(&ProfileOverride::AnnualRate {
            country: code,
            quality: ProfileQuality::Average,
            rate,
            origin: RateOrigin::Fetched,
        })
    }
}
