use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::request::{OptimizationPreference, ParameterChange, RawRequest};
use crate::config::SimulatorConfig;
use crate::error::MortgageError;
use crate::profiles::{LtvTierTable, ProfileQuality, ProfileStore};
use crate::types::{round_money, Money, Months, Rate};
use crate::MortgageResult;

/// Where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    User,
    CountryProfile,
    Default,
}

impl fmt::Display for ValueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueSource::User => write!(f, "user"),
            ValueSource::CountryProfile => write!(f, "country_profile"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value tagged with its provenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum Sourced<T> {
    User(T),
    CountryProfile(T),
    Default(T),
}

impl<T> Sourced<T> {
    /// User value when present, otherwise `fallback` tagged as profile data.
    fn from_profile(user: Option<T>, fallback: T) -> Self {
        match user {
            Some(v) => Sourced::User(v),
            None => Sourced::CountryProfile(fallback),
        }
    }

    fn from_default(user: Option<T>, fallback: T) -> Self {
        match user {
            Some(v) => Sourced::User(v),
            None => Sourced::Default(fallback),
        }
    }

    pub fn value(&self) -> &T {
        match self {
            Sourced::User(v) | Sourced::CountryProfile(v) | Sourced::Default(v) => v,
        }
    }

    pub fn source(&self) -> ValueSource {
        match self {
            Sourced::User(_) => ValueSource::User,
            Sourced::CountryProfile(_) => ValueSource::CountryProfile,
            Sourced::Default(_) => ValueSource::Default,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Sourced::User(_))
    }

    /// The value only if the user supplied it.
    pub fn user_value(&self) -> Option<&T> {
        match self {
            Sourced::User(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: Copy> Sourced<T> {
    pub fn get(&self) -> T {
        *self.value()
    }
}

/// A request with every field filled in. Immutable: edits go through
/// [`ResolvedParameters::reresolve`], which returns a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedParameters {
    pub country: Sourced<String>,
    pub profile_quality: Sourced<ProfileQuality>,
    pub currency: String,
    pub property_price: Money,
    pub monthly_income: Money,
    pub available_savings: Money,
    pub purchase_taxes: Sourced<Money>,
    pub taxes_financeable: bool,
    pub annual_rate: Sourced<Rate>,
    pub insurance_rate: Sourced<Rate>,
    pub min_down_payment_ratio: Sourced<Rate>,
    pub max_loan_duration_months: Sourced<Months>,
    pub fixed_duration_months: Option<Months>,
    pub preferred_down_payment: Option<Money>,
    pub max_debt_ratio: Sourced<Rate>,
    pub max_monthly_payment: Sourced<Money>,
    pub preference: Sourced<OptimizationPreference>,
    pub total_acquisition_cost: Money,
    pub effective_minimum_down_payment: Money,
    pub ltv_tiers: LtvTierTable,
}

impl ResolvedParameters {
    pub fn principal_for(&self, down_payment: Money) -> Money {
        self.total_acquisition_cost - down_payment
    }

    /// Loan-to-value of the loan left after `down_payment`.
    pub fn ltv_for(&self, down_payment: Money) -> Decimal {
        self.principal_for(down_payment) / self.property_price
    }

    /// Base annual rate plus the LTV tier adjustment.
    pub fn rate_for_ltv(&self, ltv: Decimal) -> Rate {
        self.ltv_tiers.rate_for_ltv(self.annual_rate.get(), ltv)
    }

    /// Highest instalment the buyer may commit to.
    pub fn monthly_cap(&self) -> Money {
        (self.monthly_income * self.max_debt_ratio.get()).min(self.max_monthly_payment.get())
    }

    /// Provenance of every optional field, by field name.
    pub fn provenance(&self) -> BTreeMap<&'static str, ValueSource> {
        BTreeMap::from([
            ("country", self.country.source()),
            ("profile_quality", self.profile_quality.source()),
            ("purchase_taxes", self.purchase_taxes.source()),
            ("annual_rate", self.annual_rate.source()),
            ("insurance_rate", self.insurance_rate.source()),
            ("min_down_payment_ratio", self.min_down_payment_ratio.source()),
            ("max_loan_duration_months", self.max_loan_duration_months.source()),
            ("max_debt_ratio", self.max_debt_ratio.source()),
            ("max_monthly_payment", self.max_monthly_payment.source()),
            ("preference", self.preference.source()),
        ])
    }

    /// The request carrying only what the user actually supplied.
    pub fn to_request(&self) -> RawRequest {
        RawRequest {
            property_price: self.property_price,
            monthly_income: self.monthly_income,
            available_savings: self.available_savings,
            country: self.country.user_value().cloned(),
            profile_quality: self.profile_quality.user_value().copied(),
            purchase_taxes: self.purchase_taxes.user_value().copied(),
            annual_rate: self.annual_rate.user_value().copied(),
            insurance_rate: self.insurance_rate.user_value().copied(),
            min_down_payment_ratio: self.min_down_payment_ratio.user_value().copied(),
            max_loan_duration_months: self.max_loan_duration_months.user_value().copied(),
            fixed_duration_months: self.fixed_duration_months,
            preferred_down_payment: self.preferred_down_payment,
            max_debt_ratio: self.max_debt_ratio.user_value().copied(),
            max_monthly_payment: self.max_monthly_payment.user_value().copied(),
            preference: self.preference.user_value().copied(),
        }
    }

    /// Apply one change and resolve again. User-supplied fields survive;
    /// everything taken from the profile or the defaults is recomputed.
    pub fn reresolve(
        &self,
        change: &ParameterChange,
        store: &ProfileStore,
        config: &SimulatorConfig,
    ) -> MortgageResult<ResolvedParameters> {
        let mut request = self.to_request();
        change.apply(&mut request);
        debug!(?change, "re-resolving parameters");
        resolve(&request, store, config)
    }

    /// Resolve again against a newer profile snapshot.
    pub fn refresh(
        &self,
        store: &ProfileStore,
        config: &SimulatorConfig,
    ) -> MortgageResult<ResolvedParameters> {
        resolve(&self.to_request(), store, config)
    }
}

/// Merge a request with its country profile and the simulator defaults.
pub fn resolve(
    request: &RawRequest,
    store: &ProfileStore,
    config: &SimulatorConfig,
) -> MortgageResult<ResolvedParameters> {
    request.validate()?;

    let country = match &request.country {
        Some(code) => Sourced::User(code.trim().to_ascii_uppercase()),
        None => Sourced::Default(config.default_country.trim().to_ascii_uppercase()),
    };
    let profile_quality = Sourced::from_default(request.profile_quality, config.default_quality);
    let profile = store.profile(country.value())?;
    let quality = profile_quality.get();

    let annual_rate = Sourced::from_profile(request.annual_rate, profile.annual_rate(quality));
    let insurance_rate =
        Sourced::from_profile(request.insurance_rate, profile.insurance_rate(quality));
    let min_down_payment_ratio =
        Sourced::from_profile(request.min_down_payment_ratio, profile.min_down_payment_ratio);
    let max_loan_duration_months = Sourced::from_profile(
        request.max_loan_duration_months,
        profile.max_loan_duration_months,
    );
    let max_debt_ratio = Sourced::from_profile(request.max_debt_ratio, profile.max_debt_ratio);
    let max_monthly_payment =
        Sourced::from_default(request.max_monthly_payment, config.default_max_monthly_payment);
    let preference = Sourced::from_default(request.preference, OptimizationPreference::default());

    if let Some(fixed) = request.fixed_duration_months {
        if fixed > max_loan_duration_months.get() {
            return Err(MortgageError::validation(
                "fixed_duration_months",
                format!(
                    "{fixed} months exceeds the maximum loan duration of {} months",
                    max_loan_duration_months.get()
                ),
            ));
        }
    }

    let purchase_taxes = match request.purchase_taxes {
        Some(taxes) => Sourced::User(taxes),
        None => Sourced::CountryProfile(round_money(
            request.property_price * profile.purchase_tax_rate,
        )),
    };

    let total_acquisition_cost = request.property_price + purchase_taxes.get();
    let ratio_minimum = total_acquisition_cost * min_down_payment_ratio.get();
    let effective_minimum_down_payment = if profile.taxes_financeable {
        ratio_minimum
    } else {
        ratio_minimum.max(purchase_taxes.get())
    };

    debug!(
        country = %country.value(),
        quality = %quality,
        %total_acquisition_cost,
        %effective_minimum_down_payment,
        "parameters resolved"
    );

    Ok(ResolvedParameters {
        country,
        profile_quality,
        currency: profile.currency,
        property_price: request.property_price,
        monthly_income: request.monthly_income,
        available_savings: request.available_savings,
        purchase_taxes,
        taxes_financeable: profile.taxes_financeable,
        annual_rate,
        insurance_rate,
        min_down_payment_ratio,
        max_loan_duration_months,
        fixed_duration_months: request.fixed_duration_months,
        preferred_down_payment: request.preferred_down_payment,
        max_debt_ratio,
        max_monthly_payment,
        preference,
        total_acquisition_cost,
        effective_minimum_down_payment,
        ltv_tiers: profile.ltv_tiers,
    })
}
