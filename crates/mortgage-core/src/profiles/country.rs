use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::tiers::{LtvTier, LtvTierTable};
use crate::error::MortgageError;
use crate::types::{Months, Rate};
use crate::MortgageResult;

/// Country codes with a built-in profile, sorted.
pub const SUPPORTED_COUNTRIES: [&str; 8] = ["BE", "DE", "ES", "FR", "GB", "IT", "PT", "US"];

/// Market segment a profile's rates are quoted for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileQuality {
    #[default]
    Average,
    Best,
}

impl fmt::Display for ProfileQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileQuality::Average => write!(f, "average"),
            ProfileQuality::Best => write!(f, "best"),
        }
    }
}

impl FromStr for ProfileQuality {
    type Err = MortgageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "average" => Ok(ProfileQuality::Average),
            "best" => Ok(ProfileQuality::Best),
            other => Err(MortgageError::validation(
                "profile_quality",
                format!("'{other}' is not one of: average, best"),
            )),
        }
    }
}

/// Market-driven rates for one quality segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityRates {
    pub annual_rate: Rate,
    pub insurance_rate: Rate,
}

/// Static lending profile of a country.
///
/// Only `average`/`best` rates depend on quality; regulatory fields are
/// shared by both segments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryProfile {
    pub code: String,
    pub currency: String,
    pub average: QualityRates,
    pub best: QualityRates,
    pub purchase_tax_rate: Rate,
    pub taxes_financeable: bool,
    pub min_down_payment_ratio: Rate,
    pub max_debt_ratio: Rate,
    pub max_loan_duration_months: Months,
    pub ltv_tiers: LtvTierTable,
}

impl CountryProfile {
    pub fn rates(&self, quality: ProfileQuality) -> QualityRates {
        match quality {
            ProfileQuality::Average => self.average,
            ProfileQuality::Best => self.best,
        }
    }

    pub fn annual_rate(&self, quality: ProfileQuality) -> Rate {
        self.rates(quality).annual_rate
    }

    pub fn insurance_rate(&self, quality: ProfileQuality) -> Rate {
        self.rates(quality).insurance_rate
    }

    /// Look up the built-in profile for `code` (case-insensitive).
    pub fn builtin(code: &str) -> MortgageResult<CountryProfile> {
        let code = code.trim().to_ascii_uppercase();
        let profile = match code.as_str() {
            "BE" => eur(
                "BE",
                rates(dec!(0.0320), dec!(0.0025)),
                rates(dec!(0.0270), dec!(0.0010)),
                dec!(0.125),
                true,
                dec!(0.20),
                300,
                standard_tiers(dec!(-0.0025), dec!(-0.0015), dec!(0.0025)),
            ),
            "FR" => eur(
                "FR",
                rates(dec!(0.0350), dec!(0.0030)),
                rates(dec!(0.0290), dec!(0.0010)),
                dec!(0.075),
                false,
                dec!(0.00),
                300,
                standard_tiers(dec!(-0.0020), dec!(-0.0010), dec!(0.0030)),
            ),
            "ES" => eur(
                "ES",
                rates(dec!(0.0350), dec!(0.0020)),
                rates(dec!(0.0280), dec!(0.0009)),
                dec!(0.08),
                true,
                dec!(0.20),
                360,
                standard_tiers(dec!(-0.0020), dec!(-0.0010), dec!(0.0025)),
            ),
            "DE" => eur(
                "DE",
                rates(dec!(0.0380), dec!(0.0015)),
                rates(dec!(0.0310), dec!(0.0008)),
                dec!(0.05),
                true,
                dec!(0.20),
                360,
                tiers(&[
                    (dec!(0.60), dec!(-0.0025)),
                    (dec!(0.80), dec!(-0.0010)),
                    (dec!(0.90), dec!(0.0000)),
                    (dec!(1.00), dec!(0.0030)),
                ]),
            ),
            "PT" => eur(
                "PT",
                rates(dec!(0.0400), dec!(0.0025)),
                rates(dec!(0.0320), dec!(0.0010)),
                dec!(0.07),
                true,
                dec!(0.10),
                360,
                standard_tiers(dec!(-0.0020), dec!(-0.0010), dec!(0.0030)),
            ),
            "IT" => eur(
                "IT",
                rates(dec!(0.0400), dec!(0.0020)),
                rates(dec!(0.0320), dec!(0.0008)),
                dec!(0.04),
                true,
                dec!(0.20),
                360,
                standard_tiers(dec!(-0.0020), dec!(-0.0010), dec!(0.0030)),
            ),
            "GB" => CountryProfile {
                code: "GB".into(),
                currency: "GBP".into(),
                average: rates(dec!(0.0500), dec!(0.0025)),
                best: rates(dec!(0.0420), dec!(0.0012)),
                purchase_tax_rate: dec!(0.03),
                taxes_financeable: true,
                min_down_payment_ratio: dec!(0.10),
                max_debt_ratio: dec!(0.35),
                max_loan_duration_months: 420,
                ltv_tiers: tiers(&[
                    (dec!(0.60), dec!(-0.0030)),
                    (dec!(0.75), dec!(-0.0015)),
                    (dec!(0.90), dec!(0.0000)),
                    (dec!(1.00), dec!(0.0050)),
                ]),
            },
            "US" => CountryProfile {
                code: "US".into(),
                currency: "USD".into(),
                average: rates(dec!(0.0700), dec!(0.0080)),
                best: rates(dec!(0.0620), dec!(0.0040)),
                purchase_tax_rate: dec!(0.025),
                taxes_financeable: true,
                min_down_payment_ratio: dec!(0.20),
                max_debt_ratio: dec!(0.36),
                max_loan_duration_months: 360,
                ltv_tiers: tiers(&[
                    (dec!(0.80), dec!(-0.0025)),
                    (dec!(0.90), dec!(0.0000)),
                    (dec!(1.00), dec!(0.0075)),
                ]),
            },
            _ => {
                return Err(MortgageError::UnsupportedCountry {
                    code,
                    supported: SUPPORTED_COUNTRIES.join(", "),
                })
            }
        };
        Ok(profile)
    }

    /// Check the `best ≤ average` invariant and regulatory field ranges.
    pub fn validate(&self) -> MortgageResult<()> {
        if self.best.annual_rate > self.average.annual_rate {
            return Err(MortgageError::validation(
                "annual_rate",
                format!(
                    "'best' annual rate ({}) cannot exceed 'average' rate ({}) for {}",
                    self.best.annual_rate, self.average.annual_rate, self.code
                ),
            ));
        }
        if self.best.insurance_rate > self.average.insurance_rate {
            return Err(MortgageError::validation(
                "insurance_rate",
                format!(
                    "'best' insurance rate ({}) cannot exceed 'average' rate ({}) for {}",
                    self.best.insurance_rate, self.average.insurance_rate, self.code
                ),
            ));
        }
        for (field, value) in [
            ("annual_rate", self.best.annual_rate),
            ("annual_rate", self.average.annual_rate),
            ("insurance_rate", self.best.insurance_rate),
            ("insurance_rate", self.average.insurance_rate),
            ("purchase_tax_rate", self.purchase_tax_rate),
            ("min_down_payment_ratio", self.min_down_payment_ratio),
        ] {
            if value < Decimal::ZERO || value > Decimal::ONE {
                return Err(MortgageError::validation(field, "must be in [0, 1]"));
            }
        }
        if self.max_debt_ratio <= Decimal::ZERO || self.max_debt_ratio > Decimal::ONE {
            return Err(MortgageError::validation("max_debt_ratio", "must be in (0, 1]"));
        }
        Ok(())
    }
}

fn rates(annual_rate: Rate, insurance_rate: Rate) -> QualityRates {
    QualityRates {
        annual_rate,
        insurance_rate,
    }
}

#[allow(clippy::too_many_arguments)]
fn eur(
    code: &str,
    average: QualityRates,
    best: QualityRates,
    purchase_tax_rate: Rate,
    taxes_financeable: bool,
    min_down_payment_ratio: Rate,
    max_loan_duration_months: Months,
    ltv_tiers: LtvTierTable,
) -> CountryProfile {
    CountryProfile {
        code: code.into(),
        currency: "EUR".into(),
        average,
        best,
        purchase_tax_rate,
        taxes_financeable,
        min_down_payment_ratio,
        max_debt_ratio: dec!(0.35),
        max_loan_duration_months,
        ltv_tiers,
    }
}

fn tiers(bands: &[(Decimal, Rate)]) -> LtvTierTable {
    // Built-in bands are ascending by construction.
    LtvTierTable::new(
        bands
            .iter()
            .map(|&(ltv_max, rate_delta)| LtvTier { ltv_max, rate_delta })
            .collect(),
    )
    .unwrap_or_default()
}

/// 75 / 80 / 90 / 100 bands with a flat 80–90 band.
fn standard_tiers(le_75: Rate, le_80: Rate, le_100: Rate) -> LtvTierTable {
    tiers(&[
        (dec!(0.75), le_75),
        (dec!(0.80), le_80),
        (dec!(0.90), dec!(0.0000)),
        (dec!(1.00), le_100),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_profile_is_valid() {
        for code in SUPPORTED_COUNTRIES {
            let profile = CountryProfile::builtin(code).unwrap();
            assert_eq!(profile.code, code);
            assert!(profile.validate().is_ok(), "{code} profile invalid");
            assert!(!profile.ltv_tiers.is_empty(), "{code} has no LTV tiers");
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let profile = CountryProfile::builtin("fr").unwrap();
        assert_eq!(profile.code, "FR");
        assert!(!profile.taxes_financeable);
    }

    #[test]
    fn test_unknown_country() {
        match CountryProfile::builtin("ZZ") {
            Err(MortgageError::UnsupportedCountry { code, supported }) => {
                assert_eq!(code, "ZZ");
                assert!(supported.contains("BE"));
            }
            other => panic!("expected UnsupportedCountry, got {other:?}"),
        }
    }

    #[test]
    fn test_quality_selects_rates() {
        let be = CountryProfile::builtin("BE").unwrap();
        assert_eq!(be.annual_rate(ProfileQuality::Average), dec!(0.0320));
        assert_eq!(be.annual_rate(ProfileQuality::Best), dec!(0.0270));
        assert_eq!(be.insurance_rate(ProfileQuality::Best), dec!(0.0010));
    }

    #[test]
    fn test_quality_parsing() {
        assert_eq!("Best".parse::<ProfileQuality>().unwrap(), ProfileQuality::Best);
        assert!("premium".parse::<ProfileQuality>().is_err());
    }

    #[test]
    fn test_best_above_average_rejected() {
        let mut be = CountryProfile::builtin("BE").unwrap();
        be.best.annual_rate = dec!(0.04);
        assert!(be.validate().is_err());
    }
}
