use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::MortgageError;
use crate::types::Rate;
use crate::MortgageResult;

/// One LTV band and the rate adjustment added to the base annual rate.
///
/// `rate_delta < 0` is a discount for a larger equity share,
/// `rate_delta > 0` a surcharge for a thin one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LtvTier {
    /// Inclusive upper LTV bound of the band (0.80 = 80% LTV).
    pub ltv_max: Decimal,
    pub rate_delta: Rate,
}

impl LtvTier {
    pub fn is_surcharge(&self) -> bool {
        self.rate_delta > Decimal::ZERO
    }
}

/// LTV bands ordered by strictly ascending `ltv_max`.
///
/// The first band whose `ltv_max` is at or above the loan's LTV applies; an
/// LTV beyond the last bound is priced with the last band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<LtvTier>", into = "Vec<LtvTier>")]
pub struct LtvTierTable {
    tiers: Vec<LtvTier>,
}

impl LtvTierTable {
    pub fn new(tiers: Vec<LtvTier>) -> MortgageResult<Self> {
        for (i, tier) in tiers.iter().enumerate() {
            if tier.ltv_max <= Decimal::ZERO {
                return Err(MortgageError::validation(
                    "ltv_tiers",
                    format!("tier {i} has a non-positive ltv_max ({})", tier.ltv_max),
                ));
            }
            if i > 0 && tier.ltv_max <= tiers[i - 1].ltv_max {
                return Err(MortgageError::validation(
                    "ltv_tiers",
                    "tiers must be listed in strictly ascending ltv_max order",
                ));
            }
        }
        Ok(LtvTierTable { tiers })
    }

    pub fn tiers(&self) -> &[LtvTier] {
        &self.tiers
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// The band pricing a loan at `ltv`, `None` only for an empty table.
    pub fn tier_for(&self, ltv: Decimal) -> Option<&LtvTier> {
        self.tiers
            .iter()
            .find(|t| ltv <= t.ltv_max)
            .or_else(|| self.tiers.last())
    }

    pub fn rate_delta(&self, ltv: Decimal) -> Rate {
        self.tier_for(ltv)
            .map(|t| t.rate_delta)
            .unwrap_or(Decimal::ZERO)
    }

    /// Base annual rate adjusted for the band `ltv` falls in, floored at
    /// zero so a discount never prices a negative rate.
    pub fn rate_for_ltv(&self, base_rate: Rate, ltv: Decimal) -> Rate {
        (base_rate + self.rate_delta(ltv)).max(Decimal::ZERO)
    }

    pub fn is_surcharge(&self, ltv: Decimal) -> bool {
        self.tier_for(ltv).is_some_and(LtvTier::is_surcharge)
    }

    /// Closest band strictly below `ltv` that carries no surcharge.
    pub fn nearest_non_surcharge_below(&self, ltv: Decimal) -> Option<&LtvTier> {
        self.tiers
            .iter()
            .rev()
            .filter(|t| t.ltv_max < ltv)
            .find(|t| !t.is_surcharge())
    }

    /// Band boundaries at which the applicable rate actually changes, in
    /// ascending LTV order. Each entry is the band entered when the LTV
    /// drops to its `ltv_max`.
    pub fn rate_boundaries(&self) -> Vec<LtvTier> {
        self.tiers
            .windows(2)
            .filter(|pair| pair[0].rate_delta != pair[1].rate_delta)
            .map(|pair| pair[0])
            .collect()
    }
}

impl TryFrom<Vec<LtvTier>> for LtvTierTable {
    type Error = MortgageError;

    fn try_from(tiers: Vec<LtvTier>) -> Result<Self, Self::Error> {
        LtvTierTable::new(tiers)
    }
}

impl From<LtvTierTable> for Vec<LtvTier> {
    fn from(table: LtvTierTable) -> Self {
        table.tiers
    }
}
