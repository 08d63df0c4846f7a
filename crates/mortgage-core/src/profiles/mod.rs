//! Country profiles: per-quality market rates, regulatory limits and
//! LTV-based rate tiers, plus the immutable session override layer.

pub mod country;
pub mod store;
pub mod tiers;

pub use country::{CountryProfile, ProfileQuality, QualityRates, SUPPORTED_COUNTRIES};
pub use store::{ProfileOverride, ProfileStore, RateFetcher, RateOrigin};
pub use tiers::{LtvTier, LtvTierTable};
