//! Turns a partially filled [`RawRequest`] into [`ResolvedParameters`],
//! recording for every field whether the user, the country profile or the
//! simulator defaults supplied it.

pub mod params;
pub mod request;

pub use params::{resolve, ResolvedParameters, Sourced, ValueSource};
pub use request::{OptimizationPreference, ParameterChange, RawRequest};
