pub mod calculator;
pub mod config;
pub mod error;
pub mod feasibility;
pub mod optimizer;
pub mod profiles;
pub mod resolver;
pub mod simulation;
pub mod types;

#[cfg(feature = "sweet_spot")]
pub mod sweet_spot;

pub use error::{Ineligibility, MortgageError};
pub use types::*;

/// Standard result type for all mortgage-planner operations
pub type MortgageResult<T> = Result<T, MortgageError>;
