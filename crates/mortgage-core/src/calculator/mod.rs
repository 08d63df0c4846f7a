//! Fixed-rate annuity arithmetic: instalments, schedules, APR and plan
//! assembly. Everything here works at full `Decimal` precision.

pub mod apr;
pub mod payment;
pub mod plan;
pub mod schedule;

pub use apr::effective_annual_rate;
pub use payment::{emi, monthly_insurance, monthly_rate};
pub use plan::{build_loan_plan, schedule, LoanPlan, LoanPlanInput};
pub use schedule::{amortization_schedule, AmortizationRow, AmortizationSchedule};
