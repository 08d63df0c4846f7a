//! End-to-end pipeline: resolve, check, optimize, analyse.

use std::collections::BTreeMap;
use std::time::Instant;

use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::calculator::LoanPlan;
use crate::config::SimulatorConfig;
use crate::feasibility::{check_feasibility, FeasibilityPass};
use crate::optimizer::optimize;
use crate::profiles::ProfileStore;
use crate::resolver::{resolve, RawRequest, ResolvedParameters, ValueSource};
#[cfg(feature = "sweet_spot")]
use crate::sweet_spot::{analyze_sweet_spot, SweetSpotAnalysis};
use crate::types::{with_metadata, ComputationOutput};
use crate::MortgageResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub parameters: ResolvedParameters,
    pub feasibility: FeasibilityPass,
    /// Optimal plan, rounded for presentation.
    pub plan: LoanPlan,
    #[cfg(feature = "sweet_spot")]
    pub sweet_spot: SweetSpotAnalysis,
}

#[derive(Serialize)]
struct Assumptions<'a> {
    request: &'a RawRequest,
    provenance: BTreeMap<&'static str, ValueSource>,
    config: &'a SimulatorConfig,
}

/// Run the full simulation against one profile snapshot.
///
/// Ineligible buyers come back as `MortgageError::Ineligible` before the
/// optimizer runs.
#[instrument(skip_all)]
pub fn simulate(
    request: &RawRequest,
    store: &ProfileStore,
    config: &SimulatorConfig,
) -> MortgageResult<ComputationOutput<SimulationResult>> {
    let start = Instant::now();
    config.validate()?;
    let mut warnings: Vec<String> = Vec::new();

    let params = resolve(request, store, config)?;
    let feasibility = check_feasibility(&params, config)?;
    let preference = params.preference.get();
    let plan = optimize(&params, &feasibility, preference, config)?;

    if params.ltv_tiers.is_surcharge(plan.ltv_ratio) {
        warnings.push(format!(
            "The chosen plan borrows at {}% LTV, inside a rate-surcharge band.",
            (plan.ltv_ratio * dec!(100)).round_dp(1)
        ));
    }

    #[cfg(feature = "sweet_spot")]
    let sweet_spot = {
        let analysis = analyze_sweet_spot(
            &params,
            &plan,
            &params.ltv_tiers,
            config.opportunity_cost_rate,
            config.reserve_months,
        )?;
        warnings.extend(analysis.warnings.iter().cloned());
        analysis.rounded()
    };

    info!(
        country = %params.country.value(),
        %preference,
        down_payment = %plan.down_payment,
        duration_months = plan.duration_months,
        "simulation complete"
    );

    let assumptions = Assumptions {
        request,
        provenance: params.provenance(),
        config,
    };
    let result = SimulationResult {
        feasibility,
        plan: plan.rounded(),
        #[cfg(feature = "sweet_spot")]
        sweet_spot,
        parameters: params,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        &format!("Fixed-rate annuity grid search ({preference}) with LTV-tiered pricing"),
        &assumptions,
        warnings,
        elapsed,
        result,
    ))
}
