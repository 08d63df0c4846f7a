use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use mortgage_core::config::SimulatorConfig;
use mortgage_core::profiles::{ProfileOverride, ProfileStore};
use mortgage_core::resolver::RawRequest;
use mortgage_core::types::Months;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Request plus the optional config and profile overrides it runs against.
#[derive(Deserialize)]
struct RequestEnvelope {
    request: RawRequest,
    #[serde(default)]
    config: SimulatorConfig,
    #[serde(default)]
    profile_overrides: Vec<ProfileOverride>,
}

impl RequestEnvelope {
    fn parse(input_json: &str) -> NapiResult<(RawRequest, SimulatorConfig, ProfileStore)> {
        let envelope: RequestEnvelope = serde_json::from_str(input_json).map_err(to_napi_error)?;
        envelope.config.validate().map_err(to_napi_error)?;
        let store = ProfileStore::new()
            .with_overrides(&envelope.profile_overrides)
            .map_err(to_napi_error)?;
        Ok((envelope.request, envelope.config, store))
    }
}

#[derive(Deserialize)]
struct ScheduleInput {
    principal: Decimal,
    annual_rate: Decimal,
    #[serde(default)]
    insurance_rate: Decimal,
    duration_months: Months,
}

#[napi]
pub fn simulate(input_json: String) -> NapiResult<String> {
    let (request, config, store) = RequestEnvelope::parse(&input_json)?;
    let output =
        mortgage_core::simulation::simulate(&request, &store, &config).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Returns `{"eligible": true, "pass": ...}` or `{"eligible": false, "reason": ...}`.
/// Only malformed input is raised as an error.
#[napi]
pub fn check_feasibility(input_json: String) -> NapiResult<String> {
    let (request, config, store) = RequestEnvelope::parse(&input_json)?;
    let params =
        mortgage_core::resolver::resolve(&request, &store, &config).map_err(to_napi_error)?;
    let report = match mortgage_core::feasibility::check_feasibility(&params, &config) {
        Ok(pass) => serde_json::json!({ "eligible": true, "pass": pass }),
        Err(mortgage_core::MortgageError::Ineligible(reason)) => serde_json::json!({
            "eligible": false,
            "message": reason.to_string(),
            "reason": reason,
        }),
        Err(e) => return Err(to_napi_error(e)),
    };
    serde_json::to_string(&report).map_err(to_napi_error)
}

#[napi]
pub fn amortization_schedule(input_json: String) -> NapiResult<String> {
    let input: ScheduleInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let rows: Vec<_> = mortgage_core::calculator::amortization_schedule(
        input.principal,
        input.annual_rate,
        input.insurance_rate,
        input.duration_months,
    )
    .map_err(to_napi_error)?
    .map(|row| row.rounded())
    .collect();
    serde_json::to_string(&rows).map_err(to_napi_error)
}

#[napi]
pub fn sweet_spot(input_json: String) -> NapiResult<String> {
    let (request, config, store) = RequestEnvelope::parse(&input_json)?;
    let params =
        mortgage_core::resolver::resolve(&request, &store, &config).map_err(to_napi_error)?;
    let pass =
        mortgage_core::feasibility::check_feasibility(&params, &config).map_err(to_napi_error)?;
    let plan = mortgage_core::optimizer::optimize(&params, &pass, params.preference.get(), &config)
        .map_err(to_napi_error)?;
    let analysis = mortgage_core::sweet_spot::analyze_sweet_spot(
        &params,
        &plan,
        &params.ltv_tiers,
        config.opportunity_cost_rate,
        config.reserve_months,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&analysis.rounded()).map_err(to_napi_error)
}

/// Built-in profiles, with any overrides from `overrides_json` (a JSON list) applied.
#[napi]
pub fn country_profiles(overrides_json: Option<String>) -> NapiResult<String> {
    let overrides: Vec<ProfileOverride> = match overrides_json {
        Some(json) => serde_json::from_str(&json).map_err(to_napi_error)?,
        None => Vec::new(),
    };
    let store = ProfileStore::new()
        .with_overrides(&overrides)
        .map_err(to_napi_error)?;
    serde_json::to_string(&store.profiles()).map_err(to_napi_error)
}
