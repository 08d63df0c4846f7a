use std::time::Instant;

use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use mortgage_core::calculator::{self, LoanPlanInput};
use mortgage_core::feasibility::check_feasibility;
use mortgage_core::optimizer::optimize;
use mortgage_core::profiles::{ProfileQuality, SUPPORTED_COUNTRIES};
use mortgage_core::resolver::{resolve, OptimizationPreference, RawRequest};
use mortgage_core::simulation;
use mortgage_core::sweet_spot::analyze_sweet_spot;
use mortgage_core::types::{round_money, round_ratio, with_metadata, Months};
use mortgage_core::MortgageError;

use crate::config::Context;
use crate::input;

/// Mortgage request, as flags or as a JSON document
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct RequestArgs {
    /// Property price
    #[arg(long, alias = "price")]
    pub property_price: Option<Decimal>,

    /// Net monthly income
    #[arg(long, alias = "income")]
    pub monthly_income: Option<Decimal>,

    /// Savings available for the down payment
    #[arg(long, alias = "savings")]
    pub available_savings: Option<Decimal>,

    /// ISO country code (BE, FR, DE, ES, PT, IT, GB, US)
    #[arg(long)]
    pub country: Option<String>,

    /// Profile quality: average or best
    #[arg(long)]
    pub quality: Option<ProfileQuality>,

    /// Purchase taxes (estimated from the country profile when omitted)
    #[arg(long)]
    pub purchase_taxes: Option<Decimal>,

    /// Annual interest rate (e.g. 0.032 for 3.2%)
    #[arg(long, alias = "rate")]
    pub annual_rate: Option<Decimal>,

    /// Annual borrower-insurance rate on the original principal
    #[arg(long)]
    pub insurance_rate: Option<Decimal>,

    /// Minimum down payment as a share of the acquisition cost
    #[arg(long)]
    pub min_down_payment_ratio: Option<Decimal>,

    /// Longest loan duration, in months or years ("300", "25y")
    #[arg(long, value_parser = parse_duration)]
    pub max_duration: Option<Months>,

    /// Pin the loan to exactly this duration ("240", "20y")
    #[arg(long, value_parser = parse_duration)]
    pub fixed_duration: Option<Months>,

    /// Down payment you would like to put in
    #[arg(long)]
    pub preferred_down_payment: Option<Decimal>,

    /// Highest share of income the instalment may take
    #[arg(long)]
    pub max_debt_ratio: Option<Decimal>,

    /// Absolute monthly payment cap
    #[arg(long)]
    pub max_monthly_payment: Option<Decimal>,

    /// minimize-total-cost, minimize-monthly-payment, minimize-duration,
    /// minimize-down-payment or balanced
    #[arg(long)]
    pub preference: Option<OptimizationPreference>,

    /// Path to JSON request file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Loan terms for a stand-alone amortisation schedule
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct ScheduleArgs {
    /// Amount borrowed
    #[arg(long)]
    pub principal: Decimal,

    /// Annual interest rate (e.g. 0.032 for 3.2%)
    #[arg(long, alias = "rate")]
    pub annual_rate: Decimal,

    /// Annual borrower-insurance rate on the original principal
    #[arg(long, default_value = "0")]
    pub insurance_rate: Decimal,

    /// Loan duration, in months or years ("300", "25y")
    #[arg(long, value_parser = parse_duration)]
    pub duration: Months,
}

#[derive(Args)]
pub struct ProfilesArgs {
    /// Show a single country, including its LTV tiers
    #[arg(long)]
    pub country: Option<String>,
}

/// Parse `240`, `240m` or `20y` into months.
pub fn parse_duration(raw: &str) -> Result<Months, String> {
    let s = raw.trim().to_ascii_lowercase();
    let (digits, factor) = if let Some(years) = s.strip_suffix('y') {
        (years, 12)
    } else if let Some(months) = s.strip_suffix('m') {
        (months, 1)
    } else {
        (s.as_str(), 1)
    };
    let value: Months = digits
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a duration (expected e.g. 240, 240m or 20y)"))?;
    value
        .checked_mul(factor)
        .ok_or_else(|| format!("'{raw}' is too long"))
}

fn build_request(args: RequestArgs) -> Result<RawRequest, Box<dyn std::error::Error>> {
    if let Some(ref path) = args.input {
        return input::file::read_json(path);
    }
    if let Some(request) = input::stdin::read_stdin()? {
        return Ok(request);
    }

    Ok(RawRequest {
        country: args.country,
        profile_quality: args.quality,
        purchase_taxes: args.purchase_taxes,
        annual_rate: args.annual_rate,
        insurance_rate: args.insurance_rate,
        min_down_payment_ratio: args.min_down_payment_ratio,
        max_loan_duration_months: args.max_duration,
        fixed_duration_months: args.fixed_duration,
        preferred_down_payment: args.preferred_down_payment,
        max_debt_ratio: args.max_debt_ratio,
        max_monthly_payment: args.max_monthly_payment,
        preference: args.preference,
        ..RawRequest::new(
            args.property_price
                .ok_or("--property-price is required (or provide --input)")?,
            args.monthly_income
                .ok_or("--monthly-income is required (or provide --input)")?,
            args.available_savings
                .ok_or("--available-savings is required (or provide --input)")?,
        )
    })
}

pub fn run_simulate(args: RequestArgs, ctx: &Context) -> Result<Value, Box<dyn std::error::Error>> {
    let request = build_request(args)?;
    let result = simulation::simulate(&request, &ctx.store, &ctx.config)?;
    Ok(serde_json::to_value(result)?)
}

/// Eligibility report. An ineligible buyer is a normal answer here, not an
/// error.
pub fn run_feasibility(args: RequestArgs, ctx: &Context) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let request = build_request(args)?;
    let params = resolve(&request, &ctx.store, &ctx.config)?;

    let report = match check_feasibility(&params, &ctx.config) {
        Ok(pass) => json!({
            "eligible": true,
            "total_acquisition_cost": round_money(params.total_acquisition_cost),
            "min_down_payment": round_money(pass.min_down_payment),
            "max_down_payment": round_money(pass.max_down_payment),
            "min_principal": round_money(pass.min_principal),
            "max_principal": round_money(pass.max_principal),
            "monthly_cap": round_money(pass.monthly_cap),
            "duration_range_months": [pass.min_duration_months, pass.max_duration_months],
            "cheapest_installment": round_money(pass.cheapest_installment),
            "cheapest_rate": round_ratio(pass.cheapest_rate),
        }),
        Err(MortgageError::Ineligible(reason)) => json!({
            "eligible": false,
            "total_acquisition_cost": round_money(params.total_acquisition_cost),
            "min_down_payment": round_money(params.effective_minimum_down_payment),
            "monthly_cap": round_money(params.monthly_cap()),
            "message": reason.to_string(),
            "reason": reason,
        }),
        Err(e) => return Err(e.into()),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(serde_json::to_value(with_metadata(
        "Affordability pre-check at the cheapest loan corner",
        &request,
        Vec::new(),
        elapsed,
        report,
    ))?)
}

pub fn run_sweet_spot(args: RequestArgs, ctx: &Context) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let request = build_request(args)?;
    let params = resolve(&request, &ctx.store, &ctx.config)?;
    let pass = check_feasibility(&params, &ctx.config)?;
    let plan = optimize(&params, &pass, params.preference.get(), &ctx.config)?;
    let analysis = analyze_sweet_spot(
        &params,
        &plan,
        &params.ltv_tiers,
        ctx.config.opportunity_cost_rate,
        ctx.config.reserve_months,
    )?;

    let warnings = analysis.warnings.clone();
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(serde_json::to_value(with_metadata(
        "LTV-tier floor with APR versus opportunity-cost comparison",
        &request,
        warnings,
        elapsed,
        analysis.rounded(),
    ))?)
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    if args.principal <= Decimal::ZERO {
        return Err("--principal must be positive".into());
    }
    let schedule = calculator::amortization_schedule(
        args.principal,
        args.annual_rate,
        args.insurance_rate,
        args.duration,
    )?;
    let monthly_emi = schedule.emi();
    let monthly_insurance = schedule.monthly_insurance();
    let rows: Vec<_> = schedule.map(|row| row.rounded()).collect();
    let total_interest: Decimal = rows.iter().map(|r| r.interest).sum();

    // Same assembly the optimizer uses; income and price only feed ratios.
    let plan = calculator::build_loan_plan(&LoanPlanInput {
        down_payment: Decimal::ZERO,
        principal: args.principal,
        annual_rate: args.annual_rate,
        annual_insurance_rate: args.insurance_rate,
        duration_months: args.duration,
        monthly_income: Decimal::ONE,
        property_price: args.principal,
    })?;

    let result = json!({
        "principal": round_money(args.principal),
        "annual_rate": args.annual_rate,
        "duration_months": args.duration,
        "monthly_emi": round_money(monthly_emi),
        "monthly_insurance": round_money(monthly_insurance),
        "monthly_installment": round_money(monthly_emi + monthly_insurance),
        "apr": round_ratio(plan.apr),
        "total_interest": round_money(total_interest),
        "total_cost": round_money(plan.total_cost),
        "rows": rows,
    });

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(serde_json::to_value(with_metadata(
        "Fixed-rate annuity amortisation, insurance on original principal",
        &json!({
            "principal": args.principal,
            "annual_rate": args.annual_rate,
            "insurance_rate": args.insurance_rate,
            "duration_months": args.duration,
        }),
        Vec::new(),
        elapsed,
        result,
    ))?)
}

pub fn run_profiles(args: ProfilesArgs, ctx: &Context) -> Result<Value, Box<dyn std::error::Error>> {
    let profiles = match args.country {
        Some(ref code) => vec![ctx.store.profile(code)?],
        None => ctx.store.profiles(),
    };

    let rows: Vec<Value> = profiles
        .iter()
        .map(|p| {
            let mut row = json!({
                "code": p.code,
                "currency": p.currency,
                "average_rate": p.average.annual_rate,
                "best_rate": p.best.annual_rate,
                "average_insurance": p.average.insurance_rate,
                "best_insurance": p.best.insurance_rate,
                "purchase_tax_rate": p.purchase_tax_rate,
                "taxes_financeable": p.taxes_financeable,
                "min_down_payment_ratio": p.min_down_payment_ratio,
                "max_debt_ratio": p.max_debt_ratio,
                "max_duration_months": p.max_loan_duration_months,
                "manual_rate": ctx.store.is_annual_rate_manually_set(&p.code, ProfileQuality::Average)
                    || ctx.store.is_annual_rate_manually_set(&p.code, ProfileQuality::Best),
            });
            if args.country.is_some() {
                row["ltv_tiers"] = json!(p.ltv_tiers);
            }
            row
        })
        .collect();

    Ok(json!({
        "result": rows,
        "supported": SUPPORTED_COUNTRIES,
    }))
}
