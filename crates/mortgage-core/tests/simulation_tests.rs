use mortgage_core::calculator::{amortization_schedule, effective_annual_rate};
use mortgage_core::config::SimulatorConfig;
use mortgage_core::feasibility::check_feasibility;
use mortgage_core::optimizer::optimize;
use mortgage_core::profiles::{ProfileOverride, ProfileQuality, ProfileStore, RateOrigin};
use mortgage_core::resolver::{resolve, OptimizationPreference, ParameterChange, RawRequest, ValueSource};
use mortgage_core::simulation::simulate;
use mortgage_core::{Ineligibility, MortgageError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn be_buyer(savings: Decimal) -> RawRequest {
    RawRequest::new(dec!(350000), dec!(6000), savings)
}

// ===========================================================================
// End-to-end simulation
// ===========================================================================

#[test]
fn test_belgian_buyer_total_cost() {
    let request = RawRequest {
        preference: Some(OptimizationPreference::MinimizeTotalCost),
        ..be_buyer(dec!(80000))
    };
    let output = simulate(&request, &ProfileStore::new(), &SimulatorConfig::default()).unwrap();
    let result = &output.result;

    // 350k price + 12.5% registration tax, 20% of it as the minimum
    assert_eq!(result.parameters.total_acquisition_cost, dec!(393750));
    assert_eq!(result.parameters.effective_minimum_down_payment, dec!(78750));

    let plan = &result.plan;
    assert_eq!(plan.down_payment, dec!(80000));
    assert_eq!(plan.principal, dec!(313750));
    assert_eq!(plan.duration_months, 204);
    assert!(plan.monthly_installment <= result.feasibility.monthly_cap);
    // Presented figures are rounded independently
    assert!((plan.monthly_installment - plan.monthly_emi - plan.monthly_insurance).abs() <= dec!(0.01));
    assert!(
        (plan.total_repaid - plan.principal - plan.total_interest - plan.total_insurance).abs()
            <= dec!(0.02)
    );
}

#[test]
fn test_french_buyer_short_on_income() {
    let request = RawRequest {
        country: Some("FR".into()),
        purchase_taxes: Some(dec!(68000)),
        ..RawRequest::new(dec!(499000), dec!(5500), dec!(100000))
    };
    let store = ProfileStore::new();
    let config = SimulatorConfig::default();

    let params = resolve(&request, &store, &config).unwrap();
    assert_eq!(params.purchase_taxes.source(), ValueSource::User);
    // Taxes are not financeable in France, so they set the minimum
    assert_eq!(params.effective_minimum_down_payment, dec!(68000));
    assert_eq!(params.monthly_cap(), dec!(1925));

    match simulate(&request, &store, &config) {
        Err(MortgageError::Ineligible(Ineligibility::InsufficientIncome {
            monthly_cap,
            shortfall,
            ..
        })) => {
            assert_eq!(monthly_cap, dec!(1925));
            assert!(shortfall > Decimal::ZERO);
        }
        other => panic!("expected InsufficientIncome, got {other:?}"),
    }
}

#[test]
fn test_shortfall_is_reported_exactly() {
    match simulate(&be_buyer(dec!(50000)), &ProfileStore::new(), &SimulatorConfig::default()) {
        Err(MortgageError::Ineligible(Ineligibility::InsufficientSavings {
            required,
            shortfall,
            ..
        })) => {
            assert_eq!(required, dec!(78750));
            assert_eq!(shortfall, dec!(28750));
        }
        other => panic!("expected InsufficientSavings, got {other:?}"),
    }
}

#[test]
fn test_minimum_down_payment_preference_never_puts_in_more() {
    let store = ProfileStore::new();
    let config = SimulatorConfig::default();
    let params = resolve(&be_buyer(dec!(120000)), &store, &config).unwrap();
    let pass = check_feasibility(&params, &config).unwrap();

    let smallest = optimize(&params, &pass, OptimizationPreference::MinimizeDownPayment, &config).unwrap();
    for preference in OptimizationPreference::ALL {
        let plan = optimize(&params, &pass, preference, &config).unwrap();
        assert!(smallest.down_payment <= plan.down_payment, "{preference}");
        assert!(plan.monthly_installment <= pass.monthly_cap, "{preference}");
    }
}

#[test]
fn test_fixed_duration_is_respected() {
    let request = RawRequest {
        fixed_duration_months: Some(240),
        ..be_buyer(dec!(100000))
    };
    let output = simulate(&request, &ProfileStore::new(), &SimulatorConfig::default()).unwrap();
    assert_eq!(output.result.plan.duration_months, 240);
    assert_eq!(output.result.feasibility.max_duration_months, 240);
}

#[test]
fn test_zero_rate_in_discount_band_still_prices() {
    // 150k down puts the loan under 75% LTV, where BE discounts the rate
    let request = RawRequest {
        annual_rate: Some(Decimal::ZERO),
        insurance_rate: Some(dec!(0.0025)),
        preference: Some(OptimizationPreference::MinimizeTotalCost),
        ..be_buyer(dec!(150000))
    };
    let output = simulate(&request, &ProfileStore::new(), &SimulatorConfig::default()).unwrap();
    let plan = &output.result.plan;
    assert_eq!(plan.annual_rate, Decimal::ZERO);
    assert_eq!(plan.total_interest, Decimal::ZERO);
    assert!(plan.monthly_installment <= output.result.feasibility.monthly_cap);
}

#[test]
fn test_interest_free_loan_with_uneven_split() {
    // 313750 over 300 months does not divide evenly
    let request = RawRequest {
        annual_rate: Some(Decimal::ZERO),
        insurance_rate: Some(Decimal::ZERO),
        preference: Some(OptimizationPreference::MinimizeMonthlyPayment),
        ..be_buyer(dec!(80000))
    };
    let output = simulate(&request, &ProfileStore::new(), &SimulatorConfig::default()).unwrap();
    let plan = &output.result.plan;
    assert_eq!(plan.duration_months, 300);
    assert_eq!(plan.apr, Decimal::ZERO);
    assert_eq!(plan.monthly_installment, dec!(1045.83));
}

#[test]
fn test_billion_scale_loan_at_steep_rate_does_not_panic() {
    let request = RawRequest {
        annual_rate: Some(dec!(0.99)),
        max_loan_duration_months: Some(600),
        ..RawRequest::new(dec!(3_000_000_000), dec!(6000), dec!(750_000_000))
    };
    let store = ProfileStore::new();
    let config = SimulatorConfig::default();
    let params = resolve(&request, &store, &config).unwrap();
    match check_feasibility(&params, &config) {
        Err(MortgageError::Ineligible(Ineligibility::InsufficientIncome {
            required_payment, ..
        })) => assert!(required_payment > dec!(100_000_000)),
        other => panic!("expected InsufficientIncome, got {other:?}"),
    }
}

// ===========================================================================
// Sweet spot
// ===========================================================================

#[test]
fn test_sweet_spot_leaves_surcharge_band() {
    // 10% minimum lands above 90% LTV, where BE charges a premium
    let request = RawRequest {
        min_down_payment_ratio: Some(dec!(0.10)),
        annual_rate: Some(dec!(0.05)),
        insurance_rate: Some(dec!(0.0025)),
        ..be_buyer(dec!(150000))
    };
    let output = simulate(&request, &ProfileStore::new(), &SimulatorConfig::default()).unwrap();
    let params = &output.result.parameters;
    let analysis = &output.result.sweet_spot;

    assert!(params.ltv_tiers.is_surcharge(params.ltv_for(params.effective_minimum_down_payment)));
    assert_eq!(analysis.effective_floor, dec!(78750));
    assert!(!params.ltv_tiers.is_surcharge(params.ltv_for(analysis.sweet_spot)));
    // 150k savings less six months of 6k income
    assert_eq!(analysis.sweet_spot, dec!(114000));
    assert!(analysis.sweet_spot_milestone().is_some());
}

// ===========================================================================
// Profiles and re-resolution
// ===========================================================================

#[test]
fn test_manual_rate_override_flows_into_resolution() {
    let store = ProfileStore::new()
        .with_override(&ProfileOverride::AnnualRate {
            country: "be".into(),
            quality: ProfileQuality::Average,
            rate: dec!(0.041),
            origin: RateOrigin::Manual,
        })
        .unwrap();
    assert!(store.is_annual_rate_manually_set("BE", ProfileQuality::Average));

    let params = resolve(&be_buyer(dec!(80000)), &store, &SimulatorConfig::default()).unwrap();
    assert_eq!(params.annual_rate.get(), dec!(0.041));
    assert_eq!(params.annual_rate.source(), ValueSource::CountryProfile);

    // Built-ins are untouched
    let pristine = resolve(&be_buyer(dec!(80000)), &ProfileStore::new(), &SimulatorConfig::default()).unwrap();
    assert_eq!(pristine.annual_rate.get(), dec!(0.0320));
}

#[test]
fn test_country_change_recomputes_profile_fields_only() {
    let store = ProfileStore::new();
    let config = SimulatorConfig::default();
    let request = RawRequest {
        max_debt_ratio: Some(dec!(0.40)),
        ..be_buyer(dec!(80000))
    };
    let be = resolve(&request, &store, &config).unwrap();
    let fr = be
        .reresolve(&ParameterChange::Country(Some("FR".into())), &store, &config)
        .unwrap();

    assert_eq!(fr.country.value(), "FR");
    assert_eq!(fr.annual_rate.get(), dec!(0.0350));
    assert_eq!(fr.max_debt_ratio.get(), dec!(0.40));
    assert!(fr.max_debt_ratio.is_user());
}

// ===========================================================================
// Amortisation
// ===========================================================================

#[test]
fn test_schedule_repays_principal_exactly() {
    let principal = dec!(300000);
    let rows: Vec<_> = amortization_schedule(principal, dec!(0.03), dec!(0.002), 240)
        .unwrap()
        .collect();

    assert_eq!(rows.len(), 240);
    assert_eq!(rows[0].opening_balance, principal);
    assert_eq!(rows.last().map(|r| r.closing_balance), Some(Decimal::ZERO));
    assert!(rows.windows(2).all(|w| w[1].closing_balance < w[0].closing_balance));
    assert!(rows.iter().all(|r| r.insurance == rows[0].insurance));

    let repaid: Decimal = rows.iter().map(|r| r.principal).sum();
    assert!((repaid - principal).abs() < dec!(0.01));
}

#[test]
fn test_apr_exceeds_nominal_rate_with_insurance() {
    let schedule = amortization_schedule(dec!(200000), dec!(0.03), dec!(0.003), 240).unwrap();
    let installment = schedule.emi() + schedule.monthly_insurance();
    let apr = effective_annual_rate(dec!(200000), installment, 240).unwrap();
    assert!(apr > dec!(0.03));
    assert!(apr < dec!(0.04));
}
