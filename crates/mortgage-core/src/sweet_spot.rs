//! Down-payment sweet spot.
//!
//! Finds the smallest down payment that escapes an LTV surcharge, then
//! decides whether surplus savings are better spent prepaying the loan or
//! kept invested, by comparing the loan's APR with an opportunity-cost rate.
//! The decision is laid out as a table of milestone down payments.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::calculator::{build_loan_plan, LoanPlan, LoanPlanInput};
use crate::profiles::LtvTierTable;
use crate::resolver::ResolvedParameters;
use crate::types::{ceil_money, round_money, round_ratio, Money, Months, Rate};
use crate::MortgageResult;

const MARGINAL_STEP: Money = dec!(1000);

/// What to do with savings beyond the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweetSpotStrategy {
    /// The loan costs more than savings earn: put savings into the loan, up
    /// to the liquidity reserve.
    PrepayDebt,
    /// Savings earn at least what the loan costs: borrow the most the floor
    /// allows and keep the rest.
    InvestSurplus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneKind {
    Minimum,
    LtvThreshold,
    SweetSpot,
    ReserveCeiling,
    Maximum,
    UserChoice,
}

/// One row of the sweet-spot table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweetSpotMilestone {
    pub label: String,
    pub kinds: Vec<MilestoneKind>,
    pub down_payment: Money,
    pub principal: Money,
    pub annual_rate: Rate,
    pub monthly_installment: Money,
    pub debt_ratio: Decimal,
    pub ltv: Decimal,
    pub total_cost: Money,
    pub remaining_liquidity: Money,
    pub is_sweet_spot: bool,
    pub is_user_choice: bool,
}

impl SweetSpotMilestone {
    pub fn rounded(&self) -> SweetSpotMilestone {
        SweetSpotMilestone {
            down_payment: round_money(self.down_payment),
            principal: round_money(self.principal),
            annual_rate: round_ratio(self.annual_rate),
            monthly_installment: round_money(self.monthly_installment),
            debt_ratio: round_ratio(self.debt_ratio),
            ltv: round_ratio(self.ltv),
            total_cost: round_money(self.total_cost),
            remaining_liquidity: round_money(self.remaining_liquidity),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweetSpotAnalysis {
    pub duration_months: Months,
    pub minimum_down_payment: Money,
    /// Smallest down payment outside the minimum's surcharge band.
    pub effective_floor: Money,
    pub apr_at_floor: Rate,
    pub opportunity_cost_rate: Rate,
    pub strategy: SweetSpotStrategy,
    pub sweet_spot: Money,
    /// Savings minus the liquidity reserve; may be negative.
    pub reserve_ceiling: Money,
    /// Total-cost reduction per extra 1000 of down payment above the floor.
    pub marginal_saving_per_1k: Money,
    pub reason: String,
    pub milestones: Vec<SweetSpotMilestone>,
    pub warnings: Vec<String>,
}

impl SweetSpotAnalysis {
    pub fn rounded(&self) -> SweetSpotAnalysis {
        SweetSpotAnalysis {
            minimum_down_payment: round_money(self.minimum_down_payment),
            effective_floor: round_money(self.effective_floor),
            apr_at_floor: round_ratio(self.apr_at_floor),
            opportunity_cost_rate: round_ratio(self.opportunity_cost_rate),
            sweet_spot: round_money(self.sweet_spot),
            reserve_ceiling: round_money(self.reserve_ceiling),
            marginal_saving_per_1k: round_money(self.marginal_saving_per_1k),
            milestones: self.milestones.iter().map(SweetSpotMilestone::rounded).collect(),
            ..self.clone()
        }
    }

    pub fn sweet_spot_milestone(&self) -> Option<&SweetSpotMilestone> {
        self.milestones.iter().find(|m| m.is_sweet_spot)
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

struct Pricer<'a> {
    params: &'a ResolvedParameters,
    tiers: &'a LtvTierTable,
    duration_months: Months,
}

impl Pricer<'_> {
    fn plan_at(&self, down_payment: Money) -> MortgageResult<LoanPlan> {
        let principal = self.params.principal_for(down_payment);
        let ltv = principal / self.params.property_price;
        build_loan_plan(&LoanPlanInput {
            down_payment,
            principal,
            annual_rate: self.tiers.rate_for_ltv(self.params.annual_rate.get(), ltv),
            annual_insurance_rate: self.params.insurance_rate.get(),
            duration_months: self.duration_months,
            monthly_income: self.params.monthly_income,
            property_price: self.params.property_price,
        })
    }

    /// Smallest cent-rounded down payment bringing the LTV to `ltv_max`.
    fn down_payment_for_ltv(&self, ltv_max: Decimal) -> Money {
        ceil_money(self.params.total_acquisition_cost - ltv_max * self.params.property_price)
    }
}

fn percent(ratio: Decimal) -> String {
    (ratio * dec!(100)).normalize().to_string()
}

fn label_for(kind: MilestoneKind, ltv_max: Option<Decimal>, reserve_months: u32) -> String {
    match kind {
        MilestoneKind::Minimum => "Minimum".to_string(),
        MilestoneKind::LtvThreshold => match ltv_max {
            Some(ltv) => format!("LTV ≤ {}%", percent(ltv)),
            None => "LTV threshold".to_string(),
        },
        MilestoneKind::SweetSpot => "Sweet spot".to_string(),
        MilestoneKind::ReserveCeiling => format!("{reserve_months}-month reserve"),
        MilestoneKind::Maximum => "Maximum".to_string(),
        MilestoneKind::UserChoice => "Your choice".to_string(),
    }
}

/// Sweet-spot analysis at the duration of `plan`.
#[instrument(skip_all, fields(duration = plan.duration_months))]
pub fn analyze_sweet_spot(
    params: &ResolvedParameters,
    plan: &LoanPlan,
    tiers: &LtvTierTable,
    opportunity_cost_rate: Rate,
    reserve_months: u32,
) -> MortgageResult<SweetSpotAnalysis> {
    let pricer = Pricer {
        params,
        tiers,
        duration_months: plan.duration_months,
    };
    let currency = &params.currency;
    let minimum = params.effective_minimum_down_payment;
    let savings = params.available_savings;
    let mut warnings = Vec::new();

    // Floor: leave the minimum's surcharge band when savings allow it.
    let min_ltv = params.ltv_for(minimum);
    let mut effective_floor = minimum;
    if tiers.is_surcharge(min_ltv) {
        match tiers.nearest_non_surcharge_below(min_ltv) {
            Some(tier) => {
                let escape = pricer.down_payment_for_ltv(tier.ltv_max).max(minimum);
                if escape <= savings {
                    effective_floor = escape;
                } else {
                    warnings.push(format!(
                        "Reaching LTV ≤ {}% needs a down payment of {} {currency}, above available savings; \
                         the floor stays at the minimum and the loan carries a rate surcharge.",
                        percent(tier.ltv_max),
                        round_money(escape)
                    ));
                }
            }
            None => warnings.push(
                "Every LTV band at or below the minimum's carries a surcharge; \
                 the floor stays at the minimum."
                    .to_string(),
            ),
        }
    }

    let floor_plan = pricer.plan_at(effective_floor)?;
    let apr_at_floor = floor_plan.apr;

    let reserve_target = Decimal::from(reserve_months) * params.monthly_income;
    let reserve_ceiling = savings - reserve_target;

    let (strategy, sweet_spot, reason) = if apr_at_floor > opportunity_cost_rate {
        let target = reserve_ceiling.min(savings).max(effective_floor);
        let reason = format!(
            "The loan's APR at the floor ({}%) exceeds the {}% opportunity cost, so every extra \
             {currency} of down payment saves more than it would earn. Put in savings up to the \
             {reserve_months}-month income reserve.",
            percent(round_ratio(apr_at_floor)),
            percent(opportunity_cost_rate),
        );
        (SweetSpotStrategy::PrepayDebt, target, reason)
    } else {
        let reason = format!(
            "The loan's APR at the floor ({}%) does not exceed the {}% opportunity cost, so \
             surplus savings earn more invested than they save on the loan. Stay at the floor.",
            percent(round_ratio(apr_at_floor)),
            percent(opportunity_cost_rate),
        );
        (SweetSpotStrategy::InvestSurplus, effective_floor, reason)
    };

    if savings - sweet_spot < reserve_target {
        warnings.push(format!(
            "The sweet spot leaves {} {currency} of savings, less than the {reserve_months}-month \
             income reserve of {} {currency}.",
            round_money(savings - sweet_spot),
            round_money(reserve_target)
        ));
    }

    if let Some(preferred) = params.preferred_down_payment {
        if preferred < minimum {
            warnings.push(format!(
                "Your preferred down payment of {} {currency} is below the required minimum of {} {currency}.",
                round_money(preferred),
                round_money(minimum)
            ));
        }
    }

    // Cost reduction from the next 1000 above the floor, scaled to 1000.
    let marginal_saving_per_1k = {
        let next = (effective_floor + MARGINAL_STEP).min(savings);
        if next > effective_floor {
            let next_plan = pricer.plan_at(next)?;
            (floor_plan.total_cost - next_plan.total_cost) * MARGINAL_STEP
                / (next - effective_floor)
        } else {
            Decimal::ZERO
        }
    };

    // Milestones keyed by amount; equal amounts merge.
    let mut points: BTreeMap<Money, Vec<(MilestoneKind, Option<Decimal>)>> = BTreeMap::new();
    let mut add = |amount: Money, kind: MilestoneKind, ltv_max: Option<Decimal>| {
        points.entry(amount).or_default().push((kind, ltv_max));
    };

    add(minimum, MilestoneKind::Minimum, None);
    for boundary in tiers.rate_boundaries() {
        let amount = pricer.down_payment_for_ltv(boundary.ltv_max);
        if amount > minimum && amount <= savings && params.principal_for(amount) > Decimal::ZERO {
            add(amount, MilestoneKind::LtvThreshold, Some(boundary.ltv_max));
        }
    }
    add(sweet_spot, MilestoneKind::SweetSpot, None);
    if reserve_ceiling >= minimum && reserve_ceiling <= savings {
        add(reserve_ceiling, MilestoneKind::ReserveCeiling, None);
    }
    add(savings, MilestoneKind::Maximum, None);
    if let Some(preferred) = params.preferred_down_payment {
        add(preferred, MilestoneKind::UserChoice, None);
    }

    let mut milestones = Vec::with_capacity(points.len());
    for (down_payment, entries) in points {
        let milestone_plan = pricer.plan_at(down_payment)?;
        let kinds: Vec<MilestoneKind> = entries.iter().map(|(kind, _)| *kind).collect();
        let label = entries
            .iter()
            .map(|&(kind, ltv_max)| label_for(kind, ltv_max, reserve_months))
            .collect::<Vec<_>>()
            .join(" / ");
        milestones.push(SweetSpotMilestone {
            label,
            is_sweet_spot: kinds.contains(&MilestoneKind::SweetSpot),
            is_user_choice: kinds.contains(&MilestoneKind::UserChoice),
            kinds,
            down_payment,
            principal: milestone_plan.principal,
            annual_rate: milestone_plan.annual_rate,
            monthly_installment: milestone_plan.monthly_installment,
            debt_ratio: milestone_plan.debt_ratio,
            ltv: milestone_plan.ltv_ratio,
            total_cost: milestone_plan.total_cost,
            remaining_liquidity: savings - down_payment,
        });
    }

    debug!(
        %effective_floor,
        %sweet_spot,
        ?strategy,
        milestones = milestones.len(),
        "sweet spot analysed"
    );

    Ok(SweetSpotAnalysis {
        duration_months: plan.duration_months,
        minimum_down_payment: minimum,
        effective_floor,
        apr_at_floor,
        opportunity_cost_rate,
        strategy,
        sweet_spot,
        reserve_ceiling,
        marginal_saving_per_1k,
        reason,
        milestones,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimulatorConfig;
    use crate::profiles::ProfileStore;
    use crate::resolver::{resolve, RawRequest};
    use pretty_assertions::assert_eq;

    /// BE buyer allowed a 10% minimum, which lands in the >90% LTV band.
    fn thin_equity(annual_rate: Rate, insurance_rate: Rate) -> ResolvedParameters {
        let request = RawRequest {
            min_down_payment_ratio: Some(dec!(0.10)),
            annual_rate: Some(annual_rate),
            insurance_rate: Some(insurance_rate),
            ..RawRequest::new(dec!(350000), dec!(6000), dec!(150000))
        };
        resolve(&request, &ProfileStore::new(), &SimulatorConfig::default()).unwrap()
    }

    fn plan_for(params: &ResolvedParameters, months: Months) -> LoanPlan {
        let principal = params.principal_for(params.available_savings);
        build_loan_plan(&LoanPlanInput {
            down_payment: params.available_savings,
            principal,
            annual_rate: params.rate_for_ltv(principal / params.property_price),
            annual_insurance_rate: params.insurance_rate.get(),
            duration_months: months,
            monthly_income: params.monthly_income,
            property_price: params.property_price,
        })
        .unwrap()
    }

    fn analyze(params: &ResolvedParameters) -> SweetSpotAnalysis {
        analyze_sweet_spot(
            params,
            &plan_for(params, 300),
            &params.ltv_tiers,
            dec!(0.035),
            6,
        )
        .unwrap()
    }

    #[test]
    fn test_floor_escapes_surcharge_band() {
        let params = thin_equity(dec!(0.05), dec!(0.0025));
        assert_eq!(params.effective_minimum_down_payment, dec!(39375));
        let analysis = analyze(&params);
        assert_eq!(analysis.effective_floor, dec!(78750));
        assert!(!params.ltv_tiers.is_surcharge(params.ltv_for(analysis.effective_floor)));
    }

    #[test]
    fn test_expensive_loan_prepays_to_reserve() {
        let params = thin_equity(dec!(0.05), dec!(0.0025));
        let analysis = analyze(&params);
        assert_eq!(analysis.strategy, SweetSpotStrategy::PrepayDebt);
        assert_eq!(analysis.reserve_ceiling, dec!(114000));
        assert_eq!(analysis.sweet_spot, dec!(114000));
        assert!(!params.ltv_tiers.is_surcharge(params.ltv_for(analysis.sweet_spot)));
        assert!(analysis.apr_at_floor > dec!(0.05));
        assert!(analysis.marginal_saving_per_1k > Decimal::ZERO);
        assert!(analysis.warnings.is_empty(), "{:?}", analysis.warnings);
    }

    #[test]
    fn test_cheap_loan_stays_at_floor() {
        let params = thin_equity(dec!(0.01), Decimal::ZERO);
        let analysis = analyze(&params);
        assert_eq!(analysis.strategy, SweetSpotStrategy::InvestSurplus);
        assert_eq!(analysis.sweet_spot, analysis.effective_floor);
        assert_eq!(analysis.sweet_spot, dec!(78750));
        assert!(params.ltv_tiers.is_surcharge(params.ltv_for(params.effective_minimum_down_payment)));
        assert!(!params.ltv_tiers.is_surcharge(params.ltv_for(analysis.sweet_spot)));
    }

    #[test]
    fn test_milestone_table() {
        let params = thin_equity(dec!(0.05), dec!(0.0025));
        let analysis = analyze(&params);
        let rows: Vec<(Money, &str)> = analysis
            .milestones
            .iter()
            .map(|m| (m.down_payment, m.label.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![
                (dec!(39375), "Minimum"),
                (dec!(78750), "LTV ≤ 90%"),
                (dec!(113750), "LTV ≤ 80%"),
                (dec!(114000), "Sweet spot / 6-month reserve"),
                (dec!(131250), "LTV ≤ 75%"),
                (dec!(150000), "Maximum"),
            ]
        );

        let sweet = analysis.sweet_spot_milestone().unwrap();
        assert!(sweet.is_sweet_spot);
        assert_eq!(sweet.remaining_liquidity, dec!(36000));
        assert_eq!(sweet.annual_rate, dec!(0.0485));

        let minimum = &analysis.milestones[0];
        assert_eq!(minimum.annual_rate, dec!(0.0525));
        assert_eq!(minimum.rounded().ltv, dec!(1.0125));
    }

    #[test]
    fn test_preferred_down_payment_is_annotated() {
        let mut params = thin_equity(dec!(0.05), dec!(0.0025));
        params.preferred_down_payment = Some(dec!(100000));
        let analysis = analyze(&params);
        let choice = analysis
            .milestones
            .iter()
            .find(|m| m.is_user_choice)
            .unwrap();
        assert_eq!(choice.down_payment, dec!(100000));
        assert_eq!(choice.label, "Your choice");

        // Landing on an existing milestone merges the labels.
        params.preferred_down_payment = Some(dec!(150000));
        let analysis = analyze(&params);
        let last = analysis.milestones.last().unwrap();
        assert_eq!(last.label, "Maximum / Your choice");
        assert!(last.is_user_choice);
    }

    #[test]
    fn test_preferred_below_minimum_warns() {
        let mut params = thin_equity(dec!(0.05), dec!(0.0025));
        params.preferred_down_payment = Some(dec!(20000));
        let analysis = analyze(&params);
        assert!(analysis.warnings.iter().any(|w| w.contains("below the required minimum")));
        assert_eq!(analysis.milestones[0].down_payment, dec!(20000));
    }

    #[test]
    fn test_unreachable_floor_warns() {
        let request = RawRequest {
            min_down_payment_ratio: Some(dec!(0.10)),
            ..RawRequest::new(dec!(350000), dec!(6000), dec!(50000))
        };
        let params = resolve(&request, &ProfileStore::new(), &SimulatorConfig::default()).unwrap();
        let analysis = analyze(&params);
        assert_eq!(analysis.effective_floor, dec!(39375));
        assert!(analysis.warnings.iter().any(|w| w.contains("LTV ≤ 90%")));
    }

    #[test]
    fn test_reserve_warning_when_savings_are_thin() {
        // Reserve of 36000 cannot be kept above the 78750 floor.
        let request = RawRequest {
            annual_rate: Some(dec!(0.05)),
            ..RawRequest::new(dec!(350000), dec!(6000), dec!(90000))
        };
        let params = resolve(&request, &ProfileStore::new(), &SimulatorConfig::default()).unwrap();
        let analysis = analyze(&params);
        assert_eq!(analysis.strategy, SweetSpotStrategy::PrepayDebt);
        assert_eq!(analysis.sweet_spot, dec!(78750));
        assert!(analysis.warnings.iter().any(|w| w.contains("6-month")));
    }
}
