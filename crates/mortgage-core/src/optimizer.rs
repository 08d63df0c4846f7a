//! Grid search over (down payment × duration).
//!
//! Every candidate is priced at the rate of its own LTV band, so the cost
//! surface is piecewise and the search is exhaustive rather than analytic.

use std::cmp::Ordering;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::calculator::{build_loan_plan, emi, monthly_insurance, monthly_rate, LoanPlan, LoanPlanInput};
use crate::config::SimulatorConfig;
use crate::error::MortgageError;
use crate::feasibility::FeasibilityPass;
use crate::resolver::{OptimizationPreference, ResolvedParameters};
use crate::types::{Money, Months, Rate};
use crate::MortgageResult;

// ---------------------------------------------------------------------------
// Search grid
// ---------------------------------------------------------------------------

/// The explicit Cartesian product the optimizer walks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchGrid {
    pub down_payments: Vec<Money>,
    pub durations: Vec<Months>,
}

impl SearchGrid {
    pub fn new(params: &ResolvedParameters, config: &SimulatorConfig) -> SearchGrid {
        SearchGrid {
            down_payments: down_payment_steps(
                params.effective_minimum_down_payment,
                params.available_savings,
                config.down_payment_step,
            ),
            durations: searchable_durations(params, config),
        }
    }

    pub fn len(&self) -> usize {
        self.down_payments.len() * self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every (down payment, duration) pair, down payment major.
    pub fn points(&self) -> impl Iterator<Item = (Money, Months)> + '_ {
        self.down_payments
            .iter()
            .flat_map(move |&dp| self.durations.iter().map(move |&months| (dp, months)))
    }
}

/// `min, min + step, …` below `max`, then `max` itself.
pub fn down_payment_steps(min: Money, max: Money, step: Money) -> Vec<Money> {
    if min > max || step <= Decimal::ZERO {
        return Vec::new();
    }
    let mut steps = Vec::new();
    let mut current = min;
    while current < max {
        steps.push(current);
        current += step;
    }
    steps.push(max);
    steps
}

/// Durations on the grid: the fixed override alone, or whole steps from the
/// configured minimum up to the resolved maximum.
pub fn searchable_durations(params: &ResolvedParameters, config: &SimulatorConfig) -> Vec<Months> {
    if let Some(fixed) = params.fixed_duration_months {
        return vec![fixed];
    }
    let step = config.duration_step_months.max(1) as usize;
    (config.min_duration_months..=params.max_loan_duration_months.get())
        .step_by(step)
        .collect()
}

// ---------------------------------------------------------------------------
// Candidate evaluation
// ---------------------------------------------------------------------------

/// Lightweight pricing of one grid point, enough to rank it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub down_payment: Money,
    pub duration_months: Months,
    pub principal: Money,
    pub annual_rate: Rate,
    pub monthly_installment: Money,
    pub total_cost: Money,
}

/// Price one grid point; `None` when the loan is empty or over the cap.
pub fn evaluate_candidate(
    params: &ResolvedParameters,
    down_payment: Money,
    duration_months: Months,
    monthly_cap: Money,
) -> MortgageResult<Option<Candidate>> {
    let principal = params.principal_for(down_payment);
    if principal <= Decimal::ZERO {
        return Ok(None);
    }

    let annual_rate = params.rate_for_ltv(principal / params.property_price);
    let payment = emi(principal, monthly_rate(annual_rate), duration_months)?;
    let insurance = monthly_insurance(principal, params.insurance_rate.get());
    let monthly_installment = payment + insurance;
    if monthly_installment > monthly_cap {
        return Ok(None);
    }

    let n = Decimal::from(duration_months);
    Ok(Some(Candidate {
        down_payment,
        duration_months,
        principal,
        annual_rate,
        monthly_installment,
        total_cost: payment * n - principal + insurance * n,
    }))
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Span {
    min: Decimal,
    max: Decimal,
}

impl Span {
    fn of(values: impl Iterator<Item = Decimal>) -> Option<Span> {
        values.fold(None, |acc, v| match acc {
            None => Some(Span { min: v, max: v }),
            Some(s) => Some(Span {
                min: s.min.min(v),
                max: s.max.max(v),
            }),
        })
    }

    fn normalize(&self, v: Decimal) -> Decimal {
        if self.max == self.min {
            Decimal::ZERO
        } else {
            (v - self.min) / (self.max - self.min)
        }
    }
}

/// Min-max ranges of the four balanced-score metrics over the feasible set.
#[derive(Debug, Clone, Copy)]
struct BalancedSpans {
    cost: Span,
    installment: Span,
    duration: Span,
    down_payment: Span,
}

impl BalancedSpans {
    fn of(candidates: &[Candidate]) -> Option<BalancedSpans> {
        Some(BalancedSpans {
            cost: Span::of(candidates.iter().map(|c| c.total_cost))?,
            installment: Span::of(candidates.iter().map(|c| c.monthly_installment))?,
            duration: Span::of(candidates.iter().map(|c| Decimal::from(c.duration_months)))?,
            down_payment: Span::of(candidates.iter().map(|c| c.down_payment))?,
        })
    }

    fn score(&self, c: &Candidate) -> Decimal {
        self.cost.normalize(c.total_cost)
            + self.installment.normalize(c.monthly_installment)
            + self.duration.normalize(Decimal::from(c.duration_months))
            + self.down_payment.normalize(c.down_payment)
    }
}

/// Total order on candidates for one preference. Every branch ends on
/// (duration, down payment), which is unique per grid point.
fn compare(
    a: &Candidate,
    b: &Candidate,
    preference: OptimizationPreference,
    spans: Option<&BalancedSpans>,
) -> Ordering {
    let by_cost = || a.total_cost.cmp(&b.total_cost);
    let by_duration = || a.duration_months.cmp(&b.duration_months);
    let by_down_payment = || a.down_payment.cmp(&b.down_payment);

    match preference {
        OptimizationPreference::MinimizeTotalCost => by_cost()
            .then_with(by_duration)
            .then_with(by_down_payment),
        OptimizationPreference::MinimizeMonthlyPayment => a
            .monthly_installment
            .cmp(&b.monthly_installment)
            .then_with(by_cost)
            .then_with(by_duration)
            .then_with(by_down_payment),
        OptimizationPreference::MinimizeDuration => by_duration()
            .then_with(by_cost)
            .then_with(by_down_payment),
        OptimizationPreference::MinimizeDownPayment => by_down_payment()
            .then_with(by_cost)
            .then_with(by_duration),
        OptimizationPreference::Balanced => {
            let by_score = match spans {
                Some(s) => s.score(a).cmp(&s.score(b)),
                None => Ordering::Equal,
            };
            by_score
                .then_with(by_cost)
                .then_with(by_duration)
                .then_with(by_down_payment)
        }
    }
}

/// Feasible candidates of a grid, best first, plus how many points were
/// priced.
pub fn rank_candidates(
    params: &ResolvedParameters,
    grid: &SearchGrid,
    monthly_cap: Money,
    preference: OptimizationPreference,
) -> MortgageResult<(Vec<Candidate>, usize)> {
    let mut evaluated = 0usize;
    let mut feasible = Vec::new();
    for (down_payment, months) in grid.points() {
        evaluated += 1;
        if let Some(candidate) = evaluate_candidate(params, down_payment, months, monthly_cap)? {
            feasible.push(candidate);
        }
    }

    let spans = BalancedSpans::of(&feasible);
    feasible.sort_by(|a, b| compare(a, b, preference, spans.as_ref()));
    Ok((feasible, evaluated))
}

/// Best plan for `preference` among all grid points under the monthly cap.
#[instrument(skip_all, fields(preference = %preference))]
pub fn optimize(
    params: &ResolvedParameters,
    feasibility: &FeasibilityPass,
    preference: OptimizationPreference,
    config: &SimulatorConfig,
) -> MortgageResult<LoanPlan> {
    let grid = SearchGrid::new(params, config);
    let (ranked, evaluated) = rank_candidates(params, &grid, feasibility.monthly_cap, preference)?;
    debug!(
        grid_points = grid.len(),
        evaluated,
        feasible = ranked.len(),
        "grid search finished"
    );

    let best = ranked
        .first()
        .ok_or(MortgageError::OptimizationExhausted {
            candidates_evaluated: evaluated,
        })?;

    build_loan_plan(&LoanPlanInput {
        down_payment: best.down_payment,
        principal: best.principal,
        annual_rate: best.annual_rate,
        annual_insurance_rate: params.insurance_rate.get(),
        duration_months: best.duration_months,
        monthly_income: params.monthly_income,
        property_price: params.property_price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feasibility::check_feasibility;
    use crate::profiles::ProfileStore;
    use crate::resolver::{resolve, RawRequest};
    use rust_decimal_macros::dec;

    fn be_params(savings: Money) -> ResolvedParameters {
        resolve(
            &RawRequest::new(dec!(350000), dec!(6000), savings),
            &ProfileStore::new(),
            &SimulatorConfig::default(),
        )
        .unwrap()
    }

    fn run(params: &ResolvedParameters, preference: OptimizationPreference) -> LoanPlan {
        let config = SimulatorConfig::default();
        let pass = check_feasibility(params, &config).unwrap();
        optimize(params, &pass, preference, &config).unwrap()
    }

    #[test]
    fn test_down_payment_steps_clip_to_savings() {
        assert_eq!(
            down_payment_steps(dec!(78750), dec!(80000), dec!(1000)),
            vec![dec!(78750), dec!(79750), dec!(80000)]
        );
        assert_eq!(
            down_payment_steps(dec!(1000), dec!(3000), dec!(1000)),
            vec![dec!(1000), dec!(2000), dec!(3000)]
        );
        assert_eq!(down_payment_steps(dec!(5), dec!(5), dec!(1000)), vec![dec!(5)]);
        assert!(down_payment_steps(dec!(6), dec!(5), dec!(1000)).is_empty());
    }

    #[test]
    fn test_grid_is_cartesian_product() {
        let params = be_params(dec!(80000));
        let grid = SearchGrid::new(&params, &SimulatorConfig::default());
        assert_eq!(grid.down_payments.len(), 3);
        assert_eq!(grid.durations.first(), Some(&12));
        assert_eq!(grid.durations.last(), Some(&300));
        assert_eq!(grid.len(), 75);
        assert_eq!(grid.points().count(), 75);
    }

    #[test]
    fn test_fixed_duration_pins_grid() {
        let mut request = RawRequest::new(dec!(350000), dec!(6000), dec!(150000));
        request.fixed_duration_months = Some(240);
        let params = resolve(&request, &ProfileStore::new(), &SimulatorConfig::default()).unwrap();
        let plan = run(&params, OptimizationPreference::MinimizeTotalCost);
        assert_eq!(plan.duration_months, 240);
        assert_eq!(plan.down_payment, dec!(150000));
        assert_eq!(plan.annual_rate, dec!(0.0295));
    }

    #[test]
    fn test_minimize_total_cost() {
        let plan = run(&be_params(dec!(80000)), OptimizationPreference::MinimizeTotalCost);
        assert_eq!(plan.down_payment, dec!(80000));
        assert_eq!(plan.duration_months, 204);
        assert!(plan.monthly_installment <= dec!(2100));
        assert_eq!(plan.rounded().monthly_installment, dec!(2061.43));
    }

    #[test]
    fn test_minimize_monthly_payment_takes_longest_duration() {
        let plan = run(&be_params(dec!(80000)), OptimizationPreference::MinimizeMonthlyPayment);
        assert_eq!(plan.duration_months, 300);
        assert_eq!(plan.down_payment, dec!(80000));
        assert_eq!(plan.rounded().monthly_installment, dec!(1586.04));
    }

    #[test]
    fn test_cheaper_ltv_band_is_found() {
        let plan = run(&be_params(dec!(150000)), OptimizationPreference::MinimizeTotalCost);
        assert_eq!(plan.down_payment, dec!(150000));
        assert_eq!(plan.duration_months, 144);
        assert_eq!(plan.annual_rate, dec!(0.0295));
    }

    #[test]
    fn test_minimize_down_payment_never_exceeds_total_cost_choice() {
        let params = be_params(dec!(150000));
        let cheapest = run(&params, OptimizationPreference::MinimizeTotalCost);
        let smallest = run(&params, OptimizationPreference::MinimizeDownPayment);
        assert!(smallest.down_payment <= cheapest.down_payment);
        assert_eq!(smallest.down_payment, dec!(78750));
        assert_eq!(smallest.duration_months, 204);
    }

    #[test]
    fn test_balanced_is_deterministic() {
        let params = be_params(dec!(150000));
        let first = run(&params, OptimizationPreference::Balanced);
        let second = run(&params, OptimizationPreference::Balanced);
        assert_eq!(first, second);
        assert_eq!(first.down_payment, dec!(78750));
        assert_eq!(first.duration_months, 204);
    }

    #[test]
    fn test_ranking_ignores_evaluation_order() {
        let params = be_params(dec!(90000));
        let grid = SearchGrid::new(&params, &SimulatorConfig::default());
        let reversed = SearchGrid {
            down_payments: grid.down_payments.iter().rev().copied().collect(),
            durations: grid.durations.iter().rev().copied().collect(),
        };
        for preference in OptimizationPreference::ALL {
            let (a, _) = rank_candidates(&params, &grid, dec!(2100), preference).unwrap();
            let (b, _) = rank_candidates(&params, &reversed, dec!(2100), preference).unwrap();
            assert_eq!(a.first(), b.first(), "{preference}");
        }
    }

    #[test]
    fn test_exhausted_grid_reports_count() {
        let params = be_params(dec!(80000));
        let config = SimulatorConfig::default();
        let mut pass = check_feasibility(&params, &config).unwrap();
        pass.monthly_cap = dec!(100);
        match optimize(&params, &pass, OptimizationPreference::Balanced, &config) {
            Err(MortgageError::OptimizationExhausted {
                candidates_evaluated,
            }) => assert_eq!(candidates_evaluated, 75),
            other => panic!("expected OptimizationExhausted, got {other:?}"),
        }
    }
}
