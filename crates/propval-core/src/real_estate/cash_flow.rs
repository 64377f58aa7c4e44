use serde::{Deserialize, Serialize};

use crate::error::PropValError;
use crate::time_value::discount_factor;
use crate::types::{pct_to_rate, Money, Percent};
use crate::PropValResult;

use super::amortization::AmortizationCalculator;
use super::assumptions::ValuationAssumptions;

/// The three rates a projection is sensitive to. Monte Carlo trials vary
/// these and hold everything else fixed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateScenario {
    /// Annual rent growth (%)
    pub growth_rate: Percent,
    /// Discount rate (%)
    pub discount_rate: Percent,
    /// Mortgage interest rate (%), ignored when unlevered
    pub interest_rate: Percent,
}

impl RateScenario {
    /// The point-estimate scenario stated in the assumptions.
    pub fn from_assumptions(assumptions: &ValuationAssumptions) -> Self {
        Self {
            growth_rate: assumptions.annual_rent_growth,
            discount_rate: assumptions.discount_rate,
            interest_rate: assumptions.interest_rate.unwrap_or(0.0),
        }
    }
}

/// One projected year. Year 0 is the acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowRow {
    pub year: u32,
    pub gross_rent: Money,
    pub vacancy_loss: Money,
    pub effective_rent: Money,
    pub management_fee: Money,
    pub operating_expenses: Money,
    pub noi: Money,
    pub capex: Money,
    pub debt_service: Money,
    /// Net sale proceeds after selling costs and loan payoff (final year only)
    pub terminal_value: Money,
    pub net_cash_flow: Money,
    pub discount_factor: f64,
    pub present_value: Money,
    pub cumulative_pv: Money,
}

impl CashFlowRow {
    fn acquisition(outlay: Money) -> Self {
        Self {
            year: 0,
            gross_rent: 0.0,
            vacancy_loss: 0.0,
            effective_rent: 0.0,
            management_fee: 0.0,
            operating_expenses: 0.0,
            noi: 0.0,
            capex: 0.0,
            debt_service: 0.0,
            terminal_value: 0.0,
            net_cash_flow: -outlay,
            discount_factor: 1.0,
            present_value: -outlay,
            cumulative_pv: -outlay,
        }
    }
}

/// Projects annual cash flows for validated assumptions.
///
/// Validation happens once in [`CashFlowProjector::new`]; [`project`] can then
/// be called repeatedly with different rate scenarios.
///
/// [`project`]: CashFlowProjector::project
#[derive(Debug)]
pub struct CashFlowProjector<'a> {
    assumptions: &'a ValuationAssumptions,
    warnings: Vec<String>,
}

impl<'a> CashFlowProjector<'a> {
    pub fn new(assumptions: &'a ValuationAssumptions) -> PropValResult<Self> {
        let mut warnings = Vec::new();
        assumptions.validate(&mut warnings)?;

        // Surface bad loan terms before any projection runs.
        AmortizationCalculator::for_assumptions(assumptions, None)?;

        Ok(Self {
            assumptions,
            warnings,
        })
    }

    /// Plausibility warnings raised while validating the assumptions.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Rows for years 0..=holding_period under `scenario`.
    pub fn project(&self, scenario: &RateScenario) -> PropValResult<Vec<CashFlowRow>> {
        let a = self.assumptions;

        if !scenario.discount_rate.is_finite() || scenario.discount_rate <= -100.0 {
            return Err(PropValError::InvalidAssumptions {
                field: "discount_rate".into(),
                reason: format!(
                    "Discount rate must be greater than -100%, got {}%",
                    scenario.discount_rate
                ),
            });
        }
        if !scenario.growth_rate.is_finite() {
            return Err(PropValError::InvalidAssumptions {
                field: "annual_rent_growth".into(),
                reason: "Must be a finite percentage".into(),
            });
        }

        let loan = AmortizationCalculator::for_assumptions(a, Some(scenario.interest_rate))?;

        let n = a.holding_period;
        let growth = 1.0 + pct_to_rate(scenario.growth_rate);
        let fixed_costs = a.fixed_operating_costs();
        let exit_cap = a.exit_cap_rate.filter(|rate| *rate > 0.0);

        let mut rows = Vec::with_capacity(n as usize + 1);
        let year0 = CashFlowRow::acquisition(a.acquisition_outlay());
        let mut cumulative_pv = year0.cumulative_pv;
        rows.push(year0);

        for year in 1..=n {
            let gross_rent = a.annual_rental_income * growth.powi(year as i32 - 1);
            let vacancy_loss = gross_rent * pct_to_rate(a.vacancy_rate);
            let effective_rent = gross_rent - vacancy_loss;
            let management_fee = effective_rent * pct_to_rate(a.management_fees);
            let operating_expenses = fixed_costs + management_fee;
            let noi = effective_rent - operating_expenses;

            let debt_service = loan.as_ref().map_or(0.0, |l| l.annual_payment(year));

            let terminal_value = match exit_cap {
                Some(cap) if year == n => {
                    let sale_price = noi / pct_to_rate(cap);
                    let net_proceeds = sale_price * (1.0 - pct_to_rate(a.selling_costs));
                    let payoff = loan.as_ref().map_or(0.0, |l| l.outstanding_balance(n));
                    net_proceeds - payoff
                }
                _ => 0.0,
            };

            let net_cash_flow = noi - a.capex - debt_service + terminal_value;
            let df = discount_factor(scenario.discount_rate, year);
            let present_value = net_cash_flow * df;
            cumulative_pv += present_value;

            rows.push(CashFlowRow {
                year,
                gross_rent,
                vacancy_loss,
                effective_rent,
                management_fee,
                operating_expenses,
                noi,
                capex: a.capex,
                debt_service,
                terminal_value,
                net_cash_flow,
                discount_factor: df,
                present_value,
                cumulative_pv,
            });
        }

        Ok(rows)
    }
}

/// Validate and project in one step using the assumptions' own rates.
pub fn project_cash_flows(assumptions: &ValuationAssumptions) -> PropValResult<Vec<CashFlowRow>> {
    let projector = CashFlowProjector::new(assumptions)?;
    projector.project(&RateScenario::from_assumptions(assumptions))
}

/// NPV of a projection: the final row's cumulative present value.
pub fn npv(rows: &[CashFlowRow]) -> Money {
    rows.last().map_or(0.0, |row| row.cumulative_pv)
}

/// The undiscounted net cash flow series, year 0 first.
pub fn net_cash_flows(rows: &[CashFlowRow]) -> Vec<Money> {
    rows.iter().map(|row| row.net_cash_flow).collect()
}
