use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::time_value::{discounted_payback, irr, simple_payback};
use crate::types::{with_metadata, ComputationOutput, Money, Percent, Rate, Years};
use crate::PropValResult;

use super::amortization::{AmortizationCalculator, AmortizationYear};
use super::assumptions::ValuationAssumptions;
use super::cash_flow::{net_cash_flows, npv, CashFlowProjector, CashFlowRow, RateScenario};
use super::direct_cap::{compute_direct_cap, DirectCapResult};

/// Deterministic valuation request: the assumptions plus an optional going-in
/// cap rate for a direct capitalisation cross-check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationRequest {
    #[serde(flatten)]
    pub assumptions: ValuationAssumptions,
    /// Cap rate (%) applied to year-1 NOI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direct_cap_rate: Option<Percent>,
}

/// Financing metrics when the acquisition is levered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeverageMetrics {
    pub loan_amount: Money,
    pub ltv: Percent,
    pub interest_rate: Percent,
    pub term_years: u32,
    pub monthly_payment: Money,
    /// 12 * monthly payment
    pub annual_debt_service: Money,
    /// Debt service coverage ratio (year-1 NOI / annual debt service)
    pub dscr: f64,
    /// Loan balance repaid from sale proceeds at exit
    pub balance_at_exit: Money,
    /// Amortization over the holding period
    pub schedule: Vec<AmortizationYear>,
}

/// Complete deterministic valuation output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValuationOutput {
    pub cash_flows: Vec<CashFlowRow>,
    /// Net present value (final cumulative PV)
    pub npv: Money,
    /// IRR as a decimal fraction; `None` when no root exists
    pub irr: Option<Rate>,
    pub irr_pct: Option<Percent>,
    pub simple_payback: Option<Years>,
    pub discounted_payback: Option<Years>,
    pub noi_year1: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_cap: Option<DirectCapResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leverage: Option<LeverageMetrics>,
}

/// Project cash flows and derive NPV, IRR, payback and optional direct-cap
/// and leverage metrics for one set of assumptions.
pub fn run_valuation(request: &ValuationRequest) -> PropValResult<ComputationOutput<ValuationOutput>> {
    let start = Instant::now();
    let assumptions = &request.assumptions;

    let projector = CashFlowProjector::new(assumptions)?;
    let mut warnings = projector.warnings().to_vec();

    let cash_flows = projector.project(&RateScenario::from_assumptions(assumptions))?;
    let flows = net_cash_flows(&cash_flows);
    let npv = npv(&cash_flows);
    let irr = irr(&flows);
    let noi_year1 = cash_flows.get(1).map_or(0.0, |row| row.noi);

    if irr.is_none() {
        warnings.push("IRR not found — cash flows have no sign change in [-99%, 1000%]".into());
    }

    let direct_cap = request
        .direct_cap_rate
        .map(|cap| compute_direct_cap(noi_year1, cap, &mut warnings))
        .transpose()?;

    let leverage = compute_leverage(assumptions, noi_year1, &mut warnings)?;

    let output = ValuationOutput {
        npv,
        irr,
        irr_pct: irr.map(|r| r * 100.0),
        simple_payback: simple_payback(&flows),
        discounted_payback: discounted_payback(&flows, assumptions.discount_rate),
        noi_year1,
        direct_cap,
        leverage,
        cash_flows,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Property DCF (annual projection, year-0 acquisition outlay)",
        request,
        warnings,
        elapsed,
        output,
    ))
}

fn compute_leverage(
    assumptions: &ValuationAssumptions,
    noi_year1: Money,
    warnings: &mut Vec<String>,
) -> PropValResult<Option<LeverageMetrics>> {
    let Some(loan) = AmortizationCalculator::for_assumptions(assumptions, None)? else {
        return Ok(None);
    };

    let annual_debt_service = loan.annual_payment(1);
    let dscr = if annual_debt_service > 0.0 {
        noi_year1 / annual_debt_service
    } else {
        0.0
    };

    if dscr < 1.2 && dscr > 0.0 {
        warnings.push(format!("DSCR of {dscr:.2} is below 1.20x — lender covenant risk"));
    }
    if assumptions.ltv > 80.0 {
        warnings.push(format!(
            "LTV of {:.1}% exceeds 80% — high leverage",
            assumptions.ltv
        ));
    }

    Ok(Some(LeverageMetrics {
        loan_amount: loan.loan_amount(),
        ltv: assumptions.ltv,
        interest_rate: assumptions.interest_rate.unwrap_or(0.0),
        term_years: loan.term_years(),
        monthly_payment: loan.monthly_payment(),
        annual_debt_service,
        dscr,
        balance_at_exit: loan.outstanding_balance(assumptions.holding_period),
        schedule: loan
            .schedule()
            .into_iter()
            .take(assumptions.holding_period as usize)
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::real_estate::assumptions::PropertyTaxTreatment;

    fn sample_request() -> ValuationRequest {
        ValuationRequest {
            assumptions: ValuationAssumptions {
                initial_investment: 100_000.0,
                annual_rental_income: 12_000.0,
                vacancy_rate: 5.0,
                service_charge: 1_000.0,
                ground_rent: 500.0,
                maintenance: 1_000.0,
                property_tax: 600.0,
                insurance: 300.0,
                management_fees: 10.0,
                transaction_costs: 2_000.0,
                annual_rent_growth: 2.0,
                discount_rate: 8.0,
                holding_period: 10,
                ltv: 0.0,
                interest_rate: None,
                loan_term_years: None,
                capex: 0.0,
                exit_cap_rate: Some(6.0),
                selling_costs: 2.0,
                property_tax_treatment: PropertyTaxTreatment::Annual,
            },
            direct_cap_rate: None,
        }
    }

    #[test]
    fn test_valuation_headline_metrics() {
        let out = run_valuation(&sample_request()).unwrap();
        let v = &out.result;
        assert_eq!(v.cash_flows.len(), 11);
        assert_eq!(v.npv, v.cash_flows[10].cumulative_pv);
        assert_eq!(v.noi_year1, v.cash_flows[1].noi);

        let irr = v.irr.expect("sale proceeds make the IRR exist");
        // NPV at the 8% discount rate is positive, so the IRR is above 8%
        assert!(v.npv > 0.0);
        assert!(irr > 0.08);
        assert!((v.irr_pct.unwrap() - irr * 100.0).abs() < 1e-12);
        assert!(v.leverage.is_none());
        assert!(v.direct_cap.is_none());
    }

    #[test]
    fn test_payback_falls_in_final_year_with_sale() {
        let out = run_valuation(&sample_request()).unwrap();
        let simple = out.result.simple_payback.unwrap();
        assert!(simple > 9.0 && simple <= 10.0, "got {simple}");
        let discounted = out.result.discounted_payback.unwrap();
        assert!(discounted >= simple);
    }

    #[test]
    fn test_no_exit_value_means_no_payback() {
        let mut req = sample_request();
        req.assumptions.exit_cap_rate = None;
        let out = run_valuation(&req).unwrap();
        // ~70k of income never recovers a 102k outlay within 10 years
        assert!(out.result.simple_payback.is_none());
        assert!(out.result.npv < 0.0);
    }

    #[test]
    fn test_direct_cap_uses_year_one_noi() {
        let mut req = sample_request();
        req.direct_cap_rate = Some(5.0);
        let out = run_valuation(&req).unwrap();
        let dc = out.result.direct_cap.unwrap();
        assert!((dc.value - 6_860.0 / 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_leverage_metrics_and_warnings() {
        let mut req = sample_request();
        req.assumptions.ltv = 85.0;
        req.assumptions.interest_rate = Some(6.0);
        req.assumptions.loan_term_years = Some(25);
        let out = run_valuation(&req).unwrap();
        let lev = out.result.leverage.unwrap();
        assert!((lev.loan_amount - 85_000.0).abs() < 1e-9);
        assert!((lev.annual_debt_service - 12.0 * lev.monthly_payment).abs() < 1e-9);
        assert!(lev.balance_at_exit > 0.0);
        assert_eq!(lev.schedule.len(), 10);
        assert!((lev.schedule[9].closing_balance - lev.balance_at_exit).abs() < 1e-6);
        assert!(out.warnings.iter().any(|w| w.contains("DSCR")));
        assert!(out.warnings.iter().any(|w| w.contains("LTV")));
    }

    #[test]
    fn test_request_deserialises_flattened() {
        let json = r#"{
            "initial_investment": 100000,
            "annual_rental_income": 12000,
            "maintenance": 1000,
            "property_tax": 600,
            "management_fees": 10,
            "transaction_costs": 2000,
            "annual_rent_growth": 2,
            "discount_rate": 8,
            "holding_period": 10,
            "direct_cap_rate": 4
        }"#;
        let req: ValuationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.direct_cap_rate, Some(4.0));
        assert_eq!(req.assumptions.holding_period, 10);
    }
}
