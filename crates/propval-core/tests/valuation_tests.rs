use pretty_assertions::assert_eq;
use proptest::prelude::*;

use propval_core::real_estate::{
    calculate_direct_cap, net_cash_flows, npv, project_cash_flows, run_valuation,
    CashFlowProjector, DirectCapInput, PropertyTaxTreatment, RateScenario, ValuationAssumptions,
    ValuationRequest,
};
use propval_core::time_value::{
    calculate_irr, calculate_payback, discounted_payback, irr, simple_payback, IrrInput,
    PaybackInput,
};
use propval_core::PropValError;

// ===========================================================================
// Fixtures
// ===========================================================================

fn example_assumptions() -> ValuationAssumptions {
    ValuationAssumptions {
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
        exit_cap_rate: None,
        selling_costs: 0.0,
        property_tax_treatment: PropertyTaxTreatment::Annual,
    }
}

fn assert_close(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() <= tol,
        "expected {expected}, got {actual} (tol {tol})"
    );
}

// ===========================================================================
// Cash flow projection
// ===========================================================================

#[test]
fn test_example_scenario_year_one() {
    let rows = project_cash_flows(&example_assumptions()).unwrap();
    let y1 = &rows[1];

    assert_eq!(y1.gross_rent, 12_000.0);
    assert_close(y1.vacancy_loss, 600.0, 1e-9);
    assert_close(y1.effective_rent, 11_400.0, 1e-9);
    assert_close(y1.management_fee, 1_140.0, 1e-9);
    assert_close(y1.operating_expenses, 4_540.0, 1e-9);
    assert_close(y1.noi, 6_860.0, 1e-9);
    assert_close(y1.net_cash_flow, 6_860.0, 1e-9);
    assert_close(y1.discount_factor, 0.9259, 1e-4);
    assert_close(y1.present_value, 6_351.85, 0.01);
}

#[test]
fn test_example_scenario_shape() {
    let rows = project_cash_flows(&example_assumptions()).unwrap();
    let years: Vec<u32> = rows.iter().map(|r| r.year).collect();
    assert_eq!(years, (0..=10).collect::<Vec<u32>>());
    assert_eq!(rows[0].net_cash_flow, -102_000.0);
    assert_eq!(npv(&rows), rows[10].cumulative_pv);
}

#[test]
fn test_zero_holding_period_rejected() {
    let mut a = example_assumptions();
    a.holding_period = 0;
    let err = project_cash_flows(&a).unwrap_err();
    assert!(matches!(err, PropValError::InvalidAssumptions { .. }));
}

#[test]
fn test_ltv_over_100_rejected() {
    let mut a = example_assumptions();
    a.ltv = 120.0;
    a.interest_rate = Some(5.0);
    let err = CashFlowProjector::new(&a).unwrap_err();
    assert!(matches!(err, PropValError::InvalidLoanTerms { .. }));
}

#[test]
fn test_higher_discount_rate_lowers_npv() {
    let a = example_assumptions();
    let projector = CashFlowProjector::new(&a).unwrap();
    let base = RateScenario::from_assumptions(&a);
    let low = projector.project(&base).unwrap();
    let high = projector
        .project(&RateScenario {
            discount_rate: 12.0,
            ..base
        })
        .unwrap();
    assert!(npv(&high) < npv(&low));
}

// ===========================================================================
// Composite valuation
// ===========================================================================

#[test]
fn test_run_valuation_envelope() {
    let request = ValuationRequest {
        assumptions: ValuationAssumptions {
            exit_cap_rate: Some(6.0),
            selling_costs: 2.0,
            ..example_assumptions()
        },
        direct_cap_rate: Some(4.0),
    };
    let out = run_valuation(&request).unwrap();
    let v = &out.result;

    assert_eq!(v.cash_flows.len(), 11);
    assert_eq!(v.noi_year1, v.cash_flows[1].noi);
    let dc = v.direct_cap.as_ref().unwrap();
    assert_close(dc.value, v.noi_year1 / 0.04, 1e-6);

    // IRR solves the projected series
    let flows = net_cash_flows(&v.cash_flows);
    let rate = v.irr.unwrap();
    let residual: f64 = flows
        .iter()
        .enumerate()
        .map(|(t, cf)| cf / (1.0 + rate).powi(t as i32))
        .sum();
    assert!(residual.abs() < 1e-6 * 102_000.0 * 10.0);

    assert_eq!(out.metadata.precision, "ieee754_f64");
    assert_eq!(out.assumptions["direct_cap_rate"], 4.0);
    assert_eq!(out.assumptions["holding_period"], 10);
}

#[test]
fn test_direct_cap_reference_value() {
    let out = calculate_direct_cap(&DirectCapInput {
        noi: 8_000.0,
        cap_rate: 4.0,
    })
    .unwrap();
    assert_eq!(out.result.value, 200_000.0);
}

#[test]
fn test_direct_cap_zero_rate_rejected() {
    let err = calculate_direct_cap(&DirectCapInput {
        noi: 8_000.0,
        cap_rate: 0.0,
    })
    .unwrap_err();
    assert!(matches!(err, PropValError::InvalidCapRate { .. }));
}

// ===========================================================================
// IRR and payback
// ===========================================================================

#[test]
fn test_irr_standalone_reports_percent() {
    let out = calculate_irr(&IrrInput {
        cash_flows: vec![-1_000.0, 400.0, 400.0, 400.0],
    })
    .unwrap();
    assert!(out.result.found);
    let irr = out.result.irr.unwrap();
    assert_close(irr, 0.09701, 1e-4);
    assert_close(out.result.irr_pct.unwrap(), irr * 100.0, 1e-9);
}

#[test]
fn test_irr_all_positive_is_not_found() {
    assert_eq!(irr(&[100.0, 100.0, 100.0]), None);
    let out = calculate_irr(&IrrInput {
        cash_flows: vec![-100.0, -100.0],
    })
    .unwrap();
    assert!(!out.result.found);
}

#[test]
fn test_payback_standalone() {
    let out = calculate_payback(&PaybackInput {
        cash_flows: vec![-1_000.0, 400.0, 400.0, 400.0],
        discount_rate: Some(5.0),
    })
    .unwrap();
    assert_close(out.result.simple_payback.unwrap(), 2.5, 1e-9);
    let discounted = out.result.discounted_payback.unwrap();
    assert!(discounted > 2.5 && discounted <= 3.0);
}

#[test]
fn test_payback_beyond_horizon_is_none() {
    assert_eq!(simple_payback(&[-1_000.0, 100.0, 100.0]), None);
    assert_eq!(discounted_payback(&[-1_000.0, 100.0, 100.0], 5.0), None);
}

// ===========================================================================
// Properties
// ===========================================================================

fn arb_assumptions() -> impl Strategy<Value = ValuationAssumptions> {
    (
        1u32..40,
        0.0f64..25.0,
        -5.0f64..10.0,
        50_000.0f64..500_000.0,
        0.0f64..20.0,
        prop::option::of(3.0f64..12.0),
    )
        .prop_map(
            |(holding_period, discount_rate, growth, price, vacancy, exit_cap)| {
                ValuationAssumptions {
                    initial_investment: price,
                    annual_rental_income: price * 0.07,
                    vacancy_rate: vacancy,
                    discount_rate,
                    annual_rent_growth: growth,
                    holding_period,
                    exit_cap_rate: exit_cap,
                    ..example_assumptions()
                }
            },
        )
}

proptest! {
    #[test]
    fn prop_rows_cover_every_year(a in arb_assumptions()) {
        let rows = project_cash_flows(&a).unwrap();
        prop_assert_eq!(rows.len(), a.holding_period as usize + 1);
        for (i, row) in rows.iter().enumerate() {
            prop_assert_eq!(row.year, i as u32);
        }
    }

    #[test]
    fn prop_cumulative_pv_is_running_sum(a in arb_assumptions()) {
        let rows = project_cash_flows(&a).unwrap();
        let mut running = 0.0;
        for row in &rows {
            running += row.present_value;
            let tol = 1e-9 * running.abs().max(1.0);
            prop_assert!((row.cumulative_pv - running).abs() <= tol);
        }
    }

    #[test]
    fn prop_discount_factors(a in arb_assumptions()) {
        let rows = project_cash_flows(&a).unwrap();
        prop_assert_eq!(rows[0].discount_factor, 1.0);
        for row in &rows[1..] {
            let expected = 1.0 / (1.0 + a.discount_rate / 100.0).powi(row.year as i32);
            prop_assert!((row.discount_factor - expected).abs() <= 1e-9);
        }
    }

    #[test]
    fn prop_irr_round_trip(rate in 0.0f64..0.5, years in 2usize..25, payment in 100.0f64..10_000.0) {
        // level annuity priced at `rate`
        let annuity = if rate == 0.0 {
            years as f64
        } else {
            (1.0 - (1.0 + rate).powi(-(years as i32))) / rate
        };
        let mut flows = vec![-payment * annuity];
        flows.extend(std::iter::repeat(payment).take(years));
        let solved = irr(&flows).unwrap();
        prop_assert!((solved - rate).abs() < 1e-4, "rate {} solved {}", rate, solved);
    }

    #[test]
    fn prop_payback_within_horizon(flows in prop::collection::vec(-1_000.0f64..1_000.0, 2..30)) {
        if let Some(years) = simple_payback(&flows) {
            prop_assert!(years >= 0.0);
            prop_assert!(years <= (flows.len() - 1) as f64);
        }
    }
}
