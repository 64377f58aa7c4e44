use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PropValError;
use crate::types::{pct_to_rate, with_metadata, ComputationOutput, Money, Percent, Rate, Years};
use crate::PropValResult;

/// Lowest rate scanned when bracketing an IRR (-99%).
pub const IRR_LOWER_BOUND: Rate = -0.99;
/// Highest rate scanned when bracketing an IRR (+1000%).
pub const IRR_UPPER_BOUND: Rate = 10.0;
const MAX_IRR_ITERATIONS: u32 = 200;
const IRR_RELATIVE_TOLERANCE: f64 = 1e-6;

/// Net Present Value of a series of cash flows, `rate` as a decimal fraction.
pub fn npv(rate: Rate, cash_flows: &[Money]) -> PropValResult<Money> {
    if rate <= -1.0 {
        return Err(PropValError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    Ok(npv_and_derivative(rate, cash_flows).0)
}

/// `1 / (1 + rate/100)^year` for a percentage rate.
#[inline]
pub fn discount_factor(rate: Percent, year: u32) -> f64 {
    1.0 / (1.0 + pct_to_rate(rate)).powi(year as i32)
}

/// Level payment that fully amortises `principal` over `periods` at `periodic_rate`.
///
/// `P * r / (1 - (1+r)^-n)`, or straight-line `P / n` when the rate is zero.
pub fn level_payment(principal: Money, periodic_rate: Rate, periods: u32) -> PropValResult<Money> {
    if periods == 0 {
        return Err(PropValError::InvalidInput {
            field: "periods".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    if periodic_rate == 0.0 {
        return Ok(principal / f64::from(periods));
    }

    let discount = (1.0 + periodic_rate).powi(-(periods as i32));
    let denominator = 1.0 - discount;
    if denominator == 0.0 {
        return Err(PropValError::InvalidInput {
            field: "periodic_rate".into(),
            reason: "Annuity factor is zero".into(),
        });
    }

    Ok(principal * periodic_rate / denominator)
}

// ---------------------------------------------------------------------------
// IRR
// ---------------------------------------------------------------------------

/// Internal Rate of Return as a decimal fraction.
///
/// Scans [-99%, +1000%] for the first sign change of NPV and refines it with a
/// bisection-safeguarded Newton iteration. Returns `None` when no sign change
/// exists in the bracket (all-positive or all-negative flows), which is an
/// ordinary outcome rather than an error. At the iteration cap the best
/// estimate seen so far is returned.
pub fn irr(cash_flows: &[Money]) -> Option<Rate> {
    if cash_flows.len() < 2 || cash_flows.iter().any(|cf| !cf.is_finite()) {
        return None;
    }

    let scale = if cash_flows[0] != 0.0 {
        cash_flows[0].abs()
    } else {
        cash_flows.iter().fold(0.0_f64, |acc, cf| acc.max(cf.abs()))
    };
    if scale == 0.0 {
        return None;
    }
    let tolerance = IRR_RELATIVE_TOLERANCE * scale;

    let mut prev_rate = IRR_LOWER_BOUND;
    let mut prev_npv = npv_and_derivative(prev_rate, cash_flows).0;

    for rate in bracket_points() {
        let value = npv_and_derivative(rate, cash_flows).0;
        if !value.is_finite() {
            prev_rate = rate;
            prev_npv = value;
            continue;
        }
        if value.abs() < tolerance {
            return Some(rate);
        }
        if prev_npv.is_finite() && prev_npv.signum() != value.signum() {
            return Some(refine_root(cash_flows, prev_rate, prev_npv, rate, tolerance));
        }
        prev_rate = rate;
        prev_npv = value;
    }

    None
}

/// Grid used to look for a sign change: 1% steps up to +100%, then 10% steps.
fn bracket_points() -> impl Iterator<Item = Rate> {
    let dense = (1..=199).map(|i| IRR_LOWER_BOUND + f64::from(i) * 0.01);
    let coarse = (1..=90).map(|i| 1.0 + f64::from(i) * 0.1);
    dense.chain(coarse).filter(|r| *r <= IRR_UPPER_BOUND + 1e-12)
}

fn refine_root(
    cash_flows: &[Money],
    mut lo: Rate,
    mut npv_lo: Money,
    mut hi: Rate,
    tolerance: f64,
) -> Rate {
    let mut rate = 0.5 * (lo + hi);
    let mut best_rate = rate;
    let mut best_abs = f64::INFINITY;

    for _ in 0..MAX_IRR_ITERATIONS {
        let (value, slope) = npv_and_derivative(rate, cash_flows);

        if value.abs() < best_abs {
            best_abs = value.abs();
            best_rate = rate;
        }
        if value.abs() < tolerance {
            return rate;
        }

        if value.signum() == npv_lo.signum() {
            lo = rate;
            npv_lo = value;
        } else {
            hi = rate;
        }

        let newton = rate - value / slope;
        rate = if slope != 0.0 && newton.is_finite() && newton > lo && newton < hi {
            newton
        } else {
            0.5 * (lo + hi)
        };
    }

    best_rate
}

/// NPV(r) = sum CF_t / (1+r)^t and its derivative d(NPV)/dr.
fn npv_and_derivative(rate: Rate, cash_flows: &[Money]) -> (Money, f64) {
    let one_plus_r = 1.0 + rate;
    let mut npv = 0.0;
    let mut dnpv = 0.0;
    let mut discount = 1.0; // (1+r)^0 = 1

    for (t, cf) in cash_flows.iter().enumerate() {
        npv += cf * discount;
        if t > 0 {
            // d/dr of CF_t / (1+r)^t = -t * CF_t / (1+r)^(t+1)
            dnpv -= t as f64 * cf * discount / one_plus_r;
        }
        discount /= one_plus_r;
    }

    (npv, dnpv)
}

// ---------------------------------------------------------------------------
// Payback
// ---------------------------------------------------------------------------

/// Fractional year at which the cumulative cash flow first turns non-negative.
///
/// `None` when the series never pays back within its horizon.
pub fn simple_payback(cash_flows: &[Money]) -> Option<Years> {
    payback_from_flows(cash_flows.iter().copied())
}

/// Like [`simple_payback`], on flows discounted at `discount_rate` (percent).
pub fn discounted_payback(cash_flows: &[Money], discount_rate: Percent) -> Option<Years> {
    payback_from_flows(
        cash_flows
            .iter()
            .enumerate()
            .map(|(t, cf)| cf * discount_factor(discount_rate, t as u32)),
    )
}

fn payback_from_flows(flows: impl Iterator<Item = Money>) -> Option<Years> {
    let mut cumulative = 0.0;
    let mut went_negative = false;

    for (t, cf) in flows.enumerate() {
        let previous = cumulative;
        cumulative += cf;
        if cumulative < 0.0 {
            went_negative = true;
        } else if previous < 0.0 {
            // interpolate between the last negative and first non-negative point
            return Some((t - 1) as f64 + (-previous) / (cumulative - previous));
        }
    }

    // a series that never dips below zero is paid back from the start
    (!went_negative).then_some(0.0)
}

// ---------------------------------------------------------------------------
// Standalone contracts
// ---------------------------------------------------------------------------

/// Input for the standalone IRR calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrInput {
    /// Ordered net cash flows, year 0 first (normally negative).
    pub cash_flows: Vec<Money>,
}

/// Result of the standalone IRR calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IrrOutput {
    /// IRR as a decimal fraction, `null` when no root exists in [-99%, +1000%]
    pub irr: Option<Rate>,
    /// IRR as a percentage
    pub irr_pct: Option<Percent>,
    pub found: bool,
}

pub fn calculate_irr(input: &IrrInput) -> PropValResult<ComputationOutput<IrrOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_series(&input.cash_flows)?;

    if input.cash_flows[0] > 0.0 {
        warnings.push("Year-0 cash flow is positive — expected an initial outlay".into());
    }

    let rate = irr(&input.cash_flows);
    if rate.is_none() {
        warnings.push("No sign change of NPV between -99% and +1000% — IRR not found".into());
    }

    let output = IrrOutput {
        irr: rate,
        irr_pct: rate.map(|r| r * 100.0),
        found: rate.is_some(),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Internal Rate of Return (bracketed Newton-bisection)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

/// Input for the standalone payback calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaybackInput {
    pub cash_flows: Vec<Money>,
    /// Discount rate (percent) for the discounted variant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_rate: Option<Percent>,
}

/// Simple and discounted payback periods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaybackOutput {
    /// `null` when the investment is not recovered within the horizon
    pub simple_payback: Option<Years>,
    pub discounted_payback: Option<Years>,
    pub horizon_years: u32,
}

pub fn calculate_payback(input: &PaybackInput) -> PropValResult<ComputationOutput<PaybackOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_series(&input.cash_flows)?;

    let simple = simple_payback(&input.cash_flows);
    let discounted = match input.discount_rate {
        Some(rate) if rate <= -100.0 => {
            return Err(PropValError::InvalidInput {
                field: "discount_rate".into(),
                reason: "Discount rate must be greater than -100%".into(),
            });
        }
        Some(rate) => discounted_payback(&input.cash_flows, rate),
        None => None,
    };

    let horizon_years = (input.cash_flows.len() - 1) as u32;
    if simple.is_none() {
        warnings.push(format!(
            "Investment is not recovered within the {horizon_years}-year horizon"
        ));
    }

    let output = PaybackOutput {
        simple_payback: simple,
        discounted_payback: discounted,
        horizon_years,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Simple and Discounted Payback (linear interpolation)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

fn validate_series(cash_flows: &[Money]) -> PropValResult<()> {
    if cash_flows.len() < 2 {
        return Err(PropValError::InsufficientData(
            "At least 2 cash flows are required".into(),
        ));
    }
    if let Some(idx) = cash_flows.iter().position(|cf| !cf.is_finite()) {
        return Err(PropValError::InvalidInput {
            field: format!("cash_flows[{idx}]"),
            reason: "Cash flows must be finite numbers".into(),
        });
    }
    Ok(())
}
