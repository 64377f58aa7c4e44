use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::PropValError;
use crate::types::{pct_to_rate, with_metadata, ComputationOutput, Money, Percent};
use crate::PropValResult;

/// Input for a standalone direct capitalisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectCapInput {
    /// Stabilised (year 1) net operating income
    pub noi: Money,
    /// Capitalisation rate (%)
    pub cap_rate: Percent,
}

/// Result of direct capitalisation method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectCapResult {
    /// Indicated value = NOI / cap_rate
    pub value: Money,
    /// Capitalisation rate used (%)
    pub cap_rate: Percent,
    /// Net operating income (year 1)
    pub noi: Money,
    /// Price per unit of NOI (inverse of cap rate)
    pub price_per_unit_noi: f64,
}

/// `noi / (cap_rate/100)`.
pub fn direct_cap_value(noi: Money, cap_rate: Percent) -> PropValResult<Money> {
    if !cap_rate.is_finite() || cap_rate <= 0.0 {
        return Err(PropValError::InvalidCapRate { cap_rate });
    }
    Ok(noi / pct_to_rate(cap_rate))
}

pub(crate) fn compute_direct_cap(
    noi: Money,
    cap_rate: Percent,
    warnings: &mut Vec<String>,
) -> PropValResult<DirectCapResult> {
    let value = direct_cap_value(noi, cap_rate)?;

    if cap_rate < 3.0 {
        warnings.push(format!(
            "Cap rate {cap_rate}% is below 3% — unusually low, verify market data"
        ));
    }
    if cap_rate > 12.0 {
        warnings.push(format!(
            "Cap rate {cap_rate}% exceeds 12% — unusually high, may indicate elevated risk"
        ));
    }
    if value < 0.0 {
        warnings.push("Direct cap produces negative value — check NOI and cap rate".into());
    }

    Ok(DirectCapResult {
        value,
        cap_rate,
        noi,
        price_per_unit_noi: 1.0 / pct_to_rate(cap_rate),
    })
}

/// Value a property by capitalising a single year's NOI.
pub fn calculate_direct_cap(
    input: &DirectCapInput,
) -> PropValResult<ComputationOutput<DirectCapResult>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    if !input.noi.is_finite() {
        return Err(PropValError::InvalidInput {
            field: "noi".into(),
            reason: "NOI must be a finite number".into(),
        });
    }

    let result = compute_direct_cap(input.noi, input.cap_rate, &mut warnings)?;

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Direct Capitalisation (NOI / cap rate)",
        input,
        warnings,
        elapsed,
        result,
    ))
}
