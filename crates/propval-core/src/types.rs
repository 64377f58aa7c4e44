use serde::{Deserialize, Serialize};

/// Monetary amounts (annual figures unless stated otherwise).
pub type Money = f64;

/// Rates expressed as percentages (8.0 = 8%), the way valuation records store them.
pub type Percent = f64;

/// Rates expressed as decimal fractions (0.08 = 8%). Used for IRR results.
pub type Rate = f64;

/// Year counts and fractional years (payback).
pub type Years = f64;

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "ieee754_f64".to_string(),
        },
    }
}

/// Convert a percentage to a decimal fraction.
#[inline]
pub fn pct_to_rate(pct: Percent) -> Rate {
    pct / 100.0
}
