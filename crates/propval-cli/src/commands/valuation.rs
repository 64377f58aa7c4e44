use clap::Args;
use serde_json::Value;

use propval_core::real_estate::{self, ValuationRequest};

use crate::input;

/// Arguments for a deterministic DCF valuation
#[derive(Args)]
pub struct ValuationArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Cap rate (%) for a direct capitalisation cross-check (overrides the input)
    #[arg(long)]
    pub direct_cap_rate: Option<f64>,
}

pub fn run_valuation(args: ValuationArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut request: ValuationRequest = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json> or stdin required for valuation".into());
    };
    if args.direct_cap_rate.is_some() {
        request.direct_cap_rate = args.direct_cap_rate;
    }
    let result = real_estate::run_valuation(&request)?;
    Ok(serde_json::to_value(result)?)
}
