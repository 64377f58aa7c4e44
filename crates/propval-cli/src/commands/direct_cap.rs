use clap::Args;
use serde_json::Value;

use propval_core::real_estate::{self, DirectCapInput};

use crate::input;

/// Arguments for direct capitalisation
#[derive(Args)]
pub struct DirectCapArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Year-1 net operating income
    #[arg(long, allow_hyphen_values = true)]
    pub noi: Option<f64>,

    /// Capitalisation rate (%)
    #[arg(long)]
    pub cap_rate: Option<f64>,
}

pub fn run_direct_cap(args: DirectCapArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let dc_input: DirectCapInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let (Some(noi), Some(cap_rate)) = (args.noi, args.cap_rate) {
        DirectCapInput { noi, cap_rate }
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--noi and --cap-rate are required (or provide --input)".into());
    };
    let result = real_estate::calculate_direct_cap(&dc_input)?;
    Ok(serde_json::to_value(result)?)
}
