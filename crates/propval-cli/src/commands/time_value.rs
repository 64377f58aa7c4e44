use clap::Args;
use serde_json::Value;

use propval_core::time_value::{self, IrrInput, PaybackInput};

use crate::input;

/// Arguments for a standalone IRR
#[derive(Args)]
pub struct IrrArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Net cash flows, year 0 first (comma-separated, e.g. "-1000,400,400,400")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<f64>>,
}

/// Arguments for simple and discounted payback
#[derive(Args)]
pub struct PaybackArgs {
    /// Path to JSON or YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Net cash flows, year 0 first (comma-separated)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub cash_flows: Option<Vec<f64>>,

    /// Discount rate (%) for the discounted payback
    #[arg(long)]
    pub discount_rate: Option<f64>,
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let irr_input: IrrInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(cash_flows) = args.cash_flows {
        IrrInput { cash_flows }
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--cash-flows is required (or provide --input)".into());
    };
    let result = time_value::calculate_irr(&irr_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_payback(args: PaybackArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let payback_input: PaybackInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(cash_flows) = args.cash_flows {
        PaybackInput {
            cash_flows,
            discount_rate: args.discount_rate,
        }
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--cash-flows is required (or provide --input)".into());
    };
    let result = time_value::calculate_payback(&payback_input)?;
    Ok(serde_json::to_value(result)?)
}
