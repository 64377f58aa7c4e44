use clap::{Args, ValueEnum};
use serde_json::Value;
use std::io::{self, Write};

use propval_core::monte_carlo::{self, MarketScenario, MonteCarloInput};

use crate::input;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ScenarioArg {
    Bullish,
    Bearish,
    Custom,
}

impl From<ScenarioArg> for MarketScenario {
    fn from(arg: ScenarioArg) -> Self {
        match arg {
            ScenarioArg::Bullish => MarketScenario::Bullish,
            ScenarioArg::Bearish => MarketScenario::Bearish,
            ScenarioArg::Custom => MarketScenario::Custom,
        }
    }
}

/// Arguments for a Monte Carlo valuation
#[derive(Args)]
pub struct MonteCarloArgs {
    /// Path to JSON or YAML input file
    #[arg(long)]
    pub input: Option<String>,

    /// Stream progress and the final result as Server-Sent Events frames
    #[arg(long)]
    pub stream: bool,

    /// Number of trials (overrides the input)
    #[arg(long)]
    pub simulations: Option<u32>,

    /// RNG seed for a reproducible run (overrides the input)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Market scenario preset (overrides the input)
    #[arg(long, value_enum)]
    pub scenario: Option<ScenarioArg>,
}

fn load_input(args: &MonteCarloArgs) -> Result<MonteCarloInput, Box<dyn std::error::Error>> {
    let mut mc_input: MonteCarloInput = if let Some(ref path) = args.input {
        input::file::read_input(path)?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        return Err("--input <file.json> or stdin required for Monte Carlo simulation".into());
    };

    if let Some(n) = args.simulations {
        mc_input.num_simulations = n;
    }
    if args.seed.is_some() {
        mc_input.seed = args.seed;
    }
    if let Some(scenario) = args.scenario {
        mc_input.market_scenario = scenario.into();
    }
    Ok(mc_input)
}

pub fn run_monte_carlo(args: MonteCarloArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mc_input = load_input(&args)?;
    let result = monte_carlo::run_monte_carlo(&mc_input)?;
    Ok(serde_json::to_value(result)?)
}

/// Write each simulation event to stdout as an SSE frame as soon as it arrives.
///
/// A closed stdout ends the run early.
pub fn stream_monte_carlo(args: MonteCarloArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mc_input = load_input(&args)?;
    let mut stream = monte_carlo::spawn_monte_carlo(mc_input)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for event in stream.by_ref() {
        out.write_all(monte_carlo::to_sse_frame(&event)?.as_bytes())?;
        out.flush()?;
    }

    stream.finish()?;
    Ok(())
}
