mod commands;
mod input;
mod logging;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::direct_cap::DirectCapArgs;
use commands::monte_carlo::MonteCarloArgs;
use commands::time_value::{IrrArgs, PaybackArgs};
use commands::valuation::ValuationArgs;

/// Property investment DCF valuation and Monte Carlo analysis
#[derive(Parser)]
#[command(
    name = "propval",
    version,
    about = "Property investment DCF valuation and Monte Carlo analysis",
    long_about = "A CLI for projecting property investment cash flows and deriving NPV, \
                  IRR, payback and direct capitalisation values, with Monte Carlo \
                  simulation over growth, discount and interest rates."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Project cash flows and compute NPV, IRR, payback and leverage metrics
    Valuation(ValuationArgs),
    /// Run a Monte Carlo simulation over growth, discount and interest rates
    MonteCarlo(MonteCarloArgs),
    /// Internal rate of return of a cash flow series
    Irr(IrrArgs),
    /// Simple and discounted payback period
    Payback(PaybackArgs),
    /// Direct capitalisation value (NOI / cap rate)
    DirectCap(DirectCapArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn fail(e: Box<dyn std::error::Error>) -> ! {
    eprintln!("{}: {}", "error".red().bold(), e);
    process::exit(1);
}

fn main() {
    logging::init_tracing();
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Valuation(args) => commands::valuation::run_valuation(args),
        Commands::MonteCarlo(args) if args.stream => {
            if let Err(e) = commands::monte_carlo::stream_monte_carlo(args) {
                fail(e);
            }
            return;
        }
        Commands::MonteCarlo(args) => commands::monte_carlo::run_monte_carlo(args),
        Commands::Irr(args) => commands::time_value::run_irr(args),
        Commands::Payback(args) => commands::time_value::run_payback(args),
        Commands::DirectCap(args) => commands::direct_cap::run_direct_cap(args),
        Commands::Version => {
            println!("propval {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => fail(e),
    }
}
