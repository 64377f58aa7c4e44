pub mod config;
pub mod distribution;
pub mod engine;
pub mod statistics;
pub mod stream;

pub use config::{
    MarketScenario, MonteCarloInput, RateDistribution, RateDistributions, RateVariable,
    MAX_SIMULATIONS,
};
pub use distribution::{clamp_rate, DistributionSampler, MIN_RATE_PCT};
pub use engine::{
    run_monte_carlo, MonteCarloOutput, PreparedSimulation, SimulationResults, TrialResult,
};
pub use statistics::{summarize, HistogramBin, MonteCarloSummary};
pub use stream::{
    run_monte_carlo_streaming, spawn_monte_carlo, to_sse_frame, CancellationToken, CompleteEvent,
    ProgressEvent, SimulationEvent, SimulationStream,
};
