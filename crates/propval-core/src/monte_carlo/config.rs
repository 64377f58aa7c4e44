use serde::{Deserialize, Serialize};

use crate::error::PropValError;
use crate::real_estate::ValuationAssumptions;
use crate::PropValResult;

/// Upper bound on trials per run.
pub const MAX_SIMULATIONS: u32 = 1_000_000;

fn default_num_simulations() -> u32 {
    10_000
}

/// Distribution of one perturbed rate, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "lowercase")]
pub enum RateDistribution {
    Normal {
        mean: f64,
        #[serde(alias = "std_dev")]
        stddev: f64,
    },
    /// Power-law tail. `shape` must exceed 1 so the mean exists.
    Pareto { mean: f64, shape: f64 },
}

impl RateDistribution {
    pub fn mean(&self) -> f64 {
        match self {
            RateDistribution::Normal { mean, .. } | RateDistribution::Pareto { mean, .. } => *mean,
        }
    }

    fn with_preset(self, mean: f64, shape: f64) -> Self {
        match self {
            RateDistribution::Normal { stddev, .. } => RateDistribution::Normal { mean, stddev },
            RateDistribution::Pareto { .. } => RateDistribution::Pareto { mean, shape },
        }
    }
}

/// The rates a trial perturbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateVariable {
    GrowthRate,
    DiscountRate,
    InterestRate,
}

impl RateVariable {
    pub fn name(self) -> &'static str {
        match self {
            RateVariable::GrowthRate => "growth_rate",
            RateVariable::DiscountRate => "discount_rate",
            RateVariable::InterestRate => "interest_rate",
        }
    }
}

/// Per-variable distributions. A variable left unset is held at the
/// assumptions' point value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateDistributions {
    #[serde(default, alias = "annual_rent_growth", skip_serializing_if = "Option::is_none")]
    pub growth_rate: Option<RateDistribution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_rate: Option<RateDistribution>,
    /// Only sampled when the assumptions are levered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_rate: Option<RateDistribution>,
}

impl RateDistributions {
    pub fn get(&self, variable: RateVariable) -> Option<&RateDistribution> {
        match variable {
            RateVariable::GrowthRate => self.growth_rate.as_ref(),
            RateVariable::DiscountRate => self.discount_rate.as_ref(),
            RateVariable::InterestRate => self.interest_rate.as_ref(),
        }
    }
}

/// Market outlook presets that re-centre the configured distributions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketScenario {
    Bullish,
    Bearish,
    #[default]
    Custom,
}

impl MarketScenario {
    /// `(mean, pareto shape)` for `variable`, or `None` for `Custom`.
    pub fn preset(self, variable: RateVariable) -> Option<(f64, f64)> {
        use RateVariable::*;
        match (self, variable) {
            (MarketScenario::Custom, _) => None,
            (MarketScenario::Bullish, GrowthRate) => Some((4.5, 6.5)),
            (MarketScenario::Bullish, DiscountRate) => Some((6.5, 4.5)),
            (MarketScenario::Bullish, InterestRate) => Some((3.75, 7.5)),
            (MarketScenario::Bearish, GrowthRate) => Some((0.5, 2.5)),
            (MarketScenario::Bearish, DiscountRate) => Some((10.5, 2.5)),
            (MarketScenario::Bearish, InterestRate) => Some((7.0, 2.5)),
        }
    }

    /// Override the mean (and Pareto shape) of every configured distribution.
    pub fn apply(self, distributions: &RateDistributions) -> RateDistributions {
        let adjust = |variable: RateVariable, dist: Option<RateDistribution>| {
            dist.map(|d| match self.preset(variable) {
                Some((mean, shape)) => d.with_preset(mean, shape),
                None => d,
            })
        };
        RateDistributions {
            growth_rate: adjust(RateVariable::GrowthRate, distributions.growth_rate),
            discount_rate: adjust(RateVariable::DiscountRate, distributions.discount_rate),
            interest_rate: adjust(RateVariable::InterestRate, distributions.interest_rate),
        }
    }
}

/// Input for a Monte Carlo valuation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloInput {
    pub assumptions: ValuationAssumptions,
    #[serde(default)]
    pub distributions: RateDistributions,
    /// Number of trials (1..=1,000,000)
    #[serde(default = "default_num_simulations")]
    pub num_simulations: u32,
    /// Seed for reproducible runs; OS entropy when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub market_scenario: MarketScenario,
}

impl MonteCarloInput {
    pub fn validate(&self) -> PropValResult<()> {
        if self.num_simulations == 0 {
            return Err(PropValError::InvalidConfig {
                field: "num_simulations".into(),
                reason: "At least one simulation is required".into(),
            });
        }
        if self.num_simulations > MAX_SIMULATIONS {
            return Err(PropValError::InvalidConfig {
                field: "num_simulations".into(),
                reason: format!(
                    "{} exceeds the maximum of {MAX_SIMULATIONS}",
                    self.num_simulations
                ),
            });
        }
        Ok(())
    }

    /// Distributions after the market scenario preset is applied.
    pub fn effective_distributions(&self) -> RateDistributions {
        self.market_scenario.apply(&self.distributions)
    }
}
