use rand::distributions::Distribution;
use rand::Rng;
use statrs::distribution::{Normal, Pareto};

use crate::error::PropValError;
use crate::types::Percent;
use crate::PropValResult;

use super::config::{RateDistribution, RateVariable};

/// Lowest rate a sample may take: `1 + r/100` must stay positive.
pub const MIN_RATE_PCT: Percent = -99.99;

/// Sampler for one rate variable.
#[derive(Debug, Clone)]
pub enum DistributionSampler {
    Normal { dist: Normal, mean: f64 },
    /// Zero-variance: always the same value
    Degenerate(f64),
    Pareto { dist: Pareto, mean: f64 },
}

impl DistributionSampler {
    pub fn from_config(
        variable: RateVariable,
        config: &RateDistribution,
    ) -> PropValResult<Self> {
        match *config {
            RateDistribution::Normal { mean, stddev } => {
                if !mean.is_finite() || !stddev.is_finite() {
                    return Err(PropValError::InvalidConfig {
                        field: variable.name().into(),
                        reason: "Normal mean and stddev must be finite".into(),
                    });
                }
                if stddev < 0.0 {
                    return Err(PropValError::InvalidConfig {
                        field: variable.name().into(),
                        reason: format!("stddev must be non-negative, got {stddev}"),
                    });
                }
                if stddev == 0.0 {
                    return Ok(DistributionSampler::Degenerate(mean));
                }
                let dist = Normal::new(mean, stddev).map_err(|e| PropValError::InvalidConfig {
                    field: variable.name().into(),
                    reason: format!("Invalid Normal parameters: {e}"),
                })?;
                Ok(DistributionSampler::Normal { dist, mean })
            }
            RateDistribution::Pareto { mean, shape } => {
                if !shape.is_finite() || shape <= 1.0 {
                    return Err(PropValError::InvalidDistributionShape {
                        variable: variable.name().into(),
                        shape,
                    });
                }
                if !mean.is_finite() || mean <= 0.0 {
                    return Err(PropValError::InvalidConfig {
                        field: variable.name().into(),
                        reason: format!("Pareto mean must be positive, got {mean}"),
                    });
                }
                // mean = shape * scale / (shape - 1)
                let scale = mean * (shape - 1.0) / shape;
                let dist = Pareto::new(scale, shape).map_err(|e| PropValError::InvalidConfig {
                    field: variable.name().into(),
                    reason: format!("Invalid Pareto parameters: {e}"),
                })?;
                Ok(DistributionSampler::Pareto { dist, mean })
            }
        }
    }

    pub fn constant(value: f64) -> Self {
        DistributionSampler::Degenerate(value)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            DistributionSampler::Normal { dist, .. } => dist.sample(rng),
            DistributionSampler::Degenerate(value) => *value,
            DistributionSampler::Pareto { dist, .. } => dist.sample(rng),
        }
    }

    pub fn mean(&self) -> f64 {
        match self {
            DistributionSampler::Normal { mean, .. } | DistributionSampler::Pareto { mean, .. } => {
                *mean
            }
            DistributionSampler::Degenerate(value) => *value,
        }
    }
}

/// Clamp a sampled rate so that `1 + rate/100 > 0`.
#[inline]
pub fn clamp_rate(rate: Percent) -> Percent {
    if rate <= -100.0 {
        MIN_RATE_PCT
    } else {
        rate
    }
}
