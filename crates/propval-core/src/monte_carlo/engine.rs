use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::error::PropValError;
use crate::real_estate::{net_cash_flows, npv, CashFlowProjector, RateScenario, ValuationAssumptions};
use crate::time_value::irr;
use crate::types::{with_metadata, ComputationOutput, Money, Percent, Rate};
use crate::PropValResult;

use super::config::{MonteCarloInput, RateDistributions, RateVariable};
use super::distribution::{clamp_rate, DistributionSampler};
use super::statistics::{npv_histogram, summarize, HistogramBin, MonteCarloSummary};
use super::stream::CancellationToken;

/// Trials are split into at most this many batches; progress is reported per batch.
pub const MAX_PROGRESS_BATCHES: u32 = 100;
/// Draws attempted per trial before falling back to the distribution means.
pub const MAX_TRIAL_ATTEMPTS: u32 = 16;

/// Outcome of one trial. Not persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub growth_rate: Percent,
    pub discount_rate: Percent,
    /// Sampled loan rate; `None` when unlevered
    pub interest_rate: Option<Percent>,
    pub npv: Money,
    pub irr: Option<Rate>,
}

/// Output of a batch Monte Carlo run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloOutput {
    pub num_simulations: u32,
    pub npvs: Vec<Money>,
    /// Per-trial IRR as a decimal fraction, `null` where none exists
    pub irrs: Vec<Option<Rate>>,
    pub summary: MonteCarloSummary,
    /// 20-bin NPV histogram
    pub histogram: Vec<HistogramBin>,
    /// Trials that needed more than one draw to produce a finite NPV
    pub resampled_trials: usize,
    /// Trials that fell back to the distribution means
    pub fallback_trials: usize,
}

/// Raw trial results of a completed run, in trial order.
#[derive(Debug, Clone)]
pub struct SimulationResults {
    pub trials: Vec<TrialResult>,
    pub resampled_trials: usize,
    pub fallback_trials: usize,
}

impl SimulationResults {
    pub fn npvs(&self) -> Vec<Money> {
        self.trials.iter().map(|t| t.npv).collect()
    }

    pub fn irrs(&self) -> Vec<Option<Rate>> {
        self.trials.iter().map(|t| t.irr).collect()
    }
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct TrialSampler {
    growth: DistributionSampler,
    discount: DistributionSampler,
    interest: Option<DistributionSampler>,
}

impl TrialSampler {
    fn new(
        distributions: &RateDistributions,
        assumptions: &ValuationAssumptions,
    ) -> PropValResult<Self> {
        let build = |variable: RateVariable, point: Percent| match distributions.get(variable) {
            Some(config) => DistributionSampler::from_config(variable, config),
            None => Ok(DistributionSampler::constant(point)),
        };

        let interest = if assumptions.is_levered() {
            Some(build(
                RateVariable::InterestRate,
                assumptions.interest_rate.unwrap_or(0.0),
            )?)
        } else {
            None
        };

        Ok(Self {
            growth: build(RateVariable::GrowthRate, assumptions.annual_rent_growth)?,
            discount: build(RateVariable::DiscountRate, assumptions.discount_rate)?,
            interest,
        })
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> RateScenario {
        RateScenario {
            growth_rate: clamp_rate(self.growth.sample(rng)),
            discount_rate: clamp_rate(self.discount.sample(rng)),
            // amortization rejects negative rates
            interest_rate: self
                .interest
                .as_ref()
                .map_or(0.0, |s| s.sample(rng).max(0.0)),
        }
    }

    fn means(&self) -> RateScenario {
        RateScenario {
            growth_rate: clamp_rate(self.growth.mean()),
            discount_rate: clamp_rate(self.discount.mean()),
            interest_rate: self.interest.as_ref().map_or(0.0, |s| s.mean().max(0.0)),
        }
    }
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Independent RNG for trial `index`, so results do not depend on scheduling.
fn trial_rng(seed: u64, index: u32) -> StdRng {
    StdRng::seed_from_u64(splitmix64(seed ^ splitmix64(u64::from(index))))
}

fn evaluate(
    projector: &CashFlowProjector<'_>,
    scenario: RateScenario,
    levered: bool,
) -> Option<TrialResult> {
    let rows = projector.project(&scenario).ok()?;
    let npv = npv(&rows);
    if !npv.is_finite() {
        return None;
    }
    Some(TrialResult {
        growth_rate: scenario.growth_rate,
        discount_rate: scenario.discount_rate,
        interest_rate: levered.then_some(scenario.interest_rate),
        npv,
        irr: irr(&net_cash_flows(&rows)),
    })
}

// ---------------------------------------------------------------------------
// Prepared run
// ---------------------------------------------------------------------------

/// A validated simulation, ready to execute. All configuration errors are
/// raised here, before any trial runs.
#[derive(Debug, Clone)]
pub struct PreparedSimulation {
    assumptions: ValuationAssumptions,
    sampler: TrialSampler,
    fallback: TrialResult,
    num_simulations: u32,
    seed: u64,
    warnings: Vec<String>,
}

impl PreparedSimulation {
    pub fn new(input: &MonteCarloInput) -> PropValResult<Self> {
        input.validate()?;
        let distributions = input.effective_distributions();

        let mut assumptions = input.assumptions.clone();
        if assumptions.is_levered() && assumptions.interest_rate.is_none() {
            assumptions.interest_rate = distributions.interest_rate.map(|d| d.mean());
        }

        let projector = CashFlowProjector::new(&assumptions)?;
        let mut warnings = projector.warnings().to_vec();
        if !assumptions.is_levered() && distributions.interest_rate.is_some() {
            warnings.push("interest_rate distribution ignored — assumptions are unlevered".into());
        }

        let sampler = TrialSampler::new(&distributions, &assumptions)?;
        let fallback = evaluate(&projector, sampler.means(), assumptions.is_levered())
            .ok_or_else(|| PropValError::InvalidConfig {
                field: "distributions".into(),
                reason: "NPV at the distribution means is not finite".into(),
            })?;

        let seed = match input.seed {
            Some(seed) => seed,
            None => StdRng::from_entropy().gen(),
        };

        Ok(Self {
            assumptions,
            sampler,
            fallback,
            num_simulations: input.num_simulations,
            seed,
            warnings,
        })
    }

    pub fn num_simulations(&self) -> u32 {
        self.num_simulations
    }

    fn run_trial(
        &self,
        projector: &CashFlowProjector<'_>,
        levered: bool,
        index: u32,
        resampled: &AtomicUsize,
        fallbacks: &AtomicUsize,
    ) -> TrialResult {
        let mut rng = trial_rng(self.seed, index);
        for attempt in 0..MAX_TRIAL_ATTEMPTS {
            if let Some(trial) = evaluate(projector, self.sampler.sample(&mut rng), levered) {
                if attempt > 0 {
                    resampled.fetch_add(1, Ordering::Relaxed);
                }
                return trial;
            }
        }
        resampled.fetch_add(1, Ordering::Relaxed);
        fallbacks.fetch_add(1, Ordering::Relaxed);
        self.fallback
    }

    /// Run every trial in progress batches on the rayon pool.
    ///
    /// `on_batch(completed, total)` is called after each batch; returning
    /// `false` cancels the run.
    pub fn run<F>(&self, cancel: &CancellationToken, mut on_batch: F) -> PropValResult<SimulationResults>
    where
        F: FnMut(u32, u32) -> bool,
    {
        let total = self.num_simulations;
        let projector = CashFlowProjector::new(&self.assumptions)?;
        let levered = self.assumptions.is_levered();
        let batch_size = total.div_ceil(MAX_PROGRESS_BATCHES).max(1);

        let resampled = AtomicUsize::new(0);
        let fallbacks = AtomicUsize::new(0);
        let mut trials = vec![TrialResult::default(); total as usize];
        let mut completed: u32 = 0;

        info!(num_simulations = total, batch_size, levered, "starting Monte Carlo run");

        for batch in trials.chunks_mut(batch_size as usize) {
            if cancel.is_cancelled() {
                warn!(completed, requested = total, "Monte Carlo run cancelled");
                return Err(PropValError::Cancelled {
                    completed,
                    requested: total,
                });
            }

            let first = completed;
            batch.par_iter_mut().enumerate().for_each(|(offset, slot)| {
                if cancel.is_cancelled() {
                    return;
                }
                *slot = self.run_trial(
                    &projector,
                    levered,
                    first + offset as u32,
                    &resampled,
                    &fallbacks,
                );
            });

            // a batch interrupted midway is discarded
            if cancel.is_cancelled() {
                warn!(completed, requested = total, "Monte Carlo run cancelled");
                return Err(PropValError::Cancelled {
                    completed,
                    requested: total,
                });
            }

            completed += batch.len() as u32;
            debug!(completed, total, "batch complete");

            if !on_batch(completed, total) {
                cancel.cancel();
                warn!(completed, requested = total, "progress receiver gone, cancelling run");
                return Err(PropValError::Cancelled {
                    completed,
                    requested: total,
                });
            }
        }

        let resampled_trials = resampled.into_inner();
        let fallback_trials = fallbacks.into_inner();
        if resampled_trials > 0 {
            warn!(resampled_trials, fallback_trials, "trials produced non-finite NPVs");
        }
        info!(num_simulations = total, "Monte Carlo run complete");

        Ok(SimulationResults {
            trials,
            resampled_trials,
            fallback_trials,
        })
    }

    /// Warnings for the finished run.
    pub fn run_warnings(&self, results: &SimulationResults) -> Vec<String> {
        let mut warnings = self.warnings.clone();
        if results.resampled_trials > 0 {
            warnings.push(format!(
                "{} trial(s) produced a non-finite NPV and were resampled",
                results.resampled_trials
            ));
        }
        if results.fallback_trials > 0 {
            warnings.push(format!(
                "{} trial(s) fell back to the distribution means after {MAX_TRIAL_ATTEMPTS} attempts",
                results.fallback_trials
            ));
        }
        warnings
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run a Monte Carlo valuation to completion and summarise it.
///
/// Each trial samples growth, discount and (when levered) interest rates,
/// projects the cash flows and records NPV and IRR.
pub fn run_monte_carlo(
    input: &MonteCarloInput,
) -> PropValResult<ComputationOutput<MonteCarloOutput>> {
    let start = Instant::now();

    let prepared = PreparedSimulation::new(input)?;
    let results = prepared.run(&CancellationToken::new(), |_, _| true)?;

    let npvs = results.npvs();
    let irrs = results.irrs();
    let summary = summarize(&npvs, &irrs)?;
    let histogram = npv_histogram(&npvs);
    let warnings = prepared.run_warnings(&results);

    let output = MonteCarloOutput {
        num_simulations: prepared.num_simulations(),
        npvs,
        irrs,
        summary,
        histogram,
        resampled_trials: results.resampled_trials,
        fallback_trials: results.fallback_trials,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Monte Carlo DCF (independent rate draws per trial)",
        input,
        warnings,
        elapsed,
        output,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monte_carlo::config::{MarketScenario, RateDistribution};
    use crate::real_estate::{project_cash_flows, PropertyTaxTreatment};

    fn sample_assumptions() -> ValuationAssumptions {
        ValuationAssumptions {
            initial_investment: 100_000.0,
            annual_rental_income: 12_000.0,
            vacancy_rate: 5.0,
            service_charge: 1_000.0,
            ground_rent: 500.0,
            maintenance: 1_000.0,
            property_tax: 600.0,
            insurance: 300.0,
            management_fees: 10.0,
            transaction_costs: 2_000.0,
            annual_rent_growth: 2.0,
            discount_rate: 8.0,
            holding_period: 10,
            ltv: 0.0,
            interest_rate: None,
            loan_term_years: None,
            capex: 0.0,
            exit_cap_rate: Some(6.0),
            selling_costs: 2.0,
            property_tax_treatment: PropertyTaxTreatment::Annual,
        }
    }

    fn input(num_simulations: u32) -> MonteCarloInput {
        MonteCarloInput {
            assumptions: sample_assumptions(),
            distributions: RateDistributions {
                growth_rate: Some(RateDistribution::Normal {
                    mean: 2.0,
                    stddev: 1.0,
                }),
                discount_rate: Some(RateDistribution::Normal {
                    mean: 8.0,
                    stddev: 1.5,
                }),
                interest_rate: None,
            },
            num_simulations,
            seed: Some(42),
            market_scenario: MarketScenario::Custom,
        }
    }

    #[test]
    fn test_seeded_runs_are_identical() {
        let a = run_monte_carlo(&input(500)).unwrap();
        let b = run_monte_carlo(&input(500)).unwrap();
        assert_eq!(a.result.npvs, b.result.npvs);
        assert_eq!(a.result.irrs, b.result.irrs);
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = run_monte_carlo(&input(200)).unwrap();
        let mut other = input(200);
        other.seed = Some(43);
        let b = run_monte_carlo(&other).unwrap();
        assert_ne!(a.result.npvs, b.result.npvs);
    }

    #[test]
    fn test_output_sizes() {
        let out = run_monte_carlo(&input(250)).unwrap();
        assert_eq!(out.result.num_simulations, 250);
        assert_eq!(out.result.npvs.len(), 250);
        assert_eq!(out.result.irrs.len(), 250);
        assert_eq!(out.result.histogram.len(), 20);
        assert_eq!(out.metadata.precision, "ieee754_f64");
    }

    #[test]
    fn test_unconfigured_variables_hold_point_values() {
        let mut inp = input(50);
        inp.distributions.discount_rate = None;
        let prepared = PreparedSimulation::new(&inp).unwrap();
        let results = prepared.run(&CancellationToken::new(), |_, _| true).unwrap();
        assert!(results.trials.iter().all(|t| t.discount_rate == 8.0));
        assert!(results.trials.iter().all(|t| t.interest_rate.is_none()));
    }

    #[test]
    fn test_single_degenerate_trial_matches_deterministic() {
        let mut inp = input(1);
        inp.distributions = RateDistributions {
            growth_rate: Some(RateDistribution::Normal {
                mean: 2.0,
                stddev: 0.0,
            }),
            discount_rate: Some(RateDistribution::Normal {
                mean: 8.0,
                stddev: 0.0,
            }),
            interest_rate: None,
        };
        let out = run_monte_carlo(&inp).unwrap();
        let rows = project_cash_flows(&sample_assumptions()).unwrap();
        assert_eq!(out.result.npvs[0], npv(&rows));
        assert_eq!(out.result.irrs[0], irr(&net_cash_flows(&rows)));
        assert_eq!(out.result.summary.npv_mean, npv(&rows));
    }

    #[test]
    fn test_levered_interest_filled_from_distribution_mean() {
        let mut inp = input(100);
        inp.assumptions.ltv = 60.0;
        inp.distributions.interest_rate = Some(RateDistribution::Normal {
            mean: 5.0,
            stddev: 3.0,
        });
        let prepared = PreparedSimulation::new(&inp).unwrap();
        let results = prepared.run(&CancellationToken::new(), |_, _| true).unwrap();
        assert!(results
            .trials
            .iter()
            .all(|t| t.interest_rate.is_some_and(|r| r >= 0.0)));
    }

    #[test]
    fn test_levered_without_any_interest_rate_fails() {
        let mut inp = input(10);
        inp.assumptions.ltv = 60.0;
        let err = PreparedSimulation::new(&inp).unwrap_err();
        assert!(matches!(err, PropValError::InvalidLoanTerms { .. }));
    }

    #[test]
    fn test_zero_simulations_rejected() {
        let err = run_monte_carlo(&input(0)).unwrap_err();
        assert!(matches!(err, PropValError::InvalidConfig { .. }));
    }

    #[test]
    fn test_extreme_discount_draws_are_clamped() {
        let mut inp = input(200);
        inp.distributions.discount_rate = Some(RateDistribution::Normal {
            mean: -100.0,
            stddev: 50.0,
        });
        let prepared = PreparedSimulation::new(&inp).unwrap();
        let results = prepared.run(&CancellationToken::new(), |_, _| true).unwrap();
        assert!(results.trials.iter().all(|t| t.discount_rate > -100.0));
    }

    #[test]
    fn test_progress_callback_sees_every_batch() {
        let prepared = PreparedSimulation::new(&input(1_000)).unwrap();
        let mut seen = Vec::new();
        prepared
            .run(&CancellationToken::new(), |completed, total| {
                seen.push((completed, total));
                true
            })
            .unwrap();
        assert_eq!(seen.len(), 100);
        assert_eq!(seen.last(), Some(&(1_000, 1_000)));
        assert!(seen.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_unusable_draws_fall_back_to_means() {
        let mut prepared = PreparedSimulation::new(&input(300)).unwrap();
        // every draw overflows the rent projection
        prepared.sampler.growth = DistributionSampler::constant(1e300);
        let results = prepared.run(&CancellationToken::new(), |_, _| true).unwrap();

        assert_eq!(results.fallback_trials, 300);
        assert_eq!(results.resampled_trials, 300);
        assert!(results.trials.iter().all(|t| *t == prepared.fallback));
        assert_eq!(prepared.fallback.growth_rate, 2.0);

        let warnings = prepared.run_warnings(&results);
        assert!(warnings.iter().any(|w| w.contains("fell back")));
    }

    #[test]
    fn test_callback_refusal_cancels() {
        let prepared = PreparedSimulation::new(&input(1_000)).unwrap();
        let cancel = CancellationToken::new();
        let err = prepared.run(&cancel, |_, _| false).unwrap_err();
        assert!(matches!(
            err,
            PropValError::Cancelled {
                completed: 10,
                requested: 1_000
            }
        ));
        assert!(cancel.is_cancelled());
    }
}
