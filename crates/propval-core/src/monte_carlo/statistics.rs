use serde::{Deserialize, Serialize};

use crate::error::PropValError;
use crate::types::{Money, Rate};
use crate::PropValResult;

/// Bins in the NPV histogram.
pub const HISTOGRAM_BINS: usize = 20;

/// A single histogram bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u32,
    pub frequency: f64,
}

/// Aggregate statistics over all trials of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloSummary {
    pub npv_mean: Money,
    pub npv_median: Money,
    pub npv_std_dev: Money,
    pub npv_5th_percentile: Money,
    pub npv_95th_percentile: Money,
    /// Mean IRR over trials where one was found
    pub irr_mean: Option<Rate>,
    pub irr_5th_percentile: Option<Rate>,
    pub irr_95th_percentile: Option<Rate>,
    /// Share of trials with NPV > 0 (0..1)
    pub probability_npv_positive: f64,
    /// Share of trials with an IRR (0..100)
    pub percent_valid_irr: f64,
    pub mean_valid_irr: Option<Rate>,
}

/// Compute the percentile value from a **sorted** slice using linear interpolation.
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        sorted[lower]
    } else {
        let frac = rank - lower as f64;
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Build a histogram with `num_bins` equal-width bins over a **sorted** slice.
pub fn build_histogram(sorted: &[f64], num_bins: usize) -> Vec<HistogramBin> {
    if sorted.is_empty() || num_bins == 0 {
        return Vec::new();
    }
    let min_val = sorted[0];
    let max_val = sorted[sorted.len() - 1];

    // Handle case where all values are the same
    if (max_val - min_val).abs() < f64::EPSILON {
        return vec![HistogramBin {
            lower: min_val,
            upper: max_val,
            count: sorted.len() as u32,
            frequency: 1.0,
        }];
    }

    let bin_width = (max_val - min_val) / num_bins as f64;
    let n = sorted.len() as f64;

    let mut bins: Vec<HistogramBin> = (0..num_bins)
        .map(|i| {
            let lower = min_val + i as f64 * bin_width;
            let upper = if i == num_bins - 1 {
                max_val
            } else {
                min_val + (i + 1) as f64 * bin_width
            };
            HistogramBin {
                lower,
                upper,
                count: 0,
                frequency: 0.0,
            }
        })
        .collect();

    for &val in sorted {
        let idx = (((val - min_val) / bin_width).floor() as usize).min(num_bins - 1);
        bins[idx].count += 1;
    }

    for bin in &mut bins {
        bin.frequency = bin.count as f64 / n;
    }

    bins
}

fn sort_f64(values: &mut [f64]) {
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Summarise per-trial NPVs and IRRs (`None` where no IRR exists).
pub fn summarize(npvs: &[Money], irrs: &[Option<Rate>]) -> PropValResult<MonteCarloSummary> {
    if npvs.is_empty() {
        return Err(PropValError::InsufficientData(
            "Cannot summarise a simulation with no trials".into(),
        ));
    }
    let n = npvs.len() as f64;

    let mut sorted = npvs.to_vec();
    sort_f64(&mut sorted);

    let npv_mean = mean(npvs);
    let variance = npvs.iter().map(|v| (v - npv_mean).powi(2)).sum::<f64>() / n;

    let mut valid_irrs: Vec<f64> = irrs.iter().flatten().copied().collect();
    sort_f64(&mut valid_irrs);
    let irr_mean = (!valid_irrs.is_empty()).then(|| mean(&valid_irrs));
    let irr_percentile =
        |p: f64| (!valid_irrs.is_empty()).then(|| percentile_sorted(&valid_irrs, p));

    let positive = npvs.iter().filter(|v| **v > 0.0).count();

    Ok(MonteCarloSummary {
        npv_mean,
        npv_median: percentile_sorted(&sorted, 50.0),
        npv_std_dev: variance.sqrt(),
        npv_5th_percentile: percentile_sorted(&sorted, 5.0),
        npv_95th_percentile: percentile_sorted(&sorted, 95.0),
        irr_mean,
        irr_5th_percentile: irr_percentile(5.0),
        irr_95th_percentile: irr_percentile(95.0),
        probability_npv_positive: positive as f64 / n,
        percent_valid_irr: valid_irrs.len() as f64 / irrs.len().max(1) as f64 * 100.0,
        mean_valid_irr: irr_mean,
    })
}

/// The NPV histogram chart data.
pub fn npv_histogram(npvs: &[Money]) -> Vec<HistogramBin> {
    let mut sorted = npvs.to_vec();
    sort_f64(&mut sorted);
    build_histogram(&sorted, HISTOGRAM_BINS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_sorted(&sorted, 0.0), 1.0);
        assert_eq!(percentile_sorted(&sorted, 50.0), 3.0);
        assert_eq!(percentile_sorted(&sorted, 100.0), 5.0);
        assert!((percentile_sorted(&sorted, 5.0) - 1.2).abs() < 1e-12);
    }

    #[test]
    fn test_histogram_counts_every_value() {
        let sorted: Vec<f64> = (0..1_000).map(f64::from).collect();
        let bins = build_histogram(&sorted, HISTOGRAM_BINS);
        assert_eq!(bins.len(), 20);
        assert_eq!(bins.iter().map(|b| b.count).sum::<u32>(), 1_000);
        let freq: f64 = bins.iter().map(|b| b.frequency).sum();
        assert!((freq - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_histogram_constant_values() {
        let bins = build_histogram(&[3.0, 3.0, 3.0], HISTOGRAM_BINS);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].count, 3);
    }

    #[test]
    fn test_summary_counts() {
        let npvs = [-10.0, 5.0, 20.0, 0.0];
        let irrs = [None, Some(0.05), Some(0.15), Some(0.10)];
        let s = summarize(&npvs, &irrs).unwrap();
        assert_eq!(s.npv_mean, 3.75);
        assert_eq!(s.probability_npv_positive, 0.5);
        assert_eq!(s.percent_valid_irr, 75.0);
        assert!((s.irr_mean.unwrap() - 0.10).abs() < 1e-12);
        assert_eq!(s.irr_mean, s.mean_valid_irr);
        assert_eq!(s.npv_median, 2.5);
    }

    #[test]
    fn test_summary_without_any_irr() {
        let s = summarize(&[-1.0, -2.0], &[None, None]).unwrap();
        assert!(s.irr_mean.is_none());
        assert!(s.irr_5th_percentile.is_none());
        assert_eq!(s.percent_valid_irr, 0.0);
        assert_eq!(s.probability_npv_positive, 0.0);
    }

    #[test]
    fn test_empty_summary_rejected() {
        assert!(matches!(
            summarize(&[], &[]),
            Err(PropValError::InsufficientData(_))
        ));
    }
}
