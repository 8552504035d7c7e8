//! Descriptive statistics for a single numeric series
//!
//! Produces the same figures as a `describe()` table: count, mean, sample
//! standard deviation, min, max and the quartiles.

use crate::error::{AnalysisError, Result};
use serde::Serialize;

/// Quartiles of a series (linear interpolation between order statistics)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quartiles {
    pub p25: f64,
    pub p50: f64, // median
    pub p75: f64,
}

/// Summary of one numeric series
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (N-1 denominator)
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub quantiles: Quartiles,
}

impl StatSummary {
    /// Standard deviation relative to the mean, `None` for a zero mean
    pub fn coefficient_of_variation(&self) -> Option<f64> {
        if self.mean == 0.0 {
            None
        } else {
            Some(self.std / self.mean)
        }
    }
}

/// Summarize a non-empty series
///
/// # Errors
///
/// Returns [`AnalysisError::EmptyInput`] when `samples` is empty and
/// [`AnalysisError::NonFiniteSample`] for a NaN or infinite sample.
///
/// # Example
/// ```
/// use consumer_perf::stats::summarize;
///
/// let summary = summarize(&[1.0, 2.0, 3.0, 4.0]).unwrap();
/// assert_eq!(summary.count, 4);
/// assert_eq!(summary.mean, 2.5);
/// assert_eq!(summary.quantiles.p50, 2.5);
/// ```
pub fn summarize(samples: &[f64]) -> Result<StatSummary> {
    if samples.is_empty() {
        return Err(AnalysisError::EmptyInput { what: "statistics" });
    }
    if let Some((index, &value)) = samples.iter().enumerate().find(|(_, x)| !x.is_finite()) {
        return Err(AnalysisError::NonFiniteSample { index, value });
    }

    let count = samples.len();
    let mean = samples.iter().sum::<f64>() / count as f64;

    // A single observation has no spread estimate; report zero rather than NaN
    let std = if count > 1 {
        let sum_sq: f64 = samples.iter().map(|x| (x - mean).powi(2)).sum();
        (sum_sq / (count - 1) as f64).sqrt()
    } else {
        0.0
    };

    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);

    Ok(StatSummary {
        count,
        // Rounding can push the mean of near-constant data just outside [min, max]
        mean: mean.clamp(sorted[0], sorted[count - 1]),
        std,
        min: sorted[0],
        max: sorted[count - 1],
        quantiles: Quartiles {
            p25: percentile(&sorted, 25.0),
            p50: percentile(&sorted, 50.0),
            p75: percentile(&sorted, 75.0),
        },
    })
}

/// Calculate percentile from sorted data
///
/// `percentile` is in `0.0..=100.0`. Returns 0.0 for empty input.
pub fn percentile(sorted_data: &[f64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }
    if sorted_data.len() == 1 {
        return sorted_data[0];
    }

    let index = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = index.floor() as usize;
    let upper = index.ceil() as usize;

    if lower == upper {
        sorted_data[lower]
    } else {
        let weight = index - lower as f64;
        sorted_data[lower] + (sorted_data[upper] - sorted_data[lower]) * weight
    }
}
